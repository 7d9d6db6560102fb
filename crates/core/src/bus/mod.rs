use crate::peripherals::Peu;
use crate::regs::{PEU_BASE, WINDOW_SIZE};
use crate::{Bus, HarnessError, HarnessResult, Peripheral};
use peu_config::PeripheralDescriptor;

pub mod mmio;

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

/// Simulated system bus routing word accesses to mapped peripherals.
///
/// Time only advances through [`Bus::tick`]; register accesses themselves
/// are instantaneous.
#[derive(Debug, Default)]
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
    cycles: u64,
}

impl SystemBus {
    /// A bus with a trig-mode PEU at the platform base address.
    pub fn new() -> Self {
        Self::with_peu(PEU_BASE, Peu::default())
    }

    pub fn with_peu(base: u64, peu: Peu) -> Self {
        let mut bus = Self::default();
        bus.map("peu", base, WINDOW_SIZE, Box::new(peu));
        bus
    }

    pub fn from_config(desc: &PeripheralDescriptor) -> anyhow::Result<Self> {
        if desc.base_address % 4 != 0 {
            anyhow::bail!(
                "PEU base address {:#x} is not word aligned",
                desc.base_address
            );
        }
        if desc.base_address.checked_add(WINDOW_SIZE).is_none() {
            anyhow::bail!(
                "PEU register window at {:#x} runs past the end of the address space",
                desc.base_address
            );
        }
        tracing::info!(
            "Mapping {:?} PEU at {:#x} (latency {} cycles{})",
            desc.mode,
            desc.base_address,
            desc.latency_cycles,
            if desc.stuck { ", stuck" } else { "" }
        );
        Ok(Self::with_peu(desc.base_address, Peu::from_config(desc)))
    }

    pub fn map(&mut self, name: &str, base: u64, size: u64, dev: Box<dyn Peripheral>) {
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            dev,
        });
    }

    /// Downcasts a mapped peripheral by name.
    pub fn peripheral<T: 'static>(&self, name: &str) -> Option<&T> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.dev.as_any())
            .and_then(|any| any.downcast_ref::<T>())
    }

    pub fn peu(&self) -> Option<&Peu> {
        self.peripheral::<Peu>("peu")
    }

    /// Idle cycles elapsed since the bus was built.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    fn find(&self, addr: u64) -> HarnessResult<(usize, u64)> {
        if addr % 4 != 0 {
            return Err(HarnessError::Misaligned(addr));
        }
        self.peripherals
            .iter()
            .position(|p| addr >= p.base && addr - p.base < p.size)
            .map(|idx| (idx, addr - self.peripherals[idx].base))
            .ok_or(HarnessError::MemoryViolation(addr))
    }
}

impl Bus for SystemBus {
    fn read_u32(&self, addr: u64) -> HarnessResult<u32> {
        let (idx, offset) = self.find(addr)?;
        self.peripherals[idx].dev.read(offset)
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> HarnessResult<()> {
        let (idx, offset) = self.find(addr)?;
        self.peripherals[idx].dev.write(offset, value)
    }

    fn tick(&mut self) {
        self.cycles += 1;
        for p in self.peripherals.iter_mut() {
            p.dev.tick();
        }
    }
}
