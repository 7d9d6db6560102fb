use crate::{Bus, HarnessError, HarnessResult};

/// Direct volatile access to a physical register window.
///
/// This is the bus the harness uses on real hardware (or in a simulator
/// that maps the PEU into the process address space).
#[derive(Debug)]
pub struct VolatileBus {
    base: u64,
    size: u64,
}

impl VolatileBus {
    /// # Safety
    ///
    /// `base..base + size` must be a mapped, word-aligned register window
    /// that stays valid for reads and writes for the lifetime of the bus.
    pub unsafe fn new(base: u64, size: u64) -> Self {
        Self { base, size }
    }

    fn check(&self, addr: u64) -> HarnessResult<*mut u32> {
        if addr % 4 != 0 {
            return Err(HarnessError::Misaligned(addr));
        }
        let in_window = addr
            .checked_sub(self.base)
            .is_some_and(|offset| offset < self.size && self.size - offset >= 4);
        if !in_window {
            return Err(HarnessError::MemoryViolation(addr));
        }
        Ok(addr as usize as *mut u32)
    }
}

impl Bus for VolatileBus {
    fn read_u32(&self, addr: u64) -> HarnessResult<u32> {
        let ptr = self.check(addr)?;
        // SAFETY: `check` keeps the access inside the window promised in `new`.
        Ok(unsafe { core::ptr::read_volatile(ptr) })
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> HarnessResult<()> {
        let ptr = self.check(addr)?;
        // SAFETY: see `read_u32`.
        unsafe { core::ptr::write_volatile(ptr, value) };
        Ok(())
    }

    fn tick(&mut self) {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_roundtrip_over_buffer() {
        let mut window = vec![0u32; 6];
        let base = window.as_mut_ptr() as u64;
        let mut bus = unsafe { VolatileBus::new(base, 24) };

        bus.write_u32(base + 0x04, 0xCAFE_BABE).unwrap();
        assert_eq!(bus.read_u32(base + 0x04).unwrap(), 0xCAFE_BABE);
        bus.idle(3);
        drop(bus);
        assert_eq!(window[1], 0xCAFE_BABE);
    }

    #[test]
    fn test_volatile_rejects_outside_window() {
        let mut window = vec![0u32; 6];
        let base = window.as_mut_ptr() as u64;
        let bus = unsafe { VolatileBus::new(base, 24) };

        assert!(matches!(
            bus.read_u32(base + 0x18),
            Err(HarnessError::MemoryViolation(_))
        ));
        assert!(matches!(
            bus.read_u32(base + 0x02),
            Err(HarnessError::Misaligned(_))
        ));
        assert!(matches!(
            bus.read_u32(u64::MAX - 3),
            Err(HarnessError::MemoryViolation(_))
        ));
    }

    #[test]
    fn test_volatile_window_at_top_of_address_space() {
        let bus = unsafe { VolatileBus::new(u64::MAX - 0x17, 0x18) };

        assert!(matches!(
            bus.read_u32(0),
            Err(HarnessError::MemoryViolation(_))
        ));
        assert!(matches!(
            bus.read_u32(0x1000),
            Err(HarnessError::MemoryViolation(_))
        ));
    }
}
