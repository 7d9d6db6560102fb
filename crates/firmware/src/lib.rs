//! Bare-metal PEU self-test support: volatile register access, nop delays,
//! status polling and pass/fail signalling.

#![no_std]

use core::ptr;

pub const PEU_BASE: usize = 0x1000_0000;

/// 45 degrees in Q16.16 radians.
pub const ANGLE_45: u32 = 0xC910;

pub const CONTROL_START: u32 = 1 << 0;
pub const STATUS_DONE: u32 = 1 << 0;

/// Written to Y before hanging on a status timeout, so a waveform shows
/// which way the test died.
pub const TIMEOUT_MARKER: u32 = 0xDEAD_0001;

/// A 32-bit memory-mapped register.
#[derive(Clone, Copy)]
pub struct Reg(usize);

impl Reg {
    pub const fn at(offset: usize) -> Self {
        Reg(PEU_BASE + offset)
    }

    #[inline(always)]
    pub fn read(self) -> u32 {
        // SAFETY: PEU registers are mapped for the whole program.
        unsafe { ptr::read_volatile(self.0 as *const u32) }
    }

    #[inline(always)]
    pub fn write(self, value: u32) {
        // SAFETY: see `read`.
        unsafe { ptr::write_volatile(self.0 as *mut u32, value) }
    }
}

pub mod regs {
    use super::Reg;

    pub const X: Reg = Reg::at(0x00);
    pub const Y: Reg = Reg::at(0x04);
    /// Writing this register starts the computation.
    pub const ANGLE: Reg = Reg::at(0x08);
    pub const CONTROL: Reg = ANGLE;
    pub const STATUS: Reg = Reg::at(0x0C);
    pub const RES_COS: Reg = Reg::at(0x10);
    pub const RES_SIN: Reg = Reg::at(0x14);
    pub const RESULT: Reg = RES_COS;
}

/// Spins `N` processor no-ops.
#[inline(always)]
#[allow(unused_unsafe)]
pub fn delay<const N: usize>() {
    for _ in 0..N {
        unsafe { riscv::asm::nop() };
    }
}

/// Polls STATUS.DONE at most `max_polls` times.
pub fn poll_done(max_polls: u32) -> bool {
    for _ in 0..max_polls {
        if regs::STATUS.read() & STATUS_DONE != 0 {
            return true;
        }
        delay::<1>();
    }
    false
}

/// Success: trap into the debugger or simulator.
#[allow(unused_unsafe, clippy::empty_loop)]
pub fn pass() -> ! {
    unsafe { riscv::asm::ebreak() };
    loop {}
}

/// Failure: hang so the testbench times out.
#[allow(clippy::empty_loop)]
pub fn fail() -> ! {
    loop {}
}

pub fn timeout() -> ! {
    regs::Y.write(TIMEOUT_MARKER);
    fail()
}
