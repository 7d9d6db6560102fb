pub mod bus;
pub mod fixed;
pub mod metrics;
pub mod peripherals;
pub mod regs;
pub mod sequencer;
pub mod suites;
pub mod wait;

use std::any::Any;

pub use peu_config::Outcome;


#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Misaligned register access at {0:#x}")]
    Misaligned(u64),
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Trait for observing sequencer events in a modular way.
pub trait SequencerObserver: std::fmt::Debug + Send + Sync {
    fn on_sequence_start(&self) {}
    fn on_sequence_end(&self, _outcome: Outcome) {}
    fn on_case_start(&self, _name: &str) {}
    fn on_case_end(&self, _name: &str, _outcome: Outcome) {}
    fn on_register_write(&self, _addr: u64, _value: u32) {}
    fn on_register_read(&self, _addr: u64, _value: u32) {}
    fn on_wait_end(&self, _cycles: u64, _polls: u32) {}
}

/// Trait representing a memory-mapped peripheral with 32-bit registers.
///
/// Accesses are word granular: a write is a single event, so trigger
/// registers fire exactly once per store.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> HarnessResult<u32>;
    fn write(&mut self, offset: u64, value: u32) -> HarnessResult<()>;
    /// Advance internal state by one bus cycle.
    fn tick(&mut self) {}
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

/// Trait representing the path from the sequencer to the register block.
pub trait Bus {
    fn read_u32(&self, addr: u64) -> HarnessResult<u32>;
    fn write_u32(&mut self, addr: u64, value: u32) -> HarnessResult<()>;
    /// Spend one idle cycle (a processor no-op).
    fn tick(&mut self);

    fn idle(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.tick();
        }
    }
}
