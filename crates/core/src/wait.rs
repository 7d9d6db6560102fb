use crate::{Bus, HarnessResult};
use peu_config::WaitConfig;
use serde::Serialize;

/// How the sequencer waits between the trigger write and the result reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Spin a constant number of idle cycles.
    ///
    /// Only sound when the peripheral latency is known and constant. If the
    /// peripheral is slower the results read afterwards are stale.
    FixedDelay { cycles: u32 },
    /// Read STATUS until `status & mask != 0`.
    ///
    /// `max_polls: None` spins forever against a peripheral that never
    /// completes.
    PollStatus { mask: u32, max_polls: Option<u32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum WaitOutcome {
    Ready { cycles: u64, polls: u32 },
    TimedOut { cycles: u64, polls: u32 },
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready { .. })
    }

    pub fn cycles(&self) -> u64 {
        match *self {
            WaitOutcome::Ready { cycles, .. } | WaitOutcome::TimedOut { cycles, .. } => cycles,
        }
    }

    pub fn polls(&self) -> u32 {
        match *self {
            WaitOutcome::Ready { polls, .. } | WaitOutcome::TimedOut { polls, .. } => polls,
        }
    }
}

impl WaitPolicy {
    pub fn fixed(cycles: u32) -> Self {
        WaitPolicy::FixedDelay { cycles }
    }

    /// Poll STATUS bit 0 with an upper bound on the number of reads.
    pub fn poll_done(max_polls: u32) -> Self {
        WaitPolicy::PollStatus {
            mask: crate::regs::Status::DONE.bits(),
            max_polls: Some(max_polls),
        }
    }

    /// Poll STATUS bit 0 with no bound at all.
    pub fn poll_done_unbounded() -> Self {
        WaitPolicy::PollStatus {
            mask: crate::regs::Status::DONE.bits(),
            max_polls: None,
        }
    }

    /// Builds a policy from script config. `default_max_polls` bounds polls
    /// that do not carry their own limit.
    pub fn from_config(config: &WaitConfig, default_max_polls: Option<u32>) -> Self {
        match config {
            WaitConfig::FixedDelay(cycles) => WaitPolicy::FixedDelay { cycles: *cycles },
            WaitConfig::PollStatus(poll) => WaitPolicy::PollStatus {
                mask: poll.mask,
                max_polls: poll.max_polls.or(default_max_polls),
            },
        }
    }

    /// Fills in a poll bound where none is set.
    pub fn bounded_by(self, default_max_polls: Option<u32>) -> Self {
        match self {
            WaitPolicy::PollStatus {
                mask,
                max_polls: None,
            } => WaitPolicy::PollStatus {
                mask,
                max_polls: default_max_polls,
            },
            other => other,
        }
    }

    pub fn wait(&self, bus: &mut dyn Bus, status_addr: u64) -> HarnessResult<WaitOutcome> {
        match *self {
            WaitPolicy::FixedDelay { cycles } => {
                bus.idle(cycles);
                Ok(WaitOutcome::Ready {
                    cycles: cycles as u64,
                    polls: 0,
                })
            }
            WaitPolicy::PollStatus { mask, max_polls } => {
                let mut polls: u32 = 0;
                let mut cycles: u64 = 0;
                loop {
                    if let Some(limit) = max_polls {
                        if polls >= limit {
                            tracing::warn!(
                                "Status {:#x} never showed {:#x} after {} polls",
                                status_addr,
                                mask,
                                polls
                            );
                            return Ok(WaitOutcome::TimedOut { cycles, polls });
                        }
                    }
                    let status = bus.read_u32(status_addr)?;
                    polls = polls.saturating_add(1);
                    if status & mask != 0 {
                        return Ok(WaitOutcome::Ready { cycles, polls });
                    }
                    bus.tick();
                    cycles += 1;
                }
            }
        }
    }
}
