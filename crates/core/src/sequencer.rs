//! Register test sequencer: write → wait → read → compare, once per case.

use crate::regs::{Register, RegisterMap};
use crate::wait::{WaitOutcome, WaitPolicy};
use crate::{Bus, HarnessResult, Outcome, SequencerObserver};
use peu_config::{CaseConfig, CheckConfig};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Exact(u32),
    /// Tolerance band: passes when `observed & mask == pattern`.
    Masked { mask: u32, pattern: u32 },
    /// Diagnostic only. The value is recorded, nothing is asserted.
    Observe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Match,
    Mismatch,
    Observed,
}

impl Expectation {
    pub fn evaluate(&self, observed: u32) -> Verdict {
        match *self {
            Expectation::Exact(expected) if observed == expected => Verdict::Match,
            Expectation::Masked { mask, pattern } if observed & mask == pattern => Verdict::Match,
            Expectation::Observe => Verdict::Observed,
            _ => Verdict::Mismatch,
        }
    }
}

impl From<&CheckConfig> for Expectation {
    fn from(check: &CheckConfig) -> Self {
        match (check.exact, check.mask, check.pattern) {
            (Some(v), _, _) => Expectation::Exact(v),
            (None, Some(mask), Some(pattern)) => Expectation::Masked { mask, pattern },
            _ => Expectation::Observe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Check {
    pub register: Register,
    pub expect: Expectation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub name: String,
    /// Input writes in order. The last one is the trigger.
    pub writes: Vec<(Register, u32)>,
    pub wait: WaitPolicy,
    pub checks: Vec<Check>,
    /// Copy each observed value to Y for waveform inspection.
    pub mirror: bool,
}

impl TestCase {
    pub fn new(name: impl Into<String>, wait: WaitPolicy) -> Self {
        Self {
            name: name.into(),
            writes: Vec::new(),
            wait,
            checks: Vec::new(),
            mirror: false,
        }
    }

    pub fn write(mut self, register: Register, value: u32) -> Self {
        self.writes.push((register, value));
        self
    }

    pub fn check(mut self, register: Register, expect: Expectation) -> Self {
        self.checks.push(Check { register, expect });
        self
    }

    pub fn mirrored(mut self) -> Self {
        self.mirror = true;
        self
    }

    pub fn from_config(config: &CaseConfig, default_max_polls: Option<u32>) -> Self {
        Self {
            name: config.name.clone(),
            writes: config
                .writes
                .iter()
                .map(|w| (w.register.into(), w.value))
                .collect(),
            wait: WaitPolicy::from_config(&config.wait, default_max_polls),
            checks: config
                .checks
                .iter()
                .map(|c| Check {
                    register: c.register.into(),
                    expect: c.into(),
                })
                .collect(),
            mirror: config.mirror,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub register: Register,
    pub observed: u32,
    pub expect: Expectation,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub outcome: Outcome,
    pub wait: WaitOutcome,
    pub checks: Vec<CheckReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub outcome: Outcome,
    pub cases: Vec<CaseReport>,
}

impl Report {
    pub fn case(&self, name: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = (&CaseReport, &CheckReport)> {
        self.cases.iter().flat_map(|case| {
            case.checks
                .iter()
                .filter(|c| c.verdict == Verdict::Mismatch)
                .map(move |c| (case, c))
        })
    }
}

/// Drives a fixed sequence of test cases against one PEU instance.
#[derive(Debug, Default)]
pub struct Sequencer {
    map: RegisterMap,
    observers: Vec<Arc<dyn SequencerObserver>>,
}

impl Sequencer {
    pub fn new(map: RegisterMap) -> Self {
        Self {
            map,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SequencerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Runs every case in order. Stops at the first timeout, since the
    /// peripheral state after a missed completion is unknown.
    pub fn run(&self, bus: &mut dyn Bus, cases: &[TestCase]) -> HarnessResult<Report> {
        for observer in &self.observers {
            observer.on_sequence_start();
        }

        let mut reports = Vec::with_capacity(cases.len());
        for case in cases {
            let report = self.run_case(bus, case)?;
            let timed_out = report.outcome == Outcome::Timeout;
            reports.push(report);
            if timed_out {
                break;
            }
        }

        let outcome = overall(&reports);
        info!("Sequence finished: {}", outcome.as_str());
        for observer in &self.observers {
            observer.on_sequence_end(outcome);
        }

        Ok(Report {
            outcome,
            cases: reports,
        })
    }

    pub fn run_case(&self, bus: &mut dyn Bus, case: &TestCase) -> HarnessResult<CaseReport> {
        info!("Case '{}': {} writes, {:?}", case.name, case.writes.len(), case.wait);
        for observer in &self.observers {
            observer.on_case_start(&case.name);
        }

        for &(register, value) in &case.writes {
            self.write(bus, register, value)?;
        }

        let status_addr = self.map.addr(Register::Status);
        let wait = case.wait.wait(bus, status_addr)?;
        for observer in &self.observers {
            observer.on_wait_end(wait.cycles(), wait.polls());
        }

        if !wait.is_ready() {
            warn!("Case '{}' timed out after {} polls", case.name, wait.polls());
            return Ok(self.finish_case(case, Outcome::Timeout, wait, Vec::new()));
        }

        let mut checks = Vec::with_capacity(case.checks.len());
        for check in &case.checks {
            let observed = self.read(bus, check.register)?;
            let verdict = check.expect.evaluate(observed);
            if verdict == Verdict::Mismatch {
                warn!(
                    "Case '{}': {} = {:#010x}, expected {:?}",
                    case.name, check.register, observed, check.expect
                );
            }
            checks.push(CheckReport {
                register: check.register,
                observed,
                expect: check.expect,
                verdict,
            });
        }

        // Diagnostic side channel, written after all reads of the case.
        if case.mirror {
            for c in &checks {
                self.write(bus, Register::Y, c.observed)?;
            }
        }

        let outcome = if checks.iter().any(|c| c.verdict == Verdict::Mismatch) {
            Outcome::Fail
        } else {
            Outcome::Pass
        };
        Ok(self.finish_case(case, outcome, wait, checks))
    }

    fn finish_case(
        &self,
        case: &TestCase,
        outcome: Outcome,
        wait: WaitOutcome,
        checks: Vec<CheckReport>,
    ) -> CaseReport {
        for observer in &self.observers {
            observer.on_case_end(&case.name, outcome);
        }
        CaseReport {
            name: case.name.clone(),
            outcome,
            wait,
            checks,
        }
    }

    fn write(&self, bus: &mut dyn Bus, register: Register, value: u32) -> HarnessResult<()> {
        let addr = self.map.addr(register);
        debug!("{} [{:#x}] <- {:#010x}", register, addr, value);
        bus.write_u32(addr, value)?;
        for observer in &self.observers {
            observer.on_register_write(addr, value);
        }
        Ok(())
    }

    fn read(&self, bus: &mut dyn Bus, register: Register) -> HarnessResult<u32> {
        let addr = self.map.addr(register);
        let value = bus.read_u32(addr)?;
        debug!("{} [{:#x}] -> {:#010x}", register, addr, value);
        for observer in &self.observers {
            observer.on_register_read(addr, value);
        }
        Ok(value)
    }
}

/// Timeout dominates failure, failure dominates pass.
pub fn overall(cases: &[CaseReport]) -> Outcome {
    if cases.iter().any(|c| c.outcome == Outcome::Timeout) {
        Outcome::Timeout
    } else if cases.iter().any(|c| c.outcome == Outcome::Fail) {
        Outcome::Fail
    } else {
        Outcome::Pass
    }
}
