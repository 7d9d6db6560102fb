//! Built-in test suites and script-to-case conversion.

use crate::regs::{Control, Register};
use crate::sequencer::{Expectation, TestCase};
use crate::wait::WaitPolicy;
use peu_config::{PeuKind, TestScript};
use std::fmt;
use std::str::FromStr;

/// 45 degrees in Q16.16 radians: 0.785398 * 65536.
pub const ANGLE_45: u32 = 0xC910;

pub const ADD_OPERAND_A: u32 = 0x1234_5678;
pub const ADD_OPERAND_B: u32 = 0x0000_ABCD;

/// Upper 16 bits clear, bits 15..8 equal to 0xB5 ("anything 0xB5xx").
pub const SQRT_HALF_BAND: Expectation = Expectation::Masked {
    mask: 0xFFFF_FF00,
    pattern: 0x0000_B500,
};

pub const DEFAULT_MAX_POLLS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suite {
    /// Angle writes with observe-only reads mirrored to Y.
    TrigSmoke,
    /// Same angle writes, with the expected values asserted.
    TrigConformance,
    /// Status-polled add, run twice without reset.
    Adder,
}

impl Suite {
    pub const ALL: [Suite; 3] = [Suite::TrigSmoke, Suite::TrigConformance, Suite::Adder];

    pub fn name(self) -> &'static str {
        match self {
            Suite::TrigSmoke => "trig-smoke",
            Suite::TrigConformance => "trig-conformance",
            Suite::Adder => "adder",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Suite::TrigSmoke => "sin/cos at 0 and 45 degrees, values mirrored to Y, no assertions",
            Suite::TrigConformance => "sin/cos at 0 (exact) and 45 degrees (0xB5xx band)",
            Suite::Adder => "0x12345678 + 0x0000abcd via control start bit and status polling, twice",
        }
    }

    /// Peripheral mode the suite is written for.
    pub fn mode(self) -> PeuKind {
        match self {
            Suite::TrigSmoke | Suite::TrigConformance => PeuKind::Trig,
            Suite::Adder => PeuKind::Adder,
        }
    }

    pub fn cases(self, max_polls: Option<u32>) -> Vec<TestCase> {
        match self {
            Suite::TrigSmoke => trig_smoke(),
            Suite::TrigConformance => trig_conformance(),
            Suite::Adder => adder(max_polls),
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Suite {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Suite::ALL
            .into_iter()
            .find(|suite| suite.name() == s.trim())
            .ok_or_else(|| {
                let known: Vec<_> = Suite::ALL.iter().map(|s| s.name()).collect();
                anyhow::anyhow!("Unknown suite '{}'. Known suites: {}", s, known.join(", "))
            })
    }
}

/// The bring-up smoke test: nothing is asserted in-program. The four
/// observed values land on Y as cos0, sin0, cos45, sin45.
pub fn trig_smoke() -> Vec<TestCase> {
    vec![
        TestCase::new("angle-0", WaitPolicy::fixed(4))
            .write(Register::Angle, 0)
            .check(Register::ResultA, Expectation::Observe)
            .check(Register::ResultB, Expectation::Observe)
            .mirrored(),
        TestCase::new("angle-45", WaitPolicy::fixed(16))
            .write(Register::Angle, ANGLE_45)
            .check(Register::ResultA, Expectation::Observe)
            .check(Register::ResultB, Expectation::Observe)
            .mirrored(),
    ]
}

pub fn trig_conformance() -> Vec<TestCase> {
    vec![
        TestCase::new("angle-0", WaitPolicy::fixed(4))
            .write(Register::Angle, 0)
            .check(Register::ResultA, Expectation::Exact(0x0001_0000))
            .check(Register::ResultB, Expectation::Exact(0x0000_0000)),
        TestCase::new("angle-45", WaitPolicy::fixed(16))
            .write(Register::Angle, ANGLE_45)
            .check(Register::ResultA, SQRT_HALF_BAND)
            .check(Register::ResultB, SQRT_HALF_BAND),
    ]
}

fn add_case(name: &str, max_polls: Option<u32>) -> TestCase {
    let wait = WaitPolicy::PollStatus {
        mask: crate::regs::Status::DONE.bits(),
        max_polls,
    };
    TestCase::new(name, wait)
        .write(Register::X, ADD_OPERAND_A)
        .write(Register::Y, ADD_OPERAND_B)
        .write(Register::Angle, Control::START.bits())
        .check(
            Register::ResultA,
            Expectation::Exact(ADD_OPERAND_A.wrapping_add(ADD_OPERAND_B)),
        )
}

/// The same add issued twice in succession; both runs must agree.
pub fn adder(max_polls: Option<u32>) -> Vec<TestCase> {
    vec![add_case("add", max_polls), add_case("add-repeat", max_polls)]
}

/// Resolves a script into the cases to run. Suites written for the other
/// peripheral mode are rejected, since offset 0x08 means something else.
pub fn load_cases(script: &TestScript) -> anyhow::Result<Vec<TestCase>> {
    let max_polls = script.limits.max_polls;
    if let Some(name) = &script.suite {
        let suite: Suite = name.parse()?;
        if suite.mode() != script.peripheral.mode {
            anyhow::bail!(
                "Suite '{}' targets a {:?} PEU but the script configures {:?}",
                suite,
                suite.mode(),
                script.peripheral.mode
            );
        }
        return Ok(suite.cases(max_polls));
    }

    Ok(script
        .cases
        .iter()
        .map(|c| TestCase::from_config(c, max_polls))
        .collect())
}
