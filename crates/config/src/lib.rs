use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default platform base address of the PEU register block.
pub const DEFAULT_BASE_ADDRESS: u64 = 0x1000_0000;

/// Default completion latency of the simulated PEU, in bus cycles.
pub const DEFAULT_LATENCY_CYCLES: u32 = 4;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeuKind {
    /// Writing the angle register starts a Q16.16 sin/cos computation.
    Trig,
    /// Writing the control register with the start bit starts `A + B`.
    Adder,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PeripheralDescriptor {
    #[serde(default = "default_base_address")]
    pub base_address: u64,
    pub mode: PeuKind,
    #[serde(default = "default_latency_cycles")]
    pub latency_cycles: u32,
    /// Fault injection: the peripheral never completes.
    #[serde(default)]
    pub stuck: bool,
}

fn default_base_address() -> u64 {
    DEFAULT_BASE_ADDRESS
}

fn default_latency_cycles() -> u32 {
    DEFAULT_LATENCY_CYCLES
}

impl PeripheralDescriptor {
    pub fn new(mode: PeuKind) -> Self {
        Self {
            base_address: DEFAULT_BASE_ADDRESS,
            mode,
            latency_cycles: DEFAULT_LATENCY_CYCLES,
            stuck: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegisterName {
    #[serde(alias = "operand_a")]
    X,
    #[serde(alias = "operand_b")]
    Y,
    #[serde(alias = "control")]
    Angle,
    Status,
    #[serde(alias = "cos")]
    ResultA,
    #[serde(alias = "sin")]
    ResultB,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WriteStep {
    pub register: RegisterName,
    pub value: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    #[serde(default = "default_done_mask")]
    pub mask: u32,
    #[serde(default)]
    pub max_polls: Option<u32>,
}

fn default_done_mask() -> u32 {
    0x1
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum WaitConfig {
    FixedDelay(u32),
    PollStatus(PollConfig),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    pub register: RegisterName,
    #[serde(default)]
    pub exact: Option<u32>,
    #[serde(default)]
    pub mask: Option<u32>,
    #[serde(default)]
    pub pattern: Option<u32>,
    #[serde(default)]
    pub observe: bool,
}

impl CheckConfig {
    fn validate(&self, case: &str) -> Result<()> {
        let forms = [
            self.exact.is_some(),
            self.mask.is_some() || self.pattern.is_some(),
            self.observe,
        ];
        if forms.iter().filter(|f| **f).count() != 1 {
            anyhow::bail!(
                "Check on {:?} in case '{}' must use exactly one of 'exact', 'mask'+'pattern' or 'observe'",
                self.register,
                case
            );
        }
        if self.mask.is_some() != self.pattern.is_some() {
            anyhow::bail!(
                "Check on {:?} in case '{}' needs both 'mask' and 'pattern'",
                self.register,
                case
            );
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CaseConfig {
    pub name: String,
    pub writes: Vec<WriteStep>,
    pub wait: WaitConfig,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
    /// Copy every observed value to the Y register.
    #[serde(default)]
    pub mirror: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    /// Bound applied to status polls that do not carry their own.
    #[serde(default)]
    pub max_polls: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    Timeout,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Fail => "fail",
            Outcome::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutcomeAssertion {
    pub expected_outcome: Outcome,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputLogAssertion {
    pub output_log: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum TestAssertion {
    ExpectedOutcome(OutcomeAssertion),
    OutputLog(OutputLogAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    pub peripheral: PeripheralDescriptor,
    #[serde(default)]
    pub suite: Option<String>,
    #[serde(default)]
    pub cases: Vec<CaseConfig>,
    #[serde(default)]
    pub limits: TestLimits,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

impl TestScript {
    /// Script running one of the built-in suites against a default peripheral.
    pub fn for_suite(suite: &str, mode: PeuKind) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            peripheral: PeripheralDescriptor::new(mode),
            suite: Some(suite.to_string()),
            cases: Vec::new(),
            limits: TestLimits::default(),
            assertions: Vec::new(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open test script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse Test Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        match (&self.suite, self.cases.is_empty()) {
            (Some(_), false) => anyhow::bail!("Use either 'suite' or 'cases', not both"),
            (None, true) => anyhow::bail!("Script must name a 'suite' or list 'cases'"),
            (Some(suite), true) if suite.trim().is_empty() => {
                anyhow::bail!("Input 'suite' cannot be empty")
            }
            _ => {}
        }

        if self.limits.max_polls == Some(0) {
            anyhow::bail!("Limit 'max_polls' must be greater than zero");
        }

        for case in &self.cases {
            if case.name.trim().is_empty() {
                anyhow::bail!("Case name cannot be empty");
            }
            if case.writes.is_empty() {
                anyhow::bail!(
                    "Case '{}' needs at least one write (the last write triggers the PEU)",
                    case.name
                );
            }
            if let WaitConfig::PollStatus(poll) = &case.wait {
                if poll.mask == 0 {
                    anyhow::bail!("Case '{}' polls status with an empty mask", case.name);
                }
                if poll.max_polls == Some(0) {
                    anyhow::bail!("Case '{}' has 'max_polls' of zero", case.name);
                }
            }
            for check in &case.checks {
                check.validate(&case.name)?;
            }
        }

        Ok(())
    }
}
