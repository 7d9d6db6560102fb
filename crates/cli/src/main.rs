use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use peu_config::{Outcome, TestAssertion, TestScript};
use peu_core::bus::SystemBus;
use peu_core::metrics::{HarnessMetrics, MetricsSnapshot};
use peu_core::regs::{Register, RegisterMap};
use peu_core::sequencer::{Report, Sequencer, Verdict};
use peu_core::suites::{self, Suite, DEFAULT_MAX_POLLS};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;
const EXIT_TIMEOUT: u8 = 4;

const RESULT_SCHEMA_VERSION: &str = "1.0";

fn parse_u64_addr(s: &str) -> Result<u64, String> {
    let trimmed = s.trim();
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u64::from_str_radix(&hex.replace('_', ""), 16).map_err(|e| e.to_string())
    } else {
        trimmed.parse::<u64>().map_err(|e| e.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "PEU Harness - register test sequencer",
    long_about = None
)]
struct Cli {
    /// Enable register-level tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a built-in suite or a test script against the simulated PEU
    Run(RunArgs),
    /// List built-in suites
    Suites,
    /// Print the PEU register map
    Regs {
        /// Base address of the register block
        #[arg(long, value_parser = parse_u64_addr)]
        base: Option<u64>,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Built-in suite to run (see `suites`)
    #[arg(long, conflicts_with = "script", required_unless_present = "script")]
    suite: Option<String>,

    /// Path to the test script (YAML)
    #[arg(short = 'c', long)]
    script: Option<PathBuf>,

    /// Override the PEU base address
    #[arg(long, value_parser = parse_u64_addr)]
    base: Option<u64>,

    /// Override the simulated completion latency (cycles)
    #[arg(long)]
    latency: Option<u32>,

    /// Simulate a peripheral that never completes
    #[arg(long)]
    stuck: bool,

    /// Upper bound on status polls (takes precedence over script)
    #[arg(long)]
    max_polls: Option<u32>,

    /// Directory to write test artifacts (result.json, script.yaml, junit.xml)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Optional path to write a JUnit XML report for CI systems
    #[arg(long)]
    junit: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    outcome: Outcome,
    cycles: u64,
    elapsed_secs: f64,
    metrics: MetricsSnapshot,
    report: Report,
    assertions: Vec<AssertionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_log: Option<Vec<u32>>,
    script_hash: String,
    config: TestConfig,
}

#[derive(Debug, Serialize, Clone)]
struct AssertionResult {
    assertion: TestAssertion,
    passed: bool,
}

#[derive(Debug, Serialize)]
struct TestConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    script: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suite: Option<String>,
    base_address: u64,
    latency_cycles: u32,
    stuck: bool,
    max_polls: Option<u32>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with appropriate level based on --trace flag
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Suites => {
            for suite in Suite::ALL {
                println!("{:<18} {}", suite.name(), suite.description());
            }
            ExitCode::from(EXIT_PASS)
        }
        Commands::Regs { base } => {
            let map = RegisterMap::new(base.unwrap_or(peu_core::regs::PEU_BASE));
            for reg in Register::ALL {
                println!("{:#010x}  {:<9} {}", map.addr(reg), reg.name(), reg.role());
            }
            ExitCode::from(EXIT_PASS)
        }
    }
}

/// Loads the script (or synthesizes one for `--suite`) and applies CLI overrides.
fn resolve_script(args: &RunArgs) -> anyhow::Result<(TestScript, Vec<u8>)> {
    let (mut script, source) = match (&args.script, &args.suite) {
        (Some(path), _) => {
            info!("Loading test script: {:?}", path);
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read test script at {:?}", path))?;
            (TestScript::from_file(path)?, bytes)
        }
        (None, Some(name)) => {
            let suite: Suite = name.parse()?;
            (
                TestScript::for_suite(suite.name(), suite.mode()),
                suite.name().as_bytes().to_vec(),
            )
        }
        (None, None) => anyhow::bail!("Either --suite or --script is required"),
    };

    if let Some(base) = args.base {
        script.peripheral.base_address = base;
    }
    if let Some(latency) = args.latency {
        script.peripheral.latency_cycles = latency;
    }
    if args.stuck {
        script.peripheral.stuck = true;
    }
    // Never spin forever from the CLI.
    script.limits.max_polls = args
        .max_polls
        .or(script.limits.max_polls)
        .or(Some(DEFAULT_MAX_POLLS));

    script.validate()?;
    Ok((script, source))
}

fn run(args: RunArgs) -> ExitCode {
    let start = Instant::now();

    let (script, source) = match resolve_script(&args) {
        Ok(v) => v,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let cases = match suites::load_cases(&script) {
        Ok(c) => c,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let mut bus = match SystemBus::from_config(&script.peripheral) {
        Ok(b) => b,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(HarnessMetrics::new());
    let sequencer = Sequencer::new(RegisterMap::new(script.peripheral.base_address))
        .with_observer(metrics.clone());

    info!("Running {} case(s)...", cases.len());
    let report = match sequencer.run(&mut bus, &cases) {
        Ok(r) => r,
        Err(e) => {
            error!("Bus error: {}", e);
            return ExitCode::from(EXIT_RUNTIME_ERROR);
        }
    };

    for case in &report.cases {
        info!("  {:<20} {}", case.name, case.outcome.as_str());
        for check in &case.checks {
            let marker = match check.verdict {
                Verdict::Match => "ok",
                Verdict::Mismatch => "MISMATCH",
                Verdict::Observed => "observed",
            };
            info!(
                "    {:<9} = {:#010x} ({})",
                check.register.name(),
                check.observed,
                marker
            );
        }
    }

    let output_log = bus.peu().map(|p| p.output_log().to_vec());
    let assertions: Vec<AssertionResult> = script
        .assertions
        .iter()
        .map(|assertion| {
            let passed = match assertion {
                TestAssertion::ExpectedOutcome(a) => a.expected_outcome == report.outcome,
                TestAssertion::OutputLog(a) => output_log.as_deref() == Some(&a.output_log[..]),
            };
            if !passed {
                warn!("Assertion failed: {}", assertion_short_name(assertion));
            }
            AssertionResult {
                assertion: assertion.clone(),
                passed,
            }
        })
        .collect();

    // An explicit expected_outcome assertion replaces the default "must pass".
    let outcome_asserted = assertions
        .iter()
        .any(|a| matches!(a.assertion, TestAssertion::ExpectedOutcome(_)));
    let any_assertion_failed = assertions.iter().any(|a| !a.passed);

    let (status, code) = if any_assertion_failed {
        ("fail", EXIT_ASSERT_FAIL)
    } else if outcome_asserted {
        ("pass", EXIT_PASS)
    } else {
        match report.outcome {
            Outcome::Pass => ("pass", EXIT_PASS),
            Outcome::Fail => ("fail", EXIT_ASSERT_FAIL),
            Outcome::Timeout => ("timeout", EXIT_TIMEOUT),
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(&source);
    let script_hash = format!("{:x}", hasher.finalize());

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        outcome: report.outcome,
        cycles: bus.cycles(),
        elapsed_secs: metrics.elapsed_secs(),
        metrics: metrics.snapshot(),
        report,
        assertions,
        output_log,
        script_hash,
        config: TestConfig {
            script: args.script.clone(),
            suite: script.suite.clone(),
            base_address: script.peripheral.base_address,
            latency_cycles: script.peripheral.latency_cycles,
            stuck: script.peripheral.stuck,
            max_polls: script.limits.max_polls,
        },
    };

    write_outputs(&args, &script, &result, start.elapsed());

    info!("Result: {} (outcome {})", status, result.outcome.as_str());
    ExitCode::from(code)
}

fn write_outputs(
    args: &RunArgs,
    script: &TestScript,
    result: &TestResult,
    duration: std::time::Duration,
) {
    if let Some(output_dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            error!("Failed to create output directory {:?}: {}", output_dir, e);
        } else {
            // result.json
            let result_path = output_dir.join("result.json");
            match std::fs::File::create(&result_path) {
                Ok(f) => {
                    if let Err(e) = serde_json::to_writer_pretty(f, result) {
                        error!("Failed to write result.json: {}", e);
                    }
                }
                Err(e) => error!("Failed to create result.json: {}", e),
            }

            // script.yaml: the effective script after overrides
            let script_path = output_dir.join("script.yaml");
            match std::fs::File::create(&script_path) {
                Ok(f) => {
                    if let Err(e) = serde_yaml::to_writer(f, script) {
                        error!("Failed to write script.yaml: {}", e);
                    }
                }
                Err(e) => error!("Failed to create script.yaml: {}", e),
            }

            // junit.xml
            let junit_path = output_dir.join("junit.xml");
            if let Err(e) = write_junit_xml(&junit_path, result, duration) {
                error!("Failed to write junit.xml: {}", e);
            }
        }
    }

    if let Some(junit_path) = &args.junit {
        if let Some(parent) = junit_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = write_junit_xml(junit_path, result, duration) {
            error!("Failed to write JUnit report {:?}: {}", junit_path, e);
        }
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn write_junit_xml(
    path: &Path,
    result: &TestResult,
    duration: std::time::Duration,
) -> std::io::Result<()> {
    let cases = &result.report.cases;
    let assertion_failures = result.assertions.iter().filter(|a| !a.passed).count();
    let case_failures = cases
        .iter()
        .filter(|c| c.outcome == Outcome::Fail)
        .count();
    let case_errors = cases
        .iter()
        .filter(|c| c.outcome == Outcome::Timeout)
        .count();

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!(
        "<testsuite name=\"peu-harness\" tests=\"{}\" failures=\"{}\" errors=\"{}\" time=\"{:.3}\">\n",
        cases.len() + result.assertions.len(),
        case_failures + assertion_failures,
        case_errors,
        duration.as_secs_f64()
    ));
    xml.push_str(&format!(
        "  <properties>\n    <property name=\"script_hash\" value=\"{}\"/>\n    <property name=\"outcome\" value=\"{}\"/>\n  </properties>\n",
        xml_escape(&result.script_hash),
        result.outcome.as_str()
    ));

    for case in cases {
        xml.push_str(&format!(
            "  <testcase classname=\"peu\" name=\"{}\">\n",
            xml_escape(&case.name)
        ));
        match case.outcome {
            Outcome::Pass => {}
            Outcome::Fail => {
                let mut details = String::new();
                for check in case.checks.iter().filter(|c| c.verdict == Verdict::Mismatch) {
                    details.push_str(&format!(
                        "{} = {:#010x}, expected {:?}\n",
                        check.register, check.observed, check.expect
                    ));
                }
                xml.push_str(&format!(
                    "    <failure message=\"register mismatch\">{}</failure>\n",
                    xml_escape(&details)
                ));
            }
            Outcome::Timeout => {
                xml.push_str(&format!(
                    "    <error message=\"timeout\">status never completed after {} polls</error>\n",
                    case.wait.polls()
                ));
            }
        }
        xml.push_str("  </testcase>\n");
    }

    for a in &result.assertions {
        xml.push_str(&format!(
            "  <testcase classname=\"assertion\" name=\"{}\">\n",
            xml_escape(&assertion_short_name(&a.assertion))
        ));
        if !a.passed {
            xml.push_str("    <failure message=\"assertion failed\"/>\n");
        }
        xml.push_str("  </testcase>\n");
    }

    xml.push_str("</testsuite>\n");
    std::fs::write(path, xml)
}

fn assertion_short_name(assertion: &TestAssertion) -> String {
    match assertion {
        TestAssertion::ExpectedOutcome(a) => {
            format!("expected_outcome: {}", a.expected_outcome.as_str())
        }
        TestAssertion::OutputLog(a) => {
            let values: Vec<String> = a.output_log.iter().map(|v| format!("{:#x}", v)).collect();
            format!("output_log: [{}]", values.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_u64_addr() {
        assert_eq!(parse_u64_addr("0x1000_0000").unwrap(), 0x1000_0000);
        assert_eq!(parse_u64_addr("0X40").unwrap(), 0x40);
        assert_eq!(parse_u64_addr("4096").unwrap(), 4096);
        assert!(parse_u64_addr("0xZZ").is_err());
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b & 'c'"), "a&lt;b &amp; &apos;c&apos;");
    }
}
