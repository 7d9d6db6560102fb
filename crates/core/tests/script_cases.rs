use peu_config::TestScript;
use peu_core::bus::SystemBus;
use peu_core::regs::RegisterMap;
use peu_core::sequencer::{Sequencer, Verdict};
use peu_core::suites;
use peu_core::Outcome;

fn run_script(yaml: &str) -> anyhow::Result<(peu_core::sequencer::Report, SystemBus)> {
    let script: TestScript = serde_yaml::from_str(yaml)?;
    script.validate()?;
    let mut bus = SystemBus::from_config(&script.peripheral)?;
    let cases = suites::load_cases(&script)?;
    let sequencer = Sequencer::new(RegisterMap::new(script.peripheral.base_address));
    let report = sequencer.run(&mut bus, &cases)?;
    Ok((report, bus))
}

#[test]
fn test_inline_add_case() -> anyhow::Result<()> {
    let (report, _) = run_script(
        r#"
schema_version: "1.0"
peripheral:
  base_address: 0x10000000
  mode: adder
  latency_cycles: 5
cases:
  - name: add
    writes:
      - { register: operand_a, value: 0x12345678 }
      - { register: operand_b, value: 0x0000abcd }
      - { register: control, value: 1 }
    wait: { poll_status: { max_polls: 20 } }
    checks:
      - { register: result_a, exact: 0x12350245 }
"#,
    )?;
    assert_eq!(report.outcome, Outcome::Pass);
    assert_eq!(report.cases[0].wait.polls(), 6);
    Ok(())
}

#[test]
fn test_script_limits_bound_suite_polls() -> anyhow::Result<()> {
    let (report, _) = run_script(
        r#"
schema_version: "1.0"
peripheral:
  mode: adder
  stuck: true
suite: adder
limits:
  max_polls: 12
"#,
    )?;
    assert_eq!(report.outcome, Outcome::Timeout);
    assert_eq!(report.cases[0].wait.polls(), 12);
    Ok(())
}

#[test]
fn test_observe_only_case_with_mirror() -> anyhow::Result<()> {
    let (report, bus) = run_script(
        r#"
schema_version: "1.0"
peripheral:
  mode: trig
  latency_cycles: 16
cases:
  - name: angle-45
    writes: [{ register: angle, value: 51472 }]
    wait: { fixed_delay: 16 }
    checks:
      - { register: cos, observe: true }
      - { register: sin, observe: true }
    mirror: true
"#,
    )?;
    assert_eq!(report.outcome, Outcome::Pass);
    assert_eq!(report.cases[0].checks[0].verdict, Verdict::Observed);
    let log = bus.peu().unwrap().output_log();
    assert_eq!(log, &[0x0000_B505, 0x0000_B505]);
    Ok(())
}

#[test]
fn test_suite_mode_mismatch_is_rejected() -> anyhow::Result<()> {
    let script: TestScript = serde_yaml::from_str(
        r#"
schema_version: "1.0"
peripheral:
  mode: adder
suite: trig-conformance
"#,
    )?;
    script.validate()?;
    let err = suites::load_cases(&script).unwrap_err();
    assert!(err.to_string().contains("targets a Trig PEU"));
    Ok(())
}

#[test]
fn test_misaligned_base_is_rejected() -> anyhow::Result<()> {
    let script: TestScript = serde_yaml::from_str(
        r#"
schema_version: "1.0"
peripheral:
  base_address: 0x10000002
  mode: trig
suite: trig-smoke
"#,
    )?;
    assert!(SystemBus::from_config(&script.peripheral).is_err());
    Ok(())
}

#[test]
fn test_base_at_end_of_address_space_is_rejected() -> anyhow::Result<()> {
    let script: TestScript = serde_yaml::from_str(
        r#"
schema_version: "1.0"
peripheral:
  base_address: 0xFFFFFFFFFFFFFFF0
  mode: adder
suite: adder
"#,
    )?;
    script.validate()?;
    let err = SystemBus::from_config(&script.peripheral).unwrap_err();
    assert!(err.to_string().contains("end of the address space"));
    assert!(run_script(
        r#"
schema_version: "1.0"
peripheral:
  base_address: 0xFFFFFFFFFFFFFFF0
  mode: adder
suite: adder
"#
    )
    .is_err());
    Ok(())
}
