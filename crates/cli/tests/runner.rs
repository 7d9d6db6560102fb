use std::process::Command;

fn harness() -> Command {
    Command::new(env!("CARGO_BIN_EXE_peu-harness"))
}

#[test]
fn test_cli_help() {
    let output = harness()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("register test sequencer"));
}

#[test]
fn test_cli_lists_suites() {
    let output = harness()
        .arg("suites")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("trig-smoke"));
    assert!(stdout.contains("trig-conformance"));
    assert!(stdout.contains("adder"));
}

#[test]
fn test_cli_prints_register_map() {
    let output = harness()
        .args(["regs", "--base", "0x2000_0000"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("0x2000000c"));
    assert!(stdout.contains("STATUS"));
}

#[test]
fn test_cli_suites_pass() {
    for suite in ["trig-smoke", "trig-conformance", "adder"] {
        let status = harness()
            .args(["run", "--suite", suite])
            .status()
            .expect("Failed to execute command");
        assert_eq!(status.code(), Some(0), "suite {} should pass", suite);
    }
}

#[test]
fn test_cli_stuck_peripheral_times_out() {
    let status = harness()
        .args(["run", "--suite", "adder", "--stuck", "--max-polls", "10"])
        .status()
        .expect("Failed to execute command");
    assert_eq!(status.code(), Some(4));
}

#[test]
fn test_cli_slow_peripheral_fails_conformance() {
    let status = harness()
        .args(["run", "--suite", "trig-conformance", "--latency", "8"])
        .status()
        .expect("Failed to execute command");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn test_cli_unknown_suite_is_config_error() {
    let status = harness()
        .args(["run", "--suite", "cordic"])
        .status()
        .expect("Failed to execute command");
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_cli_base_past_address_space_is_config_error() {
    let status = harness()
        .args(["run", "--suite", "adder", "--base", "0xFFFFFFFFFFFFFFF0"])
        .status()
        .expect("Failed to execute command");
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_cli_missing_script() {
    let output = harness()
        .args(["run", "--script", "non_existent_script.yaml"])
        .output()
        .expect("Failed to execute command");

    // It should fail because file is missing
    assert_eq!(output.status.code(), Some(2));
}
