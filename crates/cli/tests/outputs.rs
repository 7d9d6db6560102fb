use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("peu-harness-{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn read_result(dir: &std::path::Path) -> serde_json::Value {
    let content = std::fs::read_to_string(dir.join("result.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_cli_suite_outputs() {
    let dir = temp_dir("suite");
    let output_dir = dir.join("artifacts");

    let output = Command::new(env!("CARGO_BIN_EXE_peu-harness"))
        .args([
            "run",
            "--suite",
            "adder",
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert!(output_dir.join("script.yaml").exists());

    let junit = std::fs::read_to_string(output_dir.join("junit.xml")).unwrap();
    assert!(junit.contains("<testsuite"));
    assert!(junit.contains("name=\"add-repeat\""));

    let result = read_result(&output_dir);
    assert_eq!(result["status"], "pass");
    assert_eq!(result["outcome"], "pass");
    assert_eq!(result["config"]["suite"], "adder");
    assert_eq!(result["config"]["max_polls"], 1000);
    assert_eq!(result["report"]["cases"][0]["checks"][0]["observed"], 0x1235_0245u32);
    assert_eq!(result["report"]["cases"][1]["checks"][0]["observed"], 0x1235_0245u32);
    assert_eq!(result["metrics"]["cases"], 2);
    assert!(result["elapsed_secs"].as_f64().unwrap() >= 0.0);
    assert_eq!(result["script_hash"].as_str().unwrap().len(), 64);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_script_expecting_timeout() {
    let dir = temp_dir("timeout");
    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
peripheral:
  mode: adder
  stuck: true
suite: adder
limits:
  max_polls: 16
assertions:
  - expected_outcome: timeout
"#,
    )
    .unwrap();
    let junit_path = dir.join("reports").join("junit.xml");
    let output_dir = dir.join("artifacts");

    let output = Command::new(env!("CARGO_BIN_EXE_peu-harness"))
        .args([
            "run",
            "--script",
            script_path.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
            "--junit",
            junit_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    // The timeout is what the script asked for.
    assert!(output.status.success());

    let result = read_result(&output_dir);
    assert_eq!(result["status"], "pass");
    assert_eq!(result["outcome"], "timeout");
    assert_eq!(result["assertions"][0]["passed"], true);
    assert_eq!(result["report"]["cases"][0]["wait"]["state"], "timed_out");
    assert_eq!(result["report"]["cases"][0]["wait"]["polls"], 16);

    let junit = std::fs::read_to_string(&junit_path).unwrap();
    assert!(junit.contains("<error message=\"timeout\">"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_output_log_assertion() {
    let dir = temp_dir("outlog");
    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
peripheral:
  mode: trig
suite: trig-smoke
assertions:
  - output_log: [0x00010000, 0x00000000, 0x0000b505, 0x0000b505]
"#,
    )
    .unwrap();
    let output_dir = dir.join("artifacts");

    let output = Command::new(env!("CARGO_BIN_EXE_peu-harness"))
        .args([
            "run",
            "--script",
            script_path.to_str().unwrap(),
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let result = read_result(&output_dir);
    assert_eq!(result["output_log"][2], 0xB505);
    assert_eq!(result["report"]["cases"][0]["checks"][0]["verdict"], "observed");

    // Same script on a slow peripheral: the stale first read breaks the log.
    let output = Command::new(env!("CARGO_BIN_EXE_peu-harness"))
        .args([
            "run",
            "--script",
            script_path.to_str().unwrap(),
            "--latency",
            "8",
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let result = read_result(&output_dir);
    assert_eq!(result["status"], "fail");
    assert_eq!(result["outcome"], "pass");
    assert_eq!(result["assertions"][0]["passed"], false);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_invalid_script_is_config_error() {
    let dir = temp_dir("invalid");
    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "2.0"
peripheral:
  mode: trig
suite: trig-smoke
"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_peu-harness"))
        .args(["run", "--script", script_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&dir);
}
