//! CLI binary integration tests.
//!
//! These exercise the compiled `plotbox` binary: command routing, help text,
//! and one-shot runs through real worker processes.

use std::process::Command;

fn plotbox_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_plotbox"));
    cmd.env_remove("PLOTBOX_CONFIG").env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_cli_version() {
    let output = plotbox_cmd()
        .arg("version")
        .output()
        .expect("failed to run plotbox");
    assert!(output.status.success(), "version command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("plotbox "), "got: {}", stdout);
}

#[test]
fn test_cli_help_hides_worker() {
    let output = plotbox_cmd()
        .arg("--help")
        .output()
        .expect("failed to run plotbox");
    assert!(output.status.success(), "--help should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("serve"), "got: {}", stdout);
    assert!(stdout.contains("run"), "got: {}", stdout);
    assert!(!stdout.contains("worker"), "got: {}", stdout);
}

#[test]
fn test_cli_unknown_command() {
    let output = plotbox_cmd()
        .arg("nonexistent-command")
        .output()
        .expect("failed to run plotbox");
    assert!(!output.status.success());
}

#[test]
fn test_cli_run_script() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("sine.js");
    std::fs::write(
        &script,
        "print('drawing'); plot_function(Math.sin, -3.14, 3.14, 50);",
    )
    .unwrap();

    let output = plotbox_cmd()
        .args(["run", "--timeout", "10"])
        .arg(&script)
        .output()
        .expect("failed to run plotbox run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["stdout"], "drawing\n");
    assert_eq!(result["plot"]["renderers"][0]["x"].as_array().unwrap().len(), 50);
}

#[test]
fn test_cli_run_failure_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("broken.js");
    std::fs::write(&script, "throw new Error('broken on purpose');").unwrap();

    let output = plotbox_cmd()
        .args(["run", "--timeout", "10"])
        .arg(&script)
        .output()
        .expect("failed to run plotbox run");
    assert!(!output.status.success());

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["success"], false);
    assert!(result["stderr"]
        .as_str()
        .unwrap()
        .contains("broken on purpose"));
}

#[test]
fn test_cli_config_show_with_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plotbox.json5");
    std::fs::write(&path, "{ server: { port: 9123 } }").unwrap();

    let output = plotbox_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "get", "server.port"])
        .env_remove("PLOTBOX_PORT")
        .output()
        .expect("failed to run plotbox config get");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "9123");
}
