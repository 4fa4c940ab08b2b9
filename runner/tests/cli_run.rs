//! CLI tests for `e2e-runner run` and `e2e-runner args`.
//!
//! Spawns the binary in a scratch project and checks exit codes and printed
//! invocations.

use std::fs;
use std::process::Command;

use e2e_runner::exit_codes;

#[cfg(unix)]
const FLAKY_RUNNER: &str = include_str!("fixtures/flaky_runner.sh");

#[cfg(unix)]
fn write_project(dir: &std::path::Path, keep_alive: bool, pass_on: u32) {
    fs::write(dir.join("runner.sh"), FLAKY_RUNNER).expect("write runner");
    fs::write(dir.join("pass_on"), pass_on.to_string()).expect("write pass_on");
    fs::write(
        dir.join("e2e-runner.toml"),
        format!(
            "interpreter = \"sh\"\nentrypoint = \"runner.sh\"\nkeep_alive = {keep_alive}\n\n[args]\nspecs = [\"test/a.js\", \"test/b.js\"]\n"
        ),
    )
    .expect("write config");
}

#[cfg(unix)]
#[test]
fn run_with_keep_alive_recovers_and_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_project(temp.path(), true, 2);

    let output = Command::new(env!("CARGO_BIN_EXE_e2e-runner"))
        .current_dir(temp.path())
        .arg("run")
        .output()
        .expect("e2e-runner run");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("attempt 2: --specs test/b.js"));
    assert!(stdout.contains("e2e-runner: attempt 2 reran: test/b.js"));
}

#[cfg(unix)]
#[test]
fn run_without_keep_alive_exits_with_runner_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_project(temp.path(), false, 100);
    fs::write(temp.path().join("exit_code"), "4").expect("write exit_code");

    let status = Command::new(env!("CARGO_BIN_EXE_e2e-runner"))
        .current_dir(temp.path())
        .arg("run")
        .status()
        .expect("e2e-runner run");

    assert_eq!(status.code(), Some(4));
}

#[test]
fn args_prints_translated_invocation() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("protractor.conf.json"),
        r#"{"specs": ["../../test/c.js"]}"#,
    )
    .expect("write runner config");
    fs::write(
        temp.path().join("e2e-runner.toml"),
        r#"
no_color = true
config_file = "protractor.conf.json"

[args]
baseUrl = "http://localhost:9000"
specs = ["a.js"]
verbose = true

[args.capabilities]
browserName = "chrome"
acceptSslCerts = false
"#,
    )
    .expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_e2e-runner"))
        .current_dir(temp.path())
        .args(["args", "--set", "browser=firefox"])
        .output()
        .expect("e2e-runner args");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let tokens: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        tokens,
        vec![
            "node",
            "node_modules/protractor/bin/protractor",
            "protractor.conf.json",
            "--no-jasmineNodeOpts.showColors",
            "--baseUrl",
            "http://localhost:9000",
            "--browser",
            "firefox",
            "--specs",
            "a.js,.tmp/e2e/test/c.js",
            "--verbose",
            "--capabilities.browserName",
            "chrome",
            "--no-capabilities.acceptSslCerts",
        ]
    );
}

#[test]
fn invalid_config_exits_with_invalid_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("e2e-runner.toml"), "keep_alive = \"maybe\"\n")
        .expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_e2e-runner"))
        .current_dir(temp.path())
        .arg("run")
        .output()
        .expect("e2e-runner run");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("load config"));
}
