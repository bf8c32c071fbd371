use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use studyflow::runtime::{FakeClock, FakeFileSystem, FakeTerminal, ProductionRuntime, SeededRandom};

#[test]
fn help_lists_server_flags() {
    let mut cmd = cargo_bin_cmd!("studyflow");
    cmd.arg("--help");
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");

    for flag in [
        "--config",
        "--bind",
        "--data-dir",
        "--session-db",
        "--seed",
        "--check-catalog",
    ] {
        assert!(stdout.contains(flag), "help missing {flag}");
    }
}

#[test]
fn render_help_matches_cli_definition() {
    let help = studyflow::render_help();
    assert!(help.contains("studyflow") || help.contains("Usage"));
    assert!(help.contains("--check-catalog"));
}

#[test]
fn check_catalog_prints_summary_and_exits_zero() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut cmd = cargo_bin_cmd!("studyflow");
    cmd.current_dir(temp.path()).arg("--check-catalog");
    let out = cmd.assert().success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).expect("utf8");
    assert!(stdout.contains("catalog ok: practice=2 main=32"));
    assert!(!temp.path().join(".cache").exists());
}

#[test]
fn check_catalog_applies_config_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = temp.path().join("studyflow.toml");
    std::fs::write(
        &config,
        "[server]\nbind = \"127.0.0.1:0\"\n\n[study]\nseed = 5\n",
    )
    .expect("write config");
    let mut cmd = cargo_bin_cmd!("studyflow");
    cmd.arg("--check-catalog").arg("--config").arg(&config);
    cmd.assert().success();
}

#[test]
fn missing_config_file_exits_nonzero() {
    let temp = tempfile::tempdir().expect("tempdir");
    let mut cmd = cargo_bin_cmd!("studyflow");
    cmd.arg("--check-catalog")
        .arg("--config")
        .arg(temp.path().join("missing.toml"));
    cmd.assert().failure();
}

#[test]
fn invalid_bind_exits_nonzero() {
    let mut cmd = cargo_bin_cmd!("studyflow");
    cmd.arg("--check-catalog").arg("--bind").arg("not-an-address");
    cmd.assert().failure();
}

#[test]
fn unknown_flag_exits_nonzero() {
    let mut cmd = cargo_bin_cmd!("studyflow");
    cmd.arg("--headless");
    cmd.assert().failure();
}

#[test]
fn check_catalog_writes_summary_through_terminal() {
    let terminal = FakeTerminal::default();
    let runtime = ProductionRuntime {
        clock: Arc::new(FakeClock::default()),
        file_system: Arc::new(FakeFileSystem::default()),
        terminal: Arc::new(terminal.clone()),
        random: Arc::new(SeededRandom::from_seed(1)),
    };
    let args: Vec<OsString> = ["studyflow", "--check-catalog", "--seed", "3"]
        .into_iter()
        .map(OsString::from)
        .collect();

    let code = studyflow::run_with_runtime(&args, Path::new("/srv/study"), &runtime)
        .expect("check catalog");
    assert_eq!(code, 0);
    assert_eq!(
        terminal.written_lines(),
        vec!["catalog ok: practice=2 main=32 fp_poor=8 fp_good=8 fn_poor=8 fn_good=8".to_string()]
    );
}
