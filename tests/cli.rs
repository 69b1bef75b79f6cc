//! Exit status and messages of the binaries on rejected invocations.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn relaxed_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, "max_workspace_path_len = 4096\n").unwrap();
    path
}

fn run(bin: &str, config: &Path, args: &[&str]) -> Output {
    Command::new(bin)
        .args(args)
        .env("BROWSERVICE_BUILD_CONFIG", config)
        .output()
        .unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn unsupported_architecture_fails_without_workspace() {
    let temp = TempDir::new().unwrap();
    let config = relaxed_config(temp.path());
    let ws = temp.path().join("ws");
    let out = temp.path().join("out.tar.bz2");

    let output = run(
        env!("CARGO_BIN_EXE_build-patched-cef"),
        &config,
        &[ws.to_str().unwrap(), out.to_str().unwrap(), "sparc64"],
    );

    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.starts_with("FAIL: "), "{err}");
    if cfg!(any(target_os = "linux", windows)) {
        assert!(err.contains("Architecture 'sparc64' not supported"), "{err}");
    }
    assert!(!ws.exists());
    assert!(!out.exists());
}

#[test]
fn bad_commit_is_rejected_first() {
    let temp = TempDir::new().unwrap();
    let config = relaxed_config(temp.path());
    let output = run(
        env!("CARGO_BIN_EXE_build-patched-cef"),
        &config,
        &["ws", "out", "x86_64", "5304", "NOTHEX!"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("commit"));
}

#[test]
fn wrong_arity_prints_usage() {
    let temp = TempDir::new().unwrap();
    let config = relaxed_config(temp.path());
    let output = run(env!("CARGO_BIN_EXE_build-windows"), &config, &["windows64"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("FAIL: Usage: build-windows"));
}

#[test]
fn distribution_rejects_non_windows_arch() {
    let temp = TempDir::new().unwrap();
    let config = relaxed_config(temp.path());
    let archive = temp.path().join("cef.tar.bz2");
    fs::write(&archive, b"").unwrap();
    let ws = temp.path().join("ws");
    let output = run(
        env!("CARGO_BIN_EXE_build-windows"),
        &config,
        &[
            "x86_64",
            "master",
            archive.to_str().unwrap(),
            ws.to_str().unwrap(),
            temp.path().join("out.zip").to_str().unwrap(),
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid arch 'x86_64'"));
    assert!(!ws.exists());
}

#[test]
fn malformed_config_is_a_failure() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("config.toml");
    fs::write(&config, "no_such_key = 1\n").unwrap();
    let output = run(env!("CARGO_BIN_EXE_build-patched-cef"), &config, &["a", "b", "c"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("parsing build config"));
}

#[test]
fn smoke_test_usage() {
    let temp = TempDir::new().unwrap();
    let config = relaxed_config(temp.path());
    let output = run(env!("CARGO_BIN_EXE_smoke-test"), &config, &["only-one"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("!! FAIL: Usage: smoke-test"));
}
