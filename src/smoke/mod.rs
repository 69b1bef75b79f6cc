//! Smoke test of a built Browservice executable.
//!
//! Three checks run in order: `--version`, a scripted browser session over
//! HTTP against a loopback port, and (Linux with network access only) the
//! Verdana font installer. Progress goes to stdout with a timestamped
//! `>>> Browservice smoke test` prefix so it interleaves readably with the
//! output of the process under test.

pub mod browser;
pub mod frame;
pub mod launch;
pub mod verdana;

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use time::OffsetDateTime;

use crate::config::SmokeConfig;
use launch::{launch, LaunchOptions};

pub const USAGE: &str = "Usage: smoke-test <browservice executable path> all|offline";

const VERSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether the browser session may reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    All,
    Offline,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Mode::All),
            "offline" => Ok(Mode::Offline),
            _ => bail!("{USAGE}"),
        }
    }
}

impl Mode {
    pub fn allow_online(self) -> bool {
        self == Mode::All
    }
}

fn log_prefix() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        ">>> Browservice smoke test :: {:04}/{:02}/{:02} {:02}:{:02}:{:02}.{:06}",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.microsecond()
    )
}

pub fn log(msg: impl Display) {
    println!("{} -- {}", log_prefix(), msg);
}

/// Print a failure to both stdout and stderr.
pub fn report_failure(msg: impl Display) {
    let prefix = log_prefix();
    println!("{prefix} !! FAIL: {msg}");
    eprintln!("{prefix} !! FAIL: {msg}");
}

/// `--version` must exit with `expected_status`.
pub fn version_test(exe: &Path, expected_status: i32) -> Result<()> {
    log("Running version test");

    log("Running browservice with --version");
    let mut process = launch(exe, &["--version"], LaunchOptions::default())?;
    let status = process.wait_timeout(VERSION_TIMEOUT)?;

    log(format!(
        "Browservice exited, checking exit status (expected {expected_status})"
    ));
    if status.code() != Some(expected_status) {
        bail!("Browservice exit status is {status} != {expected_status}");
    }

    log("Version test completed successfully");
    Ok(())
}

/// Run every check applicable to `mode` and the host.
pub fn run(exe: &Path, mode: Mode, config: &SmokeConfig) -> Result<()> {
    version_test(exe, config.expected_version_exit_status)?;

    browser::browser_test(exe, mode, config)?;

    if cfg!(target_os = "linux") && mode.allow_online() {
        verdana::verdana_installation_test(exe)?;
    }

    log(format!(
        "{} Browservice smoke tests completed successfully",
        if mode.allow_online() { "All" } else { "Offline" }
    ));
    Ok(())
}
