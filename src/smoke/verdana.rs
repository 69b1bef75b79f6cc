use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tempfile::TempDir;

use super::launch::{launch, LaunchOptions};
use super::log;

pub const EXPECTED_VERDANA_SIZE: u64 = 139_640;

const STARTUP_WAIT: Duration = Duration::from_secs(20);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(180);

/// `--install-verdana` into a throwaway home directory.
pub fn verdana_installation_test(exe: &Path) -> Result<()> {
    log("Running Verdana installation test");

    let home = TempDir::new().context("creating fake home directory")?;
    log(format!("Created fake home directory {}", home.path().display()));

    log("Starting Browservice with --install-verdana with fake home directory");
    let mut process = launch(
        exe,
        &["--install-verdana"],
        LaunchOptions {
            piped_stdin: true,
            env: vec![("HOME", home.path().as_os_str())],
        },
    )?;

    log("Waiting 20s to allow for the process to start");
    thread::sleep(STARTUP_WAIT);

    log("Sending 'yes' to stdin and waiting for the process to terminate");
    process.feed_stdin(b"yes\n")?;
    let status = process.wait_timeout(INSTALL_TIMEOUT)?;

    log("Browservice exited, checking exit status");
    if status.code() != Some(0) {
        bail!("Browservice exit status is {status} != 0");
    }

    check_installed_font(home.path())?;
    log("Verdana installation test completed successfully");
    Ok(())
}

fn check_installed_font(home: &Path) -> Result<()> {
    let verdana = home
        .join(".browservice")
        .join("appimage")
        .join("fonts")
        .join("Verdana.ttf");
    log(format!("Checking that Verdana was installed to {}", verdana.display()));
    if !verdana.is_file() {
        bail!("{} is not a file", verdana.display());
    }
    let size = verdana
        .metadata()
        .with_context(|| format!("reading metadata of {}", verdana.display()))?
        .len();
    if size != EXPECTED_VERDANA_SIZE {
        bail!(
            "{} has size {} != {}",
            verdana.display(),
            size,
            EXPECTED_VERDANA_SIZE
        );
    }
    Ok(())
}
