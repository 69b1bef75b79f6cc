//! Launching the executable under test in its own process group.
//!
//! On Unix the child leads a new process group so the whole tree can be sent
//! SIGINT or SIGKILL. On Windows it gets a new console; Ctrl+C is delivered
//! by a helper process that attaches to that console (see
//! [`send_ctrl_c_to_console`]).

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Hidden argument of the `smoke-test` binary that runs the Ctrl+C helper.
pub const SEND_CTRL_C_ARG: &str = "--send-ctrl-c";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A running child. Dropping it before it exited kills its process group.
#[derive(Debug)]
pub struct Launched {
    child: Child,
    exited: Option<ExitStatus>,
}

/// Options for [`launch`].
#[derive(Debug, Default)]
pub struct LaunchOptions<'a> {
    pub piped_stdin: bool,
    pub env: Vec<(&'a str, &'a OsStr)>,
}

pub fn launch(exe: &Path, args: &[&str], options: LaunchOptions<'_>) -> Result<Launched> {
    let mut command = Command::new(exe);
    command.args(args);
    for (key, value) in &options.env {
        command.env(key, value);
    }
    if options.piped_stdin {
        command.stdin(Stdio::piped());
    }
    isolate(&mut command);

    let child = command
        .spawn()
        .with_context(|| format!("launching '{}' with {:?}", exe.display(), args))?;
    debug!(pid = child.id(), "launched process under test");
    Ok(Launched {
        child,
        exited: None,
    })
}

#[cfg(unix)]
fn isolate(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn isolate(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_CONSOLE: u32 = 0x0000_0010;
    command.creation_flags(CREATE_NEW_CONSOLE);
}

impl Launched {
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Write `data` to stdin and close it.
    pub fn feed_stdin(&mut self, data: &[u8]) -> Result<()> {
        let Some(mut stdin) = self.child.stdin.take() else {
            bail!("stdin of process {} is not piped", self.id());
        };
        stdin
            .write_all(data)
            .with_context(|| format!("writing to stdin of process {}", self.id()))
    }

    /// Wait for exit, failing after `timeout`.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<ExitStatus> {
        if let Some(status) = self.exited {
            return Ok(status);
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self
                .child
                .try_wait()
                .with_context(|| format!("waiting for process {}", self.id()))?
            {
                self.exited = Some(status);
                return Ok(status);
            }
            if Instant::now() >= deadline {
                bail!(
                    "process {} did not exit within {}s",
                    self.id(),
                    timeout.as_secs()
                );
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    #[cfg(unix)]
    pub fn interrupt(&mut self) -> Result<()> {
        signal_group(self.id(), libc::SIGINT)
    }

    #[cfg(windows)]
    pub fn interrupt(&mut self) -> Result<()> {
        let helper = std::env::current_exe().context("resolving smoke-test executable")?;
        let status = Command::new(helper)
            .arg(SEND_CTRL_C_ARG)
            .arg(self.id().to_string())
            .status()
            .context("running Ctrl+C helper")?;
        if !status.success() {
            bail!("Ctrl+C helper failed with {status}");
        }
        Ok(())
    }

    #[cfg(unix)]
    fn kill(&mut self) {
        let _ = signal_group(self.id(), libc::SIGKILL);
    }

    #[cfg(windows)]
    fn kill(&mut self) {
        let _ = self.child.kill();
    }
}

impl Drop for Launched {
    fn drop(&mut self) {
        if self.exited.is_none() {
            self.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) -> Result<()> {
    let pgid = libc::pid_t::try_from(pid).context("process id out of range")?;
    // SAFETY: killpg only sends a signal; the group was created for this child.
    let rc = unsafe { libc::killpg(pgid, signal) };
    if rc != 0 {
        bail!(
            "sending signal {} to process group {}: {}",
            signal,
            pgid,
            std::io::Error::last_os_error()
        );
    }
    Ok(())
}

/// Deliver Ctrl+C to the console of process `pid`.
///
/// Runs in a short-lived helper process, since attaching to another console
/// detaches the caller from its own.
#[cfg(windows)]
pub fn send_ctrl_c_to_console(pid: u32) -> Result<()> {
    use windows_sys::Win32::System::Console::{
        AttachConsole, FreeConsole, GenerateConsoleCtrlEvent, SetConsoleCtrlHandler, CTRL_C_EVENT,
    };

    // SAFETY: plain Win32 console calls without pointer arguments.
    unsafe {
        FreeConsole();
        if AttachConsole(pid) == 0 {
            bail!(
                "attaching to console of process {}: {}",
                pid,
                std::io::Error::last_os_error()
            );
        }
        SetConsoleCtrlHandler(None, 1);
        if GenerateConsoleCtrlEvent(CTRL_C_EVENT, 0) == 0 {
            bail!(
                "generating Ctrl+C event: {}",
                std::io::Error::last_os_error()
            );
        }
    }
    Ok(())
}

#[cfg(not(windows))]
pub fn send_ctrl_c_to_console(_pid: u32) -> Result<()> {
    bail!("{SEND_CTRL_C_ARG} is only supported on Windows")
}
