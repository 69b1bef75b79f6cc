//! Running external steps.
//!
//! Every child process the pipeline starts (downloads, package installs,
//! compiles) goes through [`Cmd`]. A step either succeeds or surfaces as a
//! [`BuildError`] carrying the command line, the exit code and any captured
//! output. Nothing is retried.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::BuildError;

/// Variables layered over the inherited environment of a child process.
///
/// The overlay is applied to the child's `Command`; the environment of the
/// running process is never modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

}

impl fmt::Display for EnvOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.vars)
    }
}

/// Result of a completed child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded { output: Option<String> },
    Failed { code: i32, output: Option<String> },
}

impl StepOutcome {
    /// Turn a failed outcome into [`BuildError::StepFailed`].
    pub fn require_success(self, command: &str) -> Result<Option<String>, BuildError> {
        match self {
            StepOutcome::Succeeded { output } => Ok(output),
            StepOutcome::Failed { code, output } => Err(BuildError::StepFailed {
                command: command.to_string(),
                code,
                output,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Inherit,
    Stdout,
}

/// Builder for one external step.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: EnvOverlay,
}

impl Cmd {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: EnvOverlay::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn envs(mut self, overlay: &EnvOverlay) -> Self {
        for (key, value) in overlay.iter() {
            self.env.set(key, value);
        }
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|part| part.to_string_lossy().into_owned())
            .collect()
    }

    pub fn env_overlay(&self) -> &EnvOverlay {
        &self.env
    }

    /// Run with inherited stdio, failing on a non-zero exit.
    pub fn run(&self) -> Result<(), BuildError> {
        self.execute(Capture::Inherit)?
            .require_success(&self.to_string())
            .map(|_| ())
    }

    /// Run capturing standard output (stderr stays inherited) and return it.
    pub fn run_captured(&self) -> Result<String, BuildError> {
        let output = self
            .execute(Capture::Stdout)?
            .require_success(&self.to_string())?;
        Ok(output.unwrap_or_default())
    }

    fn execute(&self, capture: Capture) -> Result<StepOutcome, BuildError> {
        debug!(command = %self, env = %self.env, cwd = ?self.cwd, "running external step");

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in self.env.iter() {
            command.env(key, value);
        }
        command.stdin(Stdio::inherit()).stderr(Stdio::inherit());

        let spawn_error = |source| BuildError::SpawnFailed {
            command: self.to_string(),
            source,
        };

        let (status, output) = match capture {
            Capture::Inherit => {
                let status = command
                    .stdout(Stdio::inherit())
                    .status()
                    .map_err(spawn_error)?;
                (status, None)
            }
            Capture::Stdout => {
                let out = command
                    .stdout(Stdio::piped())
                    .output()
                    .map_err(spawn_error)?;
                let text = String::from_utf8_lossy(&out.stdout).into_owned();
                (out.status, Some(text))
            }
        };

        if status.success() {
            Ok(StepOutcome::Succeeded { output })
        } else {
            Ok(StepOutcome::Failed {
                code: status.code().unwrap_or(-1),
                output,
            })
        }
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.argv())
    }
}
