//! Error kinds the pipeline distinguishes.
//!
//! Orchestration code works with `anyhow::Result`; the variants here exist so
//! that failures with a specific meaning (an ambiguous artifact, a missing
//! patch hook, a failed child process) carry the context needed to diagnose
//! them without re-running the build.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid arguments, colliding paths, unsupported host or architecture.
    #[error("{0}")]
    Precondition(String),

    #[error("command {command} failed with exit code {code}{}", format_output(.output))]
    StepFailed {
        command: String,
        code: i32,
        output: Option<String>,
    },

    #[error("could not start command {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "could not find {what} in directory '{}', candidates: {candidates:?}",
        .dir.display()
    )]
    NoMatch {
        what: String,
        dir: PathBuf,
        candidates: Vec<String>,
    },

    #[error(
        "could not find exactly one {what} in directory '{}', found matches: {candidates:?}",
        .dir.display()
    )]
    Ambiguous {
        what: String,
        dir: PathBuf,
        candidates: Vec<String>,
    },

    #[error("insertion hook '{hook}' not found in '{}': anchor {anchor:?} is missing", .path.display())]
    HookNotFound {
        hook: String,
        anchor: String,
        path: PathBuf,
    },

    #[error("insertion hook '{hook}' is ambiguous in '{}': anchor {anchor:?} occurs {occurrences} times", .path.display())]
    HookAmbiguous {
        hook: String,
        anchor: String,
        path: PathBuf,
        occurrences: usize,
    },

    #[error("marker {marker:?} not found in output:\n{output}")]
    SentinelNotFound { marker: String, output: String },

    #[error("required file '{}' does not exist", .0.display())]
    MissingFile(PathBuf),
}

impl BuildError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        BuildError::Precondition(msg.into())
    }
}

fn format_output(output: &Option<String>) -> String {
    match output {
        Some(text) if !text.trim().is_empty() => format!(", output:\n{}", text.trim_end()),
        _ => String::new(),
    }
}
