//! Preflight checks for build validation.
//!
//! Validates that the host system has the tools a stage shells out to before
//! the workspace is created. This prevents a multi-hour build from dying on a
//! missing `cmake` halfway through.
//!
//! # Example
//!
//! ```rust
//! use browservice_builder::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("cmake") {
//!     println!("cmake not installed");
//! }
//!
//! let tools = &[("git", "git"), ("cmake", "cmake")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use crate::error::BuildError;

/// Check if a command can be resolved through `PATH`.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Host tools stage 2 runs directly.
///
/// Each tuple is (command_name, what provides it).
pub const DISTRIBUTION_TOOLS: &[(&str, &str)] = &[
    ("git", "Git for Windows"),
    ("cmake", "CMake"),
];

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` listing every missing tool, not just the first
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<(), BuildError> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  Required command '{}' not found in path (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(BuildError::precondition(format!(
            "Missing required host tools:\n{}",
            msg
        )));
    }

    Ok(())
}

/// Check that the interpreter for the upstream automation script is available.
pub fn check_interpreter(interpreter: &str) -> Result<(), BuildError> {
    check_required_tools(&[(interpreter, "Python 3")])
}
