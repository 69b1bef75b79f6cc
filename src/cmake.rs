//! Wiring the project into the CEF binary distribution's CMake graph.
//!
//! Besides pulling the project in as a subdirectory, a `message()` directive
//! makes the generator print the resolved C++ compiler between two sentinel
//! tokens. That is the only reliable way to learn which MSVC installation
//! CMake picked, and the redistributable DLLs must come from the same one.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::error::BuildError;
use crate::platform::TargetArch;
use crate::process::Cmd;

pub const COMPILER_PATH_PREFIX: &str = "[GnGzAgJ5wEUZUzq7]CMAKE_CXX_COMPILER=";
pub const COMPILER_PATH_SUFFIX: &str = "[kCVr24VJWqmdld5c]";

pub const ADD_PROJECT_DIRECTIVE: &str =
    "add_subdirectory(${CMAKE_CURRENT_SOURCE_DIR}/.. ${CMAKE_CURRENT_BINARY_DIR}/browservice)";

/// The `message()` directive that prints the compiler path between sentinels.
pub fn compiler_path_directive() -> String {
    format!("message(STATUS \"{COMPILER_PATH_PREFIX}${{CMAKE_CXX_COMPILER}}{COMPILER_PATH_SUFFIX}\")")
}

fn append_directive(cmake_lists: &Path, directive: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(cmake_lists)
        .with_context(|| format!("opening '{}' for appending", cmake_lists.display()))?;
    write!(file, "\n{directive}\n")
        .with_context(|| format!("appending to '{}'", cmake_lists.display()))
}

/// Append both directives to `CMakeLists.txt`. The file must already exist.
pub fn integrate_project(cmake_lists: &Path) -> Result<()> {
    if !cmake_lists.is_file() {
        return Err(BuildError::MissingFile(cmake_lists.to_path_buf()).into());
    }

    info!("Adding Browservice to '{}'", cmake_lists.display());
    append_directive(cmake_lists, ADD_PROJECT_DIRECTIVE)?;

    info!(
        "Adding compiler path in a machine readable format to the output of '{}'",
        cmake_lists.display()
    );
    append_directive(cmake_lists, &compiler_path_directive())
}

/// Return the text strictly between `prefix` and the first `suffix` after it.
pub fn extract_between<'a>(
    output: &'a str,
    prefix: &str,
    suffix: &str,
) -> Result<&'a str, BuildError> {
    let not_found = |marker: &str| BuildError::SentinelNotFound {
        marker: marker.to_string(),
        output: output.to_string(),
    };

    let start = output.find(prefix).ok_or_else(|| not_found(prefix))? + prefix.len();
    let len = output[start..].find(suffix).ok_or_else(|| not_found(suffix))?;
    Ok(&output[start..start + len])
}

/// CMake `-A` platform name.
pub fn cmake_platform(arch: TargetArch) -> Result<&'static str, BuildError> {
    match arch {
        TargetArch::Windows32 => Ok("Win32"),
        TargetArch::Windows64 => Ok("x64"),
        other => Err(BuildError::precondition(format!(
            "No CMake platform for arch '{other}'"
        ))),
    }
}

/// Generate build files in `build_dir` and return the compiler path CMake resolved.
///
/// The captured generator output is echoed to stdout.
pub fn generate_and_detect_compiler(
    build_dir: &Path,
    generator: &str,
    arch: TargetArch,
) -> Result<PathBuf> {
    let cmd = Cmd::new("cmake")
        .args(["-G", generator, "-A", cmake_platform(arch)?, ".."])
        .current_dir(build_dir);

    info!(
        "Generating build files with CMake in '{}' using command {}",
        build_dir.display(),
        cmd
    );
    let output = cmd.run_captured()?;
    print!("{output}");

    info!("Detecting C++ compiler path from CMake output");
    let raw = extract_between(&output, COMPILER_PATH_PREFIX, COMPILER_PATH_SUFFIX)?;
    let compiler = PathBuf::from(normalize_windows_path(raw));
    if !compiler.is_file() {
        return Err(BuildError::MissingFile(compiler).into());
    }
    Ok(compiler)
}

/// CMake reports paths with forward slashes; the redistributable lookup
/// works on the backslash form.
pub fn normalize_windows_path(path: &str) -> String {
    if cfg!(windows) {
        path.replace('/', "\\")
    } else {
        path.to_string()
    }
}

/// `cmake --build . --config Release --target <target>`.
pub fn build_target(build_dir: &Path, target: &str) -> Result<()> {
    let cmd = Cmd::new("cmake")
        .args(["--build", ".", "--config", "Release", "--target", target])
        .current_dir(build_dir);
    info!("Building {} using command {}", target, cmd);
    cmd.run()?;
    Ok(())
}
