//! Build pipeline for Browservice.
//!
//! Two stages, each a separate binary:
//!
//! - **`build-patched-cef`** fetches CEF's `automate-git.py`, splices in a
//!   patcher that replaces Chromium's native clipboard, runs the upstream
//!   build and copies out the single matching `cef_binary_*.tar.bz2`.
//! - **`build-windows`** takes that archive and a checkout of this repository,
//!   provisions vcpkg, hooks Browservice into the CEF CMake project, builds
//!   it with MSVC and packages the result with its runtime DLLs as a ZIP.
//!
//! Two collaborators ship alongside: `gen-html-cpp` (also used in-process by
//! stage 2) and `smoke-test`, which exercises a finished executable.
//!
//! # Architecture
//!
//! ```text
//! request ──> workspace ──> stages::cef ──────> patch, toolchain, locate
//!                      └──> stages::windows ──> source, vcpkg, html_codegen,
//!                                               cmake, redist, assemble
//!
//! every external step ──> process::Cmd ──> StepOutcome / BuildError
//! ```
//!
//! Every stage validates all of its arguments before touching the filesystem,
//! creates a fresh workspace, and never deletes it.

use std::process::ExitCode;

pub mod assemble;
pub mod cmake;
pub mod config;
pub mod error;
pub mod fetch;
pub mod html_codegen;
pub mod locate;
pub mod logging;
pub mod patch;
pub mod platform;
pub mod preflight;
pub mod process;
pub mod redist;
pub mod request;
pub mod run_manifest;
pub mod smoke;
pub mod source;
pub mod stages;
pub mod toolchain;
pub mod vcpkg;
pub mod workspace;

pub use error::BuildError;
pub use platform::{HostOs, TargetArch};

/// Map a binary's result onto the exit status, printing `FAIL: ...` on error.
pub fn exit_status(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("FAIL: {err:#}");
            ExitCode::FAILURE
        }
    }
}
