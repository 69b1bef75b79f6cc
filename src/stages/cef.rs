//! Stage 1: build a patched CEF binary distribution archive.

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::config::BuildConfig;
use crate::fetch::fetch_to;
use crate::locate::{cef_archive_filter, copy_single_match};
use crate::patch::{install_patcher_script, patch_script_file, CEF_PATCHER_HOOK, PATCHER_MODULE};
use crate::preflight::check_interpreter;
use crate::request::CefBuildRequest;
use crate::run_manifest::record_run;
use crate::toolchain::cef_build_command;
use crate::workspace::Workspace;

pub const STAGE_NAME: &str = "build-patched-cef";

pub const AUTOMATE_GIT_FILE: &str = "automate-git.py";
pub const PATCHED_AUTOMATE_GIT_FILE: &str = "patched-automate-git.py";

/// Run stage 1 and return the output path.
pub fn run(request: &CefBuildRequest, config: &BuildConfig) -> Result<PathBuf> {
    check_interpreter(&config.interpreter)?;

    let workspace = Workspace::create(&request.workspace)?;
    let output = record_run(workspace.root(), STAGE_NAME, request, || {
        build(&workspace, request, config)
    })?;

    info!("CEF built successfully, output saved in '{}'", output.display());
    info!(
        "NOTE: The build directory '{}' was not removed!",
        workspace.root().display()
    );
    Ok(output)
}

fn build(workspace: &Workspace, request: &CefBuildRequest, config: &BuildConfig) -> Result<PathBuf> {
    let automate_git = workspace.join(AUTOMATE_GIT_FILE);
    info!(
        "Downloading CEF automate-git.py from '{}' to '{}'",
        config.automate_git_source,
        automate_git.display()
    );
    fetch_to(&config.automate_git_source, &automate_git)?;

    install_patcher_script(&workspace.join(format!("{PATCHER_MODULE}.py")))?;

    let patched = workspace.join(PATCHED_AUTOMATE_GIT_FILE);
    info!(
        "Creating patched automate-git.py script '{}' that will apply {}.py before building CEF",
        patched.display(),
        PATCHER_MODULE
    );
    patch_script_file(&CEF_PATCHER_HOOK, &automate_git, &patched)?;

    let cmd = cef_build_command(request, config, &patched)?;
    info!(
        "Building CEF using command {} and environment variables {}",
        cmd,
        cmd.env_overlay()
    );
    cmd.run()?;

    let binary_distrib = workspace
        .join("chromium")
        .join("src")
        .join("cef")
        .join("binary_distrib");
    info!("Build successful, locating output file in '{}'", binary_distrib.display());
    copy_single_match(
        &cef_archive_filter(&request.commit, &config.archive_format),
        &binary_distrib,
        &request.output,
    )?;
    Ok(request.output.clone())
}
