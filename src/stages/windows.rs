//! Stage 2: build the Windows distribution ZIP from the patched CEF archive.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::assemble::{assemble, write_msbuild_imports};
use crate::cmake;
use crate::config::BuildConfig;
use crate::html_codegen::generate_into_plugin;
use crate::preflight::{check_required_tools, DISTRIBUTION_TOOLS};
use crate::redist;
use crate::request::DistributionRequest;
use crate::run_manifest::record_run;
use crate::source;
use crate::vcpkg::Vcpkg;
use crate::workspace::Workspace;

pub const STAGE_NAME: &str = "build-windows";

/// Run stage 2 and return the output path.
pub fn run(request: &DistributionRequest, config: &BuildConfig) -> Result<PathBuf> {
    check_required_tools(DISTRIBUTION_TOOLS)?;

    let workspace = Workspace::create(&request.workspace)?;
    let output = record_run(workspace.root(), STAGE_NAME, request, || {
        build(&workspace, request, config)
    })?;

    info!(
        "Browservice built successfully, output saved in '{}'",
        output.display()
    );
    info!(
        "NOTE: The build directory '{}' was not removed!",
        workspace.root().display()
    );
    Ok(output)
}

fn build(
    workspace: &Workspace,
    request: &DistributionRequest,
    config: &BuildConfig,
) -> Result<PathBuf> {
    let repo = source::repo_root(config.repo_root.as_deref())?;
    let src = source::snapshot(&repo, &request.checkout, workspace.root())?;
    let cef_dir = source::extract_cef(&request.cef_archive, &src)?;

    let vcpkg = Vcpkg::provision(&config.vcpkg_repo, workspace.root())?;
    vcpkg.install_groups(&config.vcpkg_packages, request.arch)?;

    generate_into_plugin(&src.join("viceplugins").join("retrojsvice"))?;

    cmake::integrate_project(&cef_dir.join("CMakeLists.txt"))?;

    let build_dir = cef_dir.join("build");
    fs::create_dir(&build_dir)
        .with_context(|| format!("creating CEF build directory '{}'", build_dir.display()))?;
    let compiler =
        cmake::generate_and_detect_compiler(&build_dir, &config.cmake_generator, request.arch)?;
    let redists = redist::locate(&compiler, request.arch)?;

    write_msbuild_imports(&build_dir, &vcpkg)?;

    info!("Building Browservice");
    cmake::build_target(&build_dir, &config.project_name)?;

    assemble(
        &build_dir.join(&config.project_name),
        &request.distribution_name(&config.project_name),
        &redists,
        workspace.root(),
        &request.output,
    )
}
