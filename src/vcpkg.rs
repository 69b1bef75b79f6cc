//! vcpkg provisioning for the Windows build.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::error::BuildError;
use crate::platform::TargetArch;
use crate::process::Cmd;

/// A cloned and bootstrapped vcpkg checkout.
#[derive(Debug, Clone)]
pub struct Vcpkg {
    root: PathBuf,
}

/// vcpkg triplet for `arch`.
pub fn triplet(arch: TargetArch) -> Result<&'static str, BuildError> {
    match arch {
        TargetArch::Windows32 => Ok("x86-windows"),
        TargetArch::Windows64 => Ok("x64-windows"),
        other => Err(BuildError::precondition(format!(
            "No vcpkg triplet for arch '{other}'"
        ))),
    }
}

/// Qualify every package with the triplet, `pkg` -> `pkg:triplet`.
pub fn qualified_packages(packages: &[String], triplet: &str) -> Vec<String> {
    packages.iter().map(|p| format!("{p}:{triplet}")).collect()
}

fn bootstrap_script() -> &'static str {
    if cfg!(windows) {
        "bootstrap-vcpkg.bat"
    } else {
        "bootstrap-vcpkg.sh"
    }
}

fn executable() -> &'static str {
    if cfg!(windows) {
        "vcpkg.exe"
    } else {
        "vcpkg"
    }
}

impl Vcpkg {
    /// Clone `repo` into `<workspace>/vcpkg` and run its bootstrap script.
    pub fn provision(repo: &str, workspace: &Path) -> Result<Self> {
        let root = workspace.join("vcpkg");
        info!("Cloning vcpkg from '{}' to '{}'", repo, root.display());
        Cmd::new("git")
            .arg("clone")
            .arg(repo)
            .arg(&root)
            .current_dir(workspace)
            .run()?;

        info!("Bootstrapping vcpkg");
        Cmd::new(root.join(bootstrap_script()))
            .current_dir(&root)
            .run()?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the `vcpkg install` step for one package group.
    pub fn install_command(&self, packages: &[String], arch: TargetArch) -> Result<Cmd> {
        let packages = qualified_packages(packages, triplet(arch)?);
        Ok(Cmd::new(self.root.join(executable()))
            .arg("install")
            .args(packages)
            .current_dir(&self.root))
    }

    /// Install each group in order, one invocation per group.
    pub fn install_groups(&self, groups: &[Vec<String>], arch: TargetArch) -> Result<()> {
        for group in groups {
            let cmd = self.install_command(group, arch)?;
            info!("Installing vcpkg packages using command {}", cmd);
            cmd.run()?;
        }
        Ok(())
    }

    /// MSBuild integration files shipped with vcpkg.
    pub fn msbuild_props(&self) -> PathBuf {
        self.msbuild_dir().join("vcpkg.props")
    }

    pub fn msbuild_targets(&self) -> PathBuf {
        self.msbuild_dir().join("vcpkg.targets")
    }

    fn msbuild_dir(&self) -> PathBuf {
        self.root.join("scripts").join("buildsystems").join("msbuild")
    }
}
