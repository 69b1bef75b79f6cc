//! Driving the upstream CEF build.
//!
//! Per-target differences live in one table, [`TARGET_PROFILES`], so every
//! flag and GN define that depends on the host OS and architecture can be
//! audited in one place.

use std::path::Path;

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::platform::{HostOs, TargetArch};
use crate::process::{Cmd, EnvOverlay};
use crate::request::CefBuildRequest;

/// Flags and environment specific to one `(host OS, architecture)` pair.
#[derive(Debug, Clone, Copy)]
pub struct TargetProfile {
    pub os: HostOs,
    pub arch: TargetArch,
    pub extra_flags: &'static [&'static str],
    pub extra_env: &'static [(&'static str, &'static str)],
}

const WINDOWS_GN_DEFINES: &str = "is_official_build=true";
const LINUX_X64_GN_DEFINES: &str =
    "is_official_build=true use_sysroot=true symbol_level=1 is_cfi=false";
const LINUX_ARMHF_GN_DEFINES: &str = "is_official_build=true use_sysroot=true symbol_level=1 \
     is_cfi=false use_thin_lto=false chrome_pgo_phase=0 use_vaapi=false";
const LINUX_AARCH64_GN_DEFINES: &str = "is_official_build=true use_sysroot=true symbol_level=1 \
     is_cfi=false use_thin_lto=false chrome_pgo_phase=0";

pub const TARGET_PROFILES: &[TargetProfile] = &[
    TargetProfile {
        os: HostOs::Windows,
        arch: TargetArch::Windows32,
        extra_flags: &["--with-pgo-profiles"],
        extra_env: &[
            ("GN_DEFINES", WINDOWS_GN_DEFINES),
            ("GYP_MSVS_VERSION", "2019"),
        ],
    },
    TargetProfile {
        os: HostOs::Windows,
        arch: TargetArch::Windows64,
        extra_flags: &["--x64-build", "--with-pgo-profiles"],
        extra_env: &[
            ("GN_DEFINES", WINDOWS_GN_DEFINES),
            ("GYP_MSVS_VERSION", "2019"),
        ],
    },
    TargetProfile {
        os: HostOs::Linux,
        arch: TargetArch::X86_64,
        extra_flags: &["--x64-build", "--with-pgo-profiles"],
        extra_env: &[("GN_DEFINES", LINUX_X64_GN_DEFINES)],
    },
    TargetProfile {
        os: HostOs::Linux,
        arch: TargetArch::Armhf,
        extra_flags: &["--arm-build"],
        extra_env: &[
            ("GN_DEFINES", LINUX_ARMHF_GN_DEFINES),
            ("CEF_INSTALL_SYSROOT", "arm"),
        ],
    },
    TargetProfile {
        os: HostOs::Linux,
        arch: TargetArch::Aarch64,
        extra_flags: &["--arm64-build"],
        extra_env: &[
            ("GN_DEFINES", LINUX_AARCH64_GN_DEFINES),
            ("CEF_INSTALL_SYSROOT", "arm64"),
        ],
    },
];

/// Look up the profile for a host/architecture pair.
pub fn profile_for(os: HostOs, arch: TargetArch) -> Result<&'static TargetProfile, BuildError> {
    TARGET_PROFILES
        .iter()
        .find(|profile| profile.os == os && profile.arch == arch)
        .ok_or_else(|| {
            BuildError::precondition(format!(
                "Architecture '{arch}' cannot be built on platform '{os}'"
            ))
        })
}

/// Environment overlay for the upstream build of `request`.
pub fn cef_build_env(
    request: &CefBuildRequest,
    config: &BuildConfig,
) -> Result<EnvOverlay, BuildError> {
    let profile = profile_for(request.os, request.arch)?;
    let mut env = EnvOverlay::new();
    env.set("CEF_ARCHIVE_FORMAT", config.archive_format.as_str());
    for (key, value) in profile.extra_env {
        env.set(*key, *value);
    }
    Ok(env)
}

/// Full invocation of the patched automation script.
///
/// The argument order is fixed: interpreter, script, the common flags, then
/// the profile flags.
pub fn cef_build_command(
    request: &CefBuildRequest,
    config: &BuildConfig,
    patched_script: &Path,
) -> Result<Cmd, BuildError> {
    let profile = profile_for(request.os, request.arch)?;
    let env = cef_build_env(request, config)?;

    let cmd = Cmd::new(&config.interpreter)
        .arg(patched_script)
        .arg(format!("--download-dir={}", request.workspace.display()))
        .arg(format!("--branch={}", request.branch))
        .arg(format!("--checkout={}", request.commit))
        .arg("--force-clean")
        .arg(format!("--build-target={}", config.build_target))
        .arg("--no-debug-build")
        .args(profile.extra_flags.iter().copied())
        .envs(&env);
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request(os: HostOs, arch: TargetArch) -> CefBuildRequest {
        CefBuildRequest {
            os,
            arch,
            branch: "5304".to_string(),
            commit: "26c0b5e".to_string(),
            workspace: PathBuf::from("/cefb"),
            output: PathBuf::from("/out/cef.tar.bz2"),
        }
    }

    #[test]
    fn every_supported_pair_has_exactly_one_profile() {
        for os in [HostOs::Windows, HostOs::Linux] {
            for arch in os.supported_archs() {
                let count = TARGET_PROFILES
                    .iter()
                    .filter(|p| p.os == os && p.arch == *arch)
                    .count();
                assert_eq!(count, 1, "{os}/{arch}");
            }
        }
        assert_eq!(TARGET_PROFILES.len(), 5);
    }

    #[test]
    fn cross_os_pair_is_rejected() {
        assert!(profile_for(HostOs::Linux, TargetArch::Windows64).is_err());
        assert!(profile_for(HostOs::Windows, TargetArch::Armhf).is_err());
    }

    #[test]
    fn base_arguments_come_first_in_order() {
        let config = BuildConfig::default();
        let cmd = cef_build_command(
            &request(HostOs::Linux, TargetArch::X86_64),
            &config,
            Path::new("/cefb/patched-automate-git.py"),
        )
        .unwrap();
        assert_eq!(
            cmd.argv()[1..],
            [
                "/cefb/patched-automate-git.py",
                "--download-dir=/cefb",
                "--branch=5304",
                "--checkout=26c0b5e",
                "--force-clean",
                "--build-target=cefsimple",
                "--no-debug-build",
                "--x64-build",
                "--with-pgo-profiles",
            ]
        );
    }

    #[test]
    fn windows32_has_no_x64_flag() {
        let config = BuildConfig::default();
        let cmd = cef_build_command(
            &request(HostOs::Windows, TargetArch::Windows32),
            &config,
            Path::new("p.py"),
        )
        .unwrap();
        let argv = cmd.argv();
        assert!(!argv.iter().any(|a| a == "--x64-build"));
        assert_eq!(argv.last().map(String::as_str), Some("--with-pgo-profiles"));
        assert_eq!(cmd.env_overlay().get("GYP_MSVS_VERSION"), Some("2019"));
        assert_eq!(
            cmd.env_overlay().get("GN_DEFINES"),
            Some("is_official_build=true")
        );
    }

    #[test]
    fn arm_targets_disable_pgo_and_select_sysroot() {
        let config = BuildConfig::default();
        let armhf = cef_build_env(&request(HostOs::Linux, TargetArch::Armhf), &config).unwrap();
        assert_eq!(armhf.get("CEF_INSTALL_SYSROOT"), Some("arm"));
        let defines = armhf.get("GN_DEFINES").unwrap();
        assert!(defines.contains("chrome_pgo_phase=0"));
        assert!(defines.contains("use_vaapi=false"));
        assert!(defines.contains("is_cfi=false"));

        let aarch64 =
            cef_build_env(&request(HostOs::Linux, TargetArch::Aarch64), &config).unwrap();
        assert_eq!(aarch64.get("CEF_INSTALL_SYSROOT"), Some("arm64"));
        assert!(!aarch64.get("GN_DEFINES").unwrap().contains("use_vaapi"));

        let x64 = cef_build_env(&request(HostOs::Linux, TargetArch::X86_64), &config).unwrap();
        assert_eq!(x64.get("CEF_INSTALL_SYSROOT"), None);
        assert!(!x64.get("GN_DEFINES").unwrap().contains("chrome_pgo_phase"));
    }

    #[test]
    fn archive_format_is_always_set() {
        let config = BuildConfig::default();
        for profile in TARGET_PROFILES {
            let env = cef_build_env(&request(profile.os, profile.arch), &config).unwrap();
            assert_eq!(env.get("CEF_ARCHIVE_FORMAT"), Some("tar.bz2"));
        }
    }
}
