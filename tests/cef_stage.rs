//! Stage 1 driven end to end against a stand-in for `automate-git.py`.

use std::fs;
use std::path::{Path, PathBuf};

use browservice_builder::config::BuildConfig;
use browservice_builder::preflight::command_exists;
use browservice_builder::request::CefBuildRequest;
use browservice_builder::run_manifest::{manifest_path, read_run_manifest, sha256_file, RunStatus};
use browservice_builder::stages;
use browservice_builder::BuildError;
use tempfile::TempDir;

const COMMIT: &str = "0123abc";

/// Behaves like the upstream script as far as the pipeline can observe: it
/// honours `--download-dir` and `--checkout`, reaches the Ninja anchor with
/// `cef_src_dir` in scope, and leaves several archives in `binary_distrib`.
const FAKE_AUTOMATE_GIT: &str = r#"import os
import sys

args = dict(a[2:].split("=", 1) for a in sys.argv[1:] if a.startswith("--") and "=" in a)
flags = [a for a in sys.argv[1:] if "=" not in a]
assert "--force-clean" in flags and "--no-debug-build" in flags, flags
assert args["build-target"] == "cefsimple", args
assert os.environ["CEF_ARCHIVE_FORMAT"] == "tar.bz2"
assert "is_official_build=true" in os.environ["GN_DEFINES"]

download_dir = args["download-dir"]
commit = args["checkout"]
cef_src_dir = os.path.join(download_dir, "chromium", "src", "cef")
os.makedirs(cef_src_dir)
os.makedirs(os.path.join(download_dir, "chromium", "src", "ui", "base", "clipboard"))

# Build using Ninja.
assert os.path.isfile(os.path.join(cef_src_dir, "..", "ui", "base", "clipboard", "clipboard_ozone.cc"))

out = os.path.join(cef_src_dir, "binary_distrib")
os.makedirs(out)
files = {
    "cef_binary_1.0.0+g" + commit + "+chromium-1_linux64.tar.bz2": b"the real archive",
    "cef_binary_1.0.0+g" + commit + "+chromium-1_linux64_release_symbols.tar.bz2": b"symbols",
    "cef_binary_0.9.0+gfedcba9+chromium-0_linux64.tar.bz2": b"stale",
}
for name, data in files.items():
    with open(os.path.join(out, name), "wb") as fp:
        fp.write(data)
"#;

fn args(values: &[&Path]) -> Vec<String> {
    values
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

fn config_with_script(script: &Path) -> BuildConfig {
    BuildConfig {
        max_workspace_path_len: 4096,
        automate_git_source: script.to_string_lossy().into_owned(),
        ..BuildConfig::default()
    }
}

fn request(temp: &TempDir, config: &BuildConfig) -> (CefBuildRequest, PathBuf, PathBuf) {
    let ws = temp.path().join("cefb");
    let out = temp.path().join("cef.tar.bz2");
    let mut argv = args(&[&ws, &out]);
    argv.extend(["x86_64".to_string(), "5304".to_string(), COMMIT.to_string()]);
    let request = CefBuildRequest::from_args(&argv, config).unwrap();
    (request, ws, out)
}

#[cfg(target_os = "linux")]
#[test]
fn builds_and_copies_the_single_matching_archive() {
    if !command_exists("python3") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("automate-git-source.py");
    fs::write(&script, FAKE_AUTOMATE_GIT).unwrap();
    let config = config_with_script(&script);
    let (request, ws, out) = request(&temp, &config);

    let produced = stages::cef::run(&request, &config).unwrap();

    assert_eq!(produced, out);
    assert_eq!(fs::read(&out).unwrap(), b"the real archive");
    assert!(ws.join("patched-automate-git.py").is_file());
    assert!(ws.join("browservice_cef_patcher.py").is_file());

    let manifest = read_run_manifest(&manifest_path(&ws)).unwrap();
    assert_eq!(manifest.status, RunStatus::Success);
    assert_eq!(manifest.request["commit"], COMMIT);
    assert_eq!(manifest.output_sha256.unwrap(), sha256_file(&out).unwrap());
}

#[cfg(target_os = "linux")]
#[test]
fn missing_anchor_stops_before_the_build() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("automate-git-source.py");
    fs::write(&script, "print('upstream changed')\n").unwrap();
    let config = BuildConfig {
        interpreter: "sh".to_string(),
        ..config_with_script(&script)
    };
    let (request, ws, out) = request(&temp, &config);

    let err = stages::cef::run(&request, &config).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::HookNotFound { .. })
    ));
    assert!(!ws.join("patched-automate-git.py").exists());
    assert!(!out.exists());
    let manifest = read_run_manifest(&manifest_path(&ws)).unwrap();
    assert_eq!(manifest.status, RunStatus::Failed);
}

#[cfg(target_os = "linux")]
#[test]
fn workspace_created_after_validation_is_not_reused() {
    let temp = TempDir::new().unwrap();
    let script = temp.path().join("automate-git-source.py");
    fs::write(&script, FAKE_AUTOMATE_GIT).unwrap();
    let config = BuildConfig {
        interpreter: "sh".to_string(),
        ..config_with_script(&script)
    };
    let (request, ws, _) = request(&temp, &config);

    fs::create_dir(&ws).unwrap();
    fs::write(ws.join("someone-elses-file"), b"").unwrap();
    assert!(stages::cef::run(&request, &config).is_err());
    assert!(!manifest_path(&ws).exists());
}
