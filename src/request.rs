//! Argument and precondition validation.
//!
//! Both stages take fixed-arity positional arguments. Validation is pure: it
//! inspects the filesystem but never creates or modifies anything, so a
//! rejected invocation leaves no trace.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::platform::{HostOs, TargetArch};

pub const CEF_USAGE: &str =
    "Usage: build-patched-cef <build directory> <output file> <architecture> [<branch> <commit>]";
pub const DISTRIBUTION_USAGE: &str =
    "Usage: build-windows windows32|windows64 BRANCH|COMMIT|TAG PATCHED_CEF_TARBALL BUILD_DIR OUTPUT";

/// A checkout component with a fixed alphabet and exact length.
#[derive(Debug, Clone, Copy)]
pub struct FixedField {
    pub name: &'static str,
    pub alphabet: &'static str,
    pub length: usize,
}

pub const BRANCH_FIELD: FixedField = FixedField {
    name: "branch",
    alphabet: "0123456789",
    length: 4,
};

pub const COMMIT_FIELD: FixedField = FixedField {
    name: "commit",
    alphabet: "0123456789abcdef",
    length: 7,
};

impl FixedField {
    pub fn validate(&self, value: &str) -> Result<(), BuildError> {
        if value.chars().any(|c| !self.alphabet.contains(c)) {
            return Err(BuildError::precondition(format!(
                "Only characters '{}' are allowed in the {} argument",
                self.alphabet, self.name
            )));
        }
        if value.chars().count() != self.length {
            return Err(BuildError::precondition(format!(
                "The length of the '{}' argument must be {}",
                self.name, self.length
            )));
        }
        Ok(())
    }
}

const CHECKOUT_MAX_LEN: usize = 64;

/// Validate a stage 2 checkout (branch, commit or tag passed to `git archive`).
pub fn validate_checkout(value: &str) -> Result<(), BuildError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/');
    if value.is_empty() || value.len() > CHECKOUT_MAX_LEN {
        return Err(BuildError::precondition(format!(
            "The length of the checkout argument must be between 1 and {CHECKOUT_MAX_LEN}"
        )));
    }
    if value.starts_with('-') || !value.chars().all(allowed) {
        return Err(BuildError::precondition(format!(
            "Invalid checkout '{value}': only ASCII letters, digits and '._/-' are allowed, and it must not start with '-'"
        )));
    }
    Ok(())
}

/// Validated stage 1 request.
#[derive(Debug, Clone, Serialize)]
pub struct CefBuildRequest {
    pub os: HostOs,
    pub arch: TargetArch,
    pub branch: String,
    pub commit: String,
    pub workspace: PathBuf,
    pub output: PathBuf,
}

impl CefBuildRequest {
    /// Validate `<build dir> <output file> <arch> [<branch> <commit>]` on the detected host.
    pub fn from_args(args: &[String], config: &BuildConfig) -> Result<Self, BuildError> {
        Self::from_args_on(args, config, std::env::consts::OS)
    }

    /// Same as [`CefBuildRequest::from_args`] with an explicit host OS name.
    pub fn from_args_on(
        args: &[String],
        config: &BuildConfig,
        os_name: &str,
    ) -> Result<Self, BuildError> {
        let (workspace, output, arch, branch, commit) = match args {
            [workspace, output, arch] => (
                workspace,
                output,
                arch,
                config.default_branch.as_str(),
                config.default_commit.as_str(),
            ),
            [workspace, output, arch, branch, commit] => {
                (workspace, output, arch, branch.as_str(), commit.as_str())
            }
            _ => return Err(BuildError::precondition(CEF_USAGE)),
        };

        BRANCH_FIELD.validate(branch)?;
        COMMIT_FIELD.validate(commit)?;

        let workspace = validate_workspace_path(Path::new(workspace), config)?;
        let output = validate_output_path(Path::new(output))?;

        let os = HostOs::from_name(os_name)?;
        let arch = os.parse_arch(arch)?;

        Ok(Self {
            os,
            arch,
            branch: branch.to_string(),
            commit: commit.to_string(),
            workspace,
            output,
        })
    }
}

/// Validated stage 2 request.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionRequest {
    pub os: HostOs,
    pub arch: TargetArch,
    pub checkout: String,
    pub cef_archive: PathBuf,
    pub workspace: PathBuf,
    pub output: PathBuf,
}

impl DistributionRequest {
    /// Validate `<arch> <checkout> <cef archive> <build dir> <output>`.
    pub fn from_args(args: &[String], config: &BuildConfig) -> Result<Self, BuildError> {
        Self::from_args_on(args, config, std::env::consts::OS)
    }

    pub fn from_args_on(
        args: &[String],
        config: &BuildConfig,
        os_name: &str,
    ) -> Result<Self, BuildError> {
        let [arch, checkout, cef_archive, workspace, output] = args else {
            return Err(BuildError::precondition(DISTRIBUTION_USAGE));
        };

        let os = HostOs::from_name(os_name)?;
        let arch: TargetArch = arch.parse()?;
        if !arch.is_windows() {
            return Err(BuildError::precondition(format!("Invalid arch '{arch}'")));
        }

        validate_checkout(checkout)?;

        let cef_archive = PathBuf::from(cef_archive);
        if !cef_archive.is_file() {
            return Err(BuildError::precondition(format!(
                "Given patched CEF tarball '{}' is not a file",
                cef_archive.display()
            )));
        }
        let cef_archive = absolute_path(&cef_archive)?;

        let workspace = validate_workspace_path(Path::new(workspace), config)?;
        let output = validate_output_path(Path::new(output))?;

        Ok(Self {
            os,
            arch,
            checkout: checkout.to_string(),
            cef_archive,
            workspace,
            output,
        })
    }

    /// `<project>-<checkout>-<arch>`, with path separators in the checkout flattened.
    pub fn distribution_name(&self, project_name: &str) -> String {
        format!(
            "{}-{}-{}",
            project_name,
            self.checkout.replace('/', "_"),
            self.arch
        )
    }
}

/// Resolve the workspace to an absolute path that does not exist yet and fits
/// the configured length ceiling.
pub fn validate_workspace_path(path: &Path, config: &BuildConfig) -> Result<PathBuf, BuildError> {
    let workspace = absolute_path(path)?;
    if workspace.exists() {
        return Err(BuildError::precondition(format!(
            "Given build dir path '{}' already exists",
            workspace.display()
        )));
    }
    let len = workspace.to_string_lossy().chars().count();
    if len > config.max_workspace_path_len {
        return Err(BuildError::precondition(format!(
            "Given build dir path '{}' is longer than {} characters, which may cause issues",
            workspace.display(),
            config.max_workspace_path_len
        )));
    }
    Ok(workspace)
}

/// The output must not exist and its parent must be an existing directory.
pub fn validate_output_path(path: &Path) -> Result<PathBuf, BuildError> {
    if path.exists() {
        return Err(BuildError::precondition(format!(
            "Given output file path '{}' already exists",
            path.display()
        )));
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(BuildError::precondition(format!(
            "The parent path '{}' of given output file path '{}' is not a directory",
            parent.display(),
            path.display()
        )));
    }
    absolute_path(path)
}

/// Make `path` absolute against the current directory and fold `.`/`..` lexically.
pub fn absolute_path(path: &Path) -> Result<PathBuf, BuildError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().map_err(|e| {
            BuildError::precondition(format!("Could not resolve current directory: {e}"))
        })?;
        cwd.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn relaxed_config() -> BuildConfig {
        BuildConfig {
            max_workspace_path_len: 4096,
            ..BuildConfig::default()
        }
    }

    #[test]
    fn branch_and_commit_alphabets_are_enforced() {
        assert!(BRANCH_FIELD.validate("5304").is_ok());
        assert!(BRANCH_FIELD.validate("53a4").is_err());
        assert!(BRANCH_FIELD.validate("530").is_err());
        assert!(BRANCH_FIELD.validate("53041").is_err());
        assert!(COMMIT_FIELD.validate("26c0b5e").is_ok());
        assert!(COMMIT_FIELD.validate("26C0B5E").is_err());
        assert!(COMMIT_FIELD.validate("26c0b5").is_err());
        assert!(COMMIT_FIELD.validate("26c0b5g").is_err());
    }

    #[test]
    fn alphabet_error_is_reported_before_length_error() {
        let err = COMMIT_FIELD.validate("zz").unwrap_err().to_string();
        assert!(err.contains("Only characters"), "{err}");
    }

    #[test]
    fn wrong_arity_prints_usage() {
        let err = CefBuildRequest::from_args_on(&args(&["a", "b"]), &relaxed_config(), "linux")
            .unwrap_err();
        assert!(err.to_string().starts_with("Usage:"));

        let err = CefBuildRequest::from_args_on(
            &args(&["a", "b", "x86_64", "5304"]),
            &relaxed_config(),
            "linux",
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("Usage:"));
    }

    #[test]
    fn invalid_checkout_is_rejected_before_any_path_check() {
        let temp = TempDir::new().unwrap();
        // Workspace already exists; the checkout error must still win.
        let existing = temp.path().to_string_lossy().to_string();
        let err = CefBuildRequest::from_args_on(
            &args(&[&existing, "out.tar.bz2", "x86_64", "5304", "XYZ"]),
            &relaxed_config(),
            "linux",
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("commit"), "{err}");
    }

    #[test]
    fn defaults_fill_in_missing_checkout() {
        let temp = TempDir::new().unwrap();
        let ws = temp.path().join("ws");
        let out = temp.path().join("cef.tar.bz2");
        let request = CefBuildRequest::from_args_on(
            &args(&[ws.to_str().unwrap(), out.to_str().unwrap(), "aarch64"]),
            &relaxed_config(),
            "linux",
        )
        .unwrap();
        assert_eq!(request.branch, "5304");
        assert_eq!(request.commit, "26c0b5e");
        assert_eq!(request.arch, TargetArch::Aarch64);
        assert_eq!(request.workspace, ws);
        assert!(!ws.exists());
    }

    #[test]
    fn existing_workspace_is_rejected() {
        let temp = TempDir::new().unwrap();
        let err = validate_workspace_path(temp.path(), &relaxed_config())
            .unwrap_err()
            .to_string();
        assert!(err.contains("already exists"), "{err}");
    }

    #[test]
    fn long_workspace_is_rejected() {
        let config = BuildConfig::default();
        let err = validate_workspace_path(
            Path::new("/nonexistent-build-directory-with-a-long-name"),
            &config,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("longer than 20 characters"), "{err}");
        assert!(validate_workspace_path(Path::new("/nonexistent-b"), &config).is_ok());
    }

    #[test]
    fn output_checks() {
        let temp = TempDir::new().unwrap();
        let existing = temp.path().join("exists.zip");
        fs::write(&existing, b"x").unwrap();
        assert!(validate_output_path(&existing).is_err());

        let orphan = temp.path().join("missing-dir").join("out.zip");
        let err = validate_output_path(&orphan).unwrap_err().to_string();
        assert!(err.contains("is not a directory"), "{err}");

        let file_parent = existing.join("out.zip");
        assert!(validate_output_path(&file_parent).is_err());

        assert!(validate_output_path(&temp.path().join("fresh.zip")).is_ok());
    }

    #[test]
    fn unsupported_arch_for_host_is_rejected() {
        let temp = TempDir::new().unwrap();
        let ws = temp.path().join("ws");
        let out = temp.path().join("out");
        let err = CefBuildRequest::from_args_on(
            &args(&[ws.to_str().unwrap(), out.to_str().unwrap(), "windows64"]),
            &relaxed_config(),
            "linux",
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("Architecture 'windows64' not supported"), "{err}");
        assert!(!ws.exists());
    }

    #[test]
    fn unsupported_host_is_rejected() {
        let temp = TempDir::new().unwrap();
        let ws = temp.path().join("ws");
        let out = temp.path().join("out");
        let err = CefBuildRequest::from_args_on(
            &args(&[ws.to_str().unwrap(), out.to_str().unwrap(), "x86_64"]),
            &relaxed_config(),
            "macos",
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("Platform 'macos' not supported"), "{err}");
    }

    #[test]
    fn checkout_validation() {
        assert!(validate_checkout("v1.2.3").is_ok());
        assert!(validate_checkout("feature/clipboard").is_ok());
        assert!(validate_checkout("").is_err());
        assert!(validate_checkout("--output=x").is_err());
        assert!(validate_checkout("a b").is_err());
        assert!(validate_checkout(&"a".repeat(65)).is_err());
    }

    #[test]
    fn distribution_request_validates_archive_and_arch() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("cef.tar.bz2");
        fs::write(&archive, b"cef").unwrap();
        let ws = temp.path().join("ws");
        let out = temp.path().join("dist.zip");
        let config = relaxed_config();

        let request = DistributionRequest::from_args_on(
            &args(&[
                "windows64",
                "v0.9.5",
                archive.to_str().unwrap(),
                ws.to_str().unwrap(),
                out.to_str().unwrap(),
            ]),
            &config,
            "windows",
        )
        .unwrap();
        assert_eq!(request.distribution_name("browservice"), "browservice-v0.9.5-windows64");

        let err = DistributionRequest::from_args_on(
            &args(&[
                "x86_64",
                "v0.9.5",
                archive.to_str().unwrap(),
                ws.to_str().unwrap(),
                out.to_str().unwrap(),
            ]),
            &config,
            "windows",
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("Invalid arch 'x86_64'"), "{err}");

        let err = DistributionRequest::from_args_on(
            &args(&[
                "windows32",
                "v0.9.5",
                temp.path().join("missing.tar.bz2").to_str().unwrap(),
                ws.to_str().unwrap(),
                out.to_str().unwrap(),
            ]),
            &config,
            "windows",
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("is not a file"), "{err}");
    }

    #[test]
    fn absolute_path_folds_parent_components() {
        let path = absolute_path(Path::new("/a/b/../c/./d")).unwrap();
        assert_eq!(path, PathBuf::from("/a/c/d"));
    }
}
