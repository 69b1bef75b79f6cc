//! Exclusively owned working directory for one pipeline run.
//!
//! The directory is created with a single non-recursive `create_dir`, so a
//! path that appeared after validation (another run racing us) fails instead
//! of being shared. It is never deleted: a failed build is diagnosed from it.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create the workspace directory. Its parent must already exist.
    pub fn create(root: &Path) -> Result<Self> {
        info!("Creating build dir '{}'", root.display());
        fs::create_dir(root)
            .with_context(|| format!("creating build dir '{}'", root.display()))?;

        let mut entries = fs::read_dir(root)
            .with_context(|| format!("reading freshly created build dir '{}'", root.display()))?;
        if entries.next().is_some() {
            bail!(
                "build dir '{}' is not empty right after creation",
                root.display()
            );
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_empty_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("ws");
        let ws = Workspace::create(&root).unwrap();
        assert!(ws.root().is_dir());
        assert_eq!(fs::read_dir(ws.root()).unwrap().count(), 0);
        assert_eq!(ws.join("a.py"), root.join("a.py"));
    }

    #[test]
    fn refuses_existing_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("ws");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("keep.txt"), b"previous run").unwrap();

        assert!(Workspace::create(&root).is_err());
        assert_eq!(fs::read(root.join("keep.txt")).unwrap(), b"previous run");
    }

    #[test]
    fn refuses_missing_parent() {
        let temp = TempDir::new().unwrap();
        assert!(Workspace::create(&temp.path().join("a/b")).is_err());
    }
}
