//! Source inputs of the distribution build: a snapshot of the project
//! repository and the unpacked CEF binary distribution.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bzip2::read::BzDecoder;
use tracing::info;

use crate::locate;
use crate::process::Cmd;

/// Repository root: configured, or `git rev-parse --show-toplevel` from the
/// current directory. The result is canonicalized.
pub fn repo_root(configured: Option<&Path>) -> Result<PathBuf> {
    let raw = match configured {
        Some(path) => path.to_path_buf(),
        None => {
            info!("Locating repository root");
            let output = Cmd::new("git")
                .args(["rev-parse", "--show-toplevel"])
                .run_captured()?;
            let Some(root) = output.strip_suffix('\n') else {
                bail!("unexpected output from git rev-parse: {output:?}");
            };
            PathBuf::from(root.strip_suffix('\r').unwrap_or(root))
        }
    };
    fs::canonicalize(&raw)
        .with_context(|| format!("resolving repository root '{}'", raw.display()))
}

/// Export `checkout` from `repo` into `<workspace>/src` and return that path.
pub fn snapshot(repo: &Path, checkout: &str, workspace: &Path) -> Result<PathBuf> {
    let archive = workspace.join("browservice.tar");
    info!(
        "Generating tarball of branch/commit/tag '{}' from git repository '{}' to '{}'",
        checkout,
        repo.display(),
        archive.display()
    );
    Cmd::new("git")
        .args(["archive", "--format=tar", "--output"])
        .arg(&archive)
        .args(["--", checkout])
        .current_dir(repo)
        .run()?;

    let src = workspace.join("src");
    info!(
        "Creating directory '{}' and extracting the source tarball '{}' there",
        src.display(),
        archive.display()
    );
    fs::create_dir(&src).with_context(|| format!("creating directory '{}'", src.display()))?;
    unpack_tar(&archive, &src)?;
    Ok(src)
}

const BZIP2_MAGIC: &[u8] = b"BZh";

/// Unpack a plain or bzip2-compressed tarball into `dest`.
fn unpack_tar(archive: &Path, dest: &Path) -> Result<()> {
    let mut file =
        File::open(archive).with_context(|| format!("opening '{}'", archive.display()))?;
    let mut magic = Vec::with_capacity(BZIP2_MAGIC.len());
    (&mut file)
        .take(BZIP2_MAGIC.len() as u64)
        .read_to_end(&mut magic)
        .with_context(|| format!("reading '{}'", archive.display()))?;
    file.seek(SeekFrom::Start(0))
        .with_context(|| format!("rewinding '{}'", archive.display()))?;

    let reader: Box<dyn Read> = if magic == BZIP2_MAGIC {
        Box::new(BzDecoder::new(file))
    } else {
        Box::new(file)
    };
    tar::Archive::new(reader)
        .unpack(dest)
        .with_context(|| format!("unpacking '{}' into '{}'", archive.display(), dest.display()))
}

/// Extract the CEF archive into `<src>/winbuild/cef` and return that path.
///
/// The archive must contain exactly one top-level directory.
pub fn extract_cef(cef_archive: &Path, src: &Path) -> Result<PathBuf> {
    let winbuild = src.join("winbuild");
    fs::create_dir_all(&winbuild)
        .with_context(|| format!("creating directory '{}'", winbuild.display()))?;

    let extract_root = winbuild.join("cef_extract");
    info!(
        "Creating directory '{}' and extracting CEF tarball '{}' there",
        extract_root.display(),
        cef_archive.display()
    );
    fs::create_dir(&extract_root)
        .with_context(|| format!("creating directory '{}'", extract_root.display()))?;
    unpack_tar(cef_archive, &extract_root)?;

    info!(
        "Identifying CEF binary distribution directory in '{}'",
        extract_root.display()
    );
    let extracted = locate::single_subdir(&extract_root, "CEF binary distribution directory")?;

    let cef_dir = winbuild.join("cef");
    info!(
        "Moving CEF binary distribution directory from '{}' to '{}'",
        extracted.display(),
        cef_dir.display()
    );
    fs::rename(&extracted, &cef_dir).with_context(|| {
        format!(
            "moving '{}' to '{}'",
            extracted.display(),
            cef_dir.display()
        )
    })?;
    fs::remove_dir_all(&extract_root)
        .with_context(|| format!("removing '{}'", extract_root.display()))?;
    Ok(cef_dir)
}
