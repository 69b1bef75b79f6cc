//! `run-manifest.json`, the post-mortem record a stage leaves in its workspace.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::warn;

pub const RUN_MANIFEST_FILE: &str = "run-manifest.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Building,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub stage: String,
    pub status: RunStatus,
    pub created_at_utc: String,
    pub finished_at_utc: Option<String>,
    /// The validated request, as given to the stage.
    pub request: serde_json::Value,
    pub output_path: Option<PathBuf>,
    pub output_sha256: Option<String>,
}

impl RunManifest {
    pub fn building<T: Serialize>(stage: &str, request: &T) -> Result<Self> {
        Ok(Self {
            stage: stage.to_string(),
            status: RunStatus::Building,
            created_at_utc: now_utc_compact(),
            finished_at_utc: None,
            request: serde_json::to_value(request).context("serializing run request")?,
            output_path: None,
            output_sha256: None,
        })
    }
}

pub fn manifest_path(workspace: &Path) -> PathBuf {
    workspace.join(RUN_MANIFEST_FILE)
}

pub fn write_run_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    write_json_atomic(path, manifest)
        .with_context(|| format!("writing run manifest '{}'", path.display()))
}

pub fn read_run_manifest(path: &Path) -> Result<RunManifest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading run manifest '{}'", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing run manifest '{}'", path.display()))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow!("path without parent '{}'", path.display()))?;
    let tmp = parent.join(format!(".{}.tmp-{}", RUN_MANIFEST_FILE, std::process::id()));
    let payload = serde_json::to_vec_pretty(value).context("serializing run manifest")?;
    fs::write(&tmp, payload).with_context(|| format!("writing temp file '{}'", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| {
        format!(
            "renaming temp file '{}' to '{}'",
            tmp.display(),
            path.display()
        )
    })?;
    Ok(())
}

/// Write the `building` manifest, run `body`, then record how it ended.
///
/// `body` returns the produced output path. The manifest never changes the
/// outcome: failures to write it are logged and `body`'s result is returned.
pub fn record_run<T, F>(workspace: &Path, stage: &str, request: &T, body: F) -> Result<PathBuf>
where
    T: Serialize,
    F: FnOnce() -> Result<PathBuf>,
{
    let path = manifest_path(workspace);
    let manifest = RunManifest::building(stage, request).and_then(|manifest| {
        write_run_manifest(&path, &manifest)?;
        Ok(manifest)
    });
    let mut manifest = match manifest {
        Ok(manifest) => Some(manifest),
        Err(err) => {
            warn!("failed to persist run manifest: {err:#}");
            None
        }
    };

    let result = body();

    if let Some(manifest) = manifest.as_mut() {
        if let Err(err) = finish_manifest(&path, manifest, &result) {
            warn!("failed to persist run manifest: {err:#}");
        }
    }
    result
}

fn finish_manifest(path: &Path, manifest: &mut RunManifest, result: &Result<PathBuf>) -> Result<()> {
    manifest.finished_at_utc = Some(now_utc_compact());
    match result {
        Ok(output) => {
            manifest.status = RunStatus::Success;
            manifest.output_path = Some(output.clone());
            manifest.output_sha256 = Some(sha256_file(output)?);
        }
        Err(_) => manifest.status = RunStatus::Failed,
    }
    write_run_manifest(path, manifest)
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut r = BufReader::new(f);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = r
            .read(&mut buf)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn now_utc_compact() -> String {
    let now = OffsetDateTime::now_utc();
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        now.year(),
        now.month() as u8,
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}
