//! Acquiring the upstream automation script.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Whether `source` has to be downloaded rather than copied.
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch `source` into `dest`.
///
/// `http://` and `https://` sources are downloaded; anything else is treated
/// as a local path and copied, which lets mirrors and tests run offline.
pub fn fetch_to(source: &str, dest: &Path) -> Result<()> {
    if is_remote(source) {
        download(source, dest)
    } else {
        fs::copy(source, dest)
            .with_context(|| format!("copying '{}' to '{}'", source, dest.display()))?;
        Ok(())
    }
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let response =
        reqwest::blocking::get(url).with_context(|| format!("requesting '{url}'"))?;

    if !response.status().is_success() {
        bail!("downloading '{}' failed with HTTP {}", url, response.status());
    }

    let bytes = response
        .bytes()
        .with_context(|| format!("reading response body of '{url}'"))?;
    fs::write(dest, &bytes).with_context(|| format!("writing '{}'", dest.display()))?;

    info!("Downloaded {} bytes to '{}'", bytes.len(), dest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_source_is_copied() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("automate-git.py");
        fs::write(&src, "print('hi')\n").unwrap();
        let dest = temp.path().join("copy.py");

        fetch_to(src.to_str().unwrap(), &dest).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "print('hi')\n");
    }

    #[test]
    fn only_http_sources_are_remote() {
        assert!(is_remote("https://bitbucket.org/chromiumembedded/cef/raw/master/tools/automate/automate-git.py"));
        assert!(is_remote("http://mirror/automate-git.py"));
        assert!(!is_remote("/srv/mirror/automate-git.py"));
        assert!(!is_remote("C:\\mirror\\automate-git.py"));
    }

    #[test]
    fn missing_local_source_fails() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("copy.py");
        assert!(fetch_to(temp.path().join("nope.py").to_str().unwrap(), &dest).is_err());
        assert!(!dest.exists());
    }
}
