//! Turning the CMake build output into the distributable ZIP.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::redist::Redistributable;
use crate::vcpkg::Vcpkg;

pub const DISTRIBUTION_ZIP: &str = "browservice_distribution.zip";

fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// An MSBuild project file consisting of a single `<Import>`.
pub fn msbuild_import_xml(project: &Path) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Project>\n  <Import Project=\"{}\" />\n</Project>\n",
        xml_escape(&project.to_string_lossy())
    )
}

/// `Directory.Build.props`/`.targets` in the CMake build dir make every
/// generated project pick up the vcpkg integration.
pub fn write_msbuild_imports(build_dir: &Path, vcpkg: &Vcpkg) -> Result<()> {
    let imports = [
        (build_dir.join("Directory.Build.props"), vcpkg.msbuild_props()),
        (build_dir.join("Directory.Build.targets"), vcpkg.msbuild_targets()),
    ];
    for (path, imported) in imports {
        info!(
            "Creating file '{}' that imports '{}' to the project",
            path.display(),
            imported.display()
        );
        fs::write(&path, msbuild_import_xml(&imported))
            .with_context(|| format!("writing '{}'", path.display()))?;
    }
    Ok(())
}

/// Rename `<distribution_root>/Release` to `<distribution_root>/<name>`.
pub fn rename_release(distribution_root: &Path, name: &str) -> Result<PathBuf> {
    let release = distribution_root.join("Release");
    let target = distribution_root.join(name);
    info!(
        "Moving created Browservice distribution from '{}' to '{}'",
        release.display(),
        target.display()
    );
    fs::rename(&release, &target)
        .with_context(|| format!("moving '{}' to '{}'", release.display(), target.display()))?;
    Ok(target)
}

pub fn copy_redistributables(dir: &Path, redists: &[Redistributable]) -> Result<()> {
    info!(
        "Copying MSVC redistributable DLLs to Browservice distribution directory '{}'",
        dir.display()
    );
    for redist in redists {
        let dest = dir.join(redist.name);
        fs::copy(&redist.path, &dest).with_context(|| {
            format!(
                "copying '{}' to '{}'",
                redist.path.display(),
                dest.display()
            )
        })?;
    }
    Ok(())
}

/// Zip `<parent>/<name>` so that `<name>/` is the only top-level entry.
pub fn zip_directory(parent: &Path, name: &str, out_path: &Path) -> Result<()> {
    let src_dir = parent.join(name);
    let out = File::create(out_path)
        .with_context(|| format!("Failed to create {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries: Vec<PathBuf> = vec![];
    for ent in WalkDir::new(&src_dir).follow_links(false) {
        let ent = ent.with_context(|| format!("walking '{}'", src_dir.display()))?;
        entries.push(ent.path().to_path_buf());
    }
    entries.sort();

    for p in entries {
        let rel = p
            .strip_prefix(parent)
            .unwrap_or(&p)
            .to_string_lossy()
            .replace('\\', "/");

        let md = fs::symlink_metadata(&p)?;
        if md.is_dir() {
            zip.add_directory(format!("{rel}/"), options)
                .with_context(|| format!("adding directory '{rel}' to zip"))?;
        } else {
            zip.start_file(rel.as_str(), options)
                .with_context(|| format!("adding file '{rel}' to zip"))?;
            let mut reader = BufReader::new(
                File::open(&p).with_context(|| format!("opening '{}'", p.display()))?,
            );
            io::copy(&mut reader, &mut zip)
                .with_context(|| format!("compressing '{}'", p.display()))?;
        }
    }

    zip.finish()
        .with_context(|| format!("finishing '{}'", out_path.display()))?;
    Ok(())
}

/// Rename, add the redistributables, zip into the workspace and copy the
/// archive to `output`.
pub fn assemble(
    distribution_root: &Path,
    name: &str,
    redists: &[Redistributable],
    workspace: &Path,
    output: &Path,
) -> Result<PathBuf> {
    let dir = rename_release(distribution_root, name)?;
    copy_redistributables(&dir, redists)?;

    let zip_path = workspace.join(DISTRIBUTION_ZIP);
    info!("Creating Browservice distribution ZIP archive '{}'", zip_path.display());
    zip_directory(distribution_root, name, &zip_path)?;

    info!(
        "Copying created ZIP archive '{}' to '{}'",
        zip_path.display(),
        output.display()
    );
    fs::copy(&zip_path, output)
        .with_context(|| format!("copying '{}' to '{}'", zip_path.display(), output.display()))?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn import_xml_is_escaped() {
        let xml = msbuild_import_xml(Path::new("C:\\b&w\\vcpkg.props"));
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Project>\n  <Import Project=\"C:\\b&amp;w\\vcpkg.props\" />\n</Project>\n"
        );
    }

    #[test]
    fn distribution_is_zipped_under_its_name() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("build/browservice");
        let release = root.join("Release");
        fs::create_dir_all(release.join("locales")).unwrap();
        fs::write(release.join("browservice.exe"), b"MZ").unwrap();
        fs::write(release.join("locales/en-US.pak"), b"pak").unwrap();

        let dll_dir = temp.path().join("crt");
        fs::create_dir(&dll_dir).unwrap();
        fs::write(dll_dir.join("msvcp140.dll"), b"dll").unwrap();
        let redists = vec![Redistributable {
            path: dll_dir.join("msvcp140.dll"),
            name: "msvcp140.dll",
        }];

        let output = temp.path().join("out.zip");
        assemble(
            &root,
            "browservice-v1-windows64",
            &redists,
            temp.path(),
            &output,
        )
        .unwrap();

        assert!(!release.exists());
        assert!(temp.path().join(DISTRIBUTION_ZIP).is_file());
        assert_eq!(
            fs::read(&output).unwrap(),
            fs::read(temp.path().join(DISTRIBUTION_ZIP)).unwrap()
        );

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            [
                "browservice-v1-windows64/",
                "browservice-v1-windows64/browservice.exe",
                "browservice-v1-windows64/locales/",
                "browservice-v1-windows64/locales/en-US.pak",
                "browservice-v1-windows64/msvcp140.dll",
            ]
        );
        let mut exe = String::new();
        archive
            .by_name("browservice-v1-windows64/browservice.exe")
            .unwrap()
            .read_to_string(&mut exe)
            .unwrap();
        assert_eq!(exe, "MZ");
    }

    #[test]
    fn missing_release_dir_fails() {
        let temp = TempDir::new().unwrap();
        assert!(rename_release(temp.path(), "browservice-x-windows32").is_err());
    }
}
