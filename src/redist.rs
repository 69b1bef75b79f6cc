//! MSVC runtime redistributables.
//!
//! The DLLs shipped next to the executable must match the toolset that built
//! it, so their location is derived from the compiler path CMake reported:
//!
//! ```text
//! <prefix>\VC\Tools\MSVC\<version>\bin\Hostx64\x64\cl.exe
//! <prefix>\VC\Redist\MSVC\<version>\<x86|x64>\Microsoft.VC*.CRT\
//! ```

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::error::BuildError;
use crate::locate::Filter;
use crate::platform::TargetArch;

const TOOLS_ANCHOR: &str = "\\vc\\tools\\msvc\\";
const BIN_ANCHOR: &str = "\\bin\\";

/// A DLL to copy into the distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redistributable {
    pub path: PathBuf,
    pub name: &'static str,
}

fn redist_arch(arch: TargetArch) -> Result<&'static str, BuildError> {
    match arch {
        TargetArch::Windows32 => Ok("x86"),
        TargetArch::Windows64 => Ok("x64"),
        other => Err(BuildError::precondition(format!(
            "No MSVC redistributables for arch '{other}'"
        ))),
    }
}

/// DLL names required for `arch`.
pub fn required_files(arch: TargetArch) -> &'static [&'static str] {
    match arch {
        TargetArch::Windows64 => &["msvcp140.dll", "vcruntime140.dll", "vcruntime140_1.dll"],
        _ => &["msvcp140.dll", "vcruntime140.dll"],
    }
}

/// Derive the redistributable root from the compiler path.
///
/// Anchors are matched case-insensitively; the last `\VC\Tools\MSVC\` and
/// the first `\bin\` after it delimit the toolset version.
pub fn redist_root(compiler: &str, arch: TargetArch) -> Result<String, BuildError> {
    let lower = compiler.to_ascii_lowercase();
    let unrecognized = || {
        BuildError::precondition(format!(
            "Could not deduce MSVC redistributable location from compiler path '{compiler}'"
        ))
    };

    let i = lower.rfind(TOOLS_ANCHOR).ok_or_else(unrecognized)?;
    let version_start = i + TOOLS_ANCHOR.len();
    let j = lower[version_start..]
        .find(BIN_ANCHOR)
        .map(|offset| version_start + offset)
        .ok_or_else(unrecognized)?;

    Ok(format!(
        "{}\\VC\\Redist\\MSVC\\{}\\{}",
        &compiler[..i],
        &compiler[version_start..j],
        redist_arch(arch)?
    ))
}

/// Find the single `Microsoft.VC*.CRT` directory under `root` and collect
/// the required DLLs from it.
pub fn collect(root: &Path, arch: TargetArch) -> Result<Vec<Redistributable>> {
    let crt_dir = Filter::new("directory containing MSVC redistributable DLLs")
        .prefix("Microsoft.VC")
        .suffix(".CRT")
        .dirs()
        .find_one(root)?;
    info!(
        "Identified MSVC redistributable DLL directory '{}', locating DLLs",
        crt_dir.display()
    );

    required_files(arch)
        .iter()
        .map(|name| {
            let path = crt_dir.join(name);
            if path.is_file() {
                Ok(Redistributable { path, name })
            } else {
                Err(BuildError::MissingFile(path).into())
            }
        })
        .collect()
}

/// Full lookup from the compiler path.
pub fn locate(compiler: &Path, arch: TargetArch) -> Result<Vec<Redistributable>> {
    info!(
        "Deducing MSVC redistributable DLL locations from the detected C++ compiler path '{}'",
        compiler.display()
    );
    let root = redist_root(&compiler.to_string_lossy(), arch)?;
    collect(Path::new(&root), arch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CL: &str = r"C:\Program Files (x86)\Microsoft Visual Studio\2019\Community\VC\Tools\MSVC\14.29.30133\bin\HostX64\x64\cl.exe";

    #[test]
    fn root_replaces_tools_with_redist() {
        assert_eq!(
            redist_root(CL, TargetArch::Windows64).unwrap(),
            r"C:\Program Files (x86)\Microsoft Visual Studio\2019\Community\VC\Redist\MSVC\14.29.30133\x64"
        );
        assert!(redist_root(CL, TargetArch::Windows32).unwrap().ends_with(r"\14.29.30133\x86"));
    }

    #[test]
    fn anchors_are_case_insensitive() {
        let path = r"D:\vs\vc\TOOLS\Msvc\14.30\BIN\Hostx86\x86\cl.exe";
        assert_eq!(
            redist_root(path, TargetArch::Windows32).unwrap(),
            r"D:\vs\VC\Redist\MSVC\14.30\x86"
        );
    }

    #[test]
    fn last_tools_anchor_wins() {
        let path = r"C:\vc\tools\msvc\junk\VC\Tools\MSVC\14.29\bin\cl.exe";
        assert_eq!(
            redist_root(path, TargetArch::Windows64).unwrap(),
            r"C:\vc\tools\msvc\junk\VC\Redist\MSVC\14.29\x64"
        );
    }

    #[test]
    fn unrecognized_compiler_path_fails() {
        assert!(redist_root(r"C:\LLVM\bin\clang-cl.exe", TargetArch::Windows64).is_err());
        assert!(redist_root(r"C:\VC\Tools\MSVC\14.29\cl.exe", TargetArch::Windows64).is_err());
    }

    fn crt_fixture(files: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        let crt = temp.path().join("Microsoft.VC142.CRT");
        fs::create_dir(&crt).unwrap();
        fs::create_dir(temp.path().join("Microsoft.VC142.OpenMP")).unwrap();
        fs::write(temp.path().join("Microsoft.VC142.Other.CRT"), b"file, not dir").unwrap();
        for file in files {
            fs::write(crt.join(file), b"dll").unwrap();
        }
        temp
    }

    #[test]
    fn windows64_needs_three_dlls() {
        let temp = crt_fixture(&["msvcp140.dll", "vcruntime140.dll", "vcruntime140_1.dll"]);
        let dlls = collect(temp.path(), TargetArch::Windows64).unwrap();
        let names: Vec<_> = dlls.iter().map(|d| d.name).collect();
        assert_eq!(names, ["msvcp140.dll", "vcruntime140.dll", "vcruntime140_1.dll"]);
    }

    #[test]
    fn windows32_needs_two_dlls() {
        let temp = crt_fixture(&["msvcp140.dll", "vcruntime140.dll"]);
        assert_eq!(collect(temp.path(), TargetArch::Windows32).unwrap().len(), 2);
        let err = collect(temp.path(), TargetArch::Windows64).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingFile(p)) if p.ends_with("vcruntime140_1.dll")
        ));
    }

    #[test]
    fn two_crt_directories_are_ambiguous() {
        let temp = crt_fixture(&["msvcp140.dll", "vcruntime140.dll"]);
        fs::create_dir(temp.path().join("Microsoft.VC143.CRT")).unwrap();
        let err = collect(temp.path(), TargetArch::Windows32).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::Ambiguous { .. })
        ));
    }
}
