//! Injecting the CEF source patcher into the upstream automation script.
//!
//! `automate-git.py` has no extension points, so the patcher is spliced in by
//! text insertion in front of a known anchor line. The anchor has to occur
//! exactly once: if upstream renames or duplicates it, the build stops here
//! rather than silently producing an unpatched framework.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use tracing::info;

use crate::error::BuildError;

/// Python module name of the rendered patcher script.
pub const PATCHER_MODULE: &str = "browservice_cef_patcher";

/// Named insertion point inside a text file.
#[derive(Debug, Clone, Copy)]
pub struct InsertionHook {
    pub name: &'static str,
    /// Line the statement is inserted in front of.
    pub anchor: &'static str,
    pub statement: &'static str,
}

/// Runs the patcher right before automate-git.py starts compiling, while
/// `cef_src_dir` is in scope.
pub const CEF_PATCHER_HOOK: InsertionHook = InsertionHook {
    name: "apply-cef-patches-before-ninja",
    anchor: "# Build using Ninja.",
    statement: "import browservice_cef_patcher; browservice_cef_patcher.run(cef_src_dir)\n\n",
};

impl InsertionHook {
    /// Insert the statement in front of the single anchor occurrence.
    ///
    /// `path` is only used for error reporting.
    pub fn apply(&self, text: &str, path: &Path) -> Result<String, BuildError> {
        let occurrences = text.matches(self.anchor).count();
        match occurrences {
            0 => Err(BuildError::HookNotFound {
                hook: self.name.to_string(),
                anchor: self.anchor.to_string(),
                path: path.to_path_buf(),
            }),
            1 => {
                let mut patched = String::with_capacity(text.len() + self.statement.len());
                let at = text.find(self.anchor).unwrap_or_default();
                patched.push_str(&text[..at]);
                patched.push_str(self.statement);
                patched.push_str(&text[at..]);
                Ok(patched)
            }
            n => Err(BuildError::HookAmbiguous {
                hook: self.name.to_string(),
                anchor: self.anchor.to_string(),
                path: path.to_path_buf(),
                occurrences: n,
            }),
        }
    }
}

/// Read `source`, apply `hook`, and write the result to `dest`.
///
/// `dest` is not created when the hook cannot be applied.
pub fn patch_script_file(hook: &InsertionHook, source: &Path, dest: &Path) -> Result<()> {
    let text = fs::read_to_string(source)
        .with_context(|| format!("reading '{}'", source.display()))?;
    let patched = hook.apply(&text, source)?;
    fs::write(dest, patched).with_context(|| format!("writing '{}'", dest.display()))?;
    Ok(())
}

/// A file the patcher overwrites, relative to the CEF source directory.
#[derive(Debug, Clone, Copy)]
pub struct SourcePatch {
    pub relative_path: &'static [&'static str],
    pub contents: &'static [u8],
}

const CLIPBOARD_H: &[u8] = include_bytes!("../assets/clipboard/clipboard_impl.h");
const CLIPBOARD_CC: &[u8] = include_bytes!("../assets/clipboard/clipboard_impl.cc");
const CLIPBOARD_FACTORY_OZONE_CC: &[u8] =
    include_bytes!("../assets/clipboard/clipboard_factory_ozone.cc");

/// Native clipboards replaced by the in-process Browservice clipboard.
pub const CLIPBOARD_PATCHES: &[SourcePatch] = &[
    SourcePatch {
        relative_path: &["..", "ui", "base", "clipboard", "clipboard_win.h"],
        contents: CLIPBOARD_H,
    },
    SourcePatch {
        relative_path: &["..", "ui", "base", "clipboard", "clipboard_win.cc"],
        contents: CLIPBOARD_CC,
    },
    SourcePatch {
        relative_path: &["..", "ui", "base", "clipboard", "clipboard_ozone.h"],
        contents: CLIPBOARD_H,
    },
    SourcePatch {
        relative_path: &["..", "ui", "base", "clipboard", "clipboard_ozone.cc"],
        contents: CLIPBOARD_CC,
    },
    SourcePatch {
        relative_path: &["..", "ui", "base", "clipboard", "clipboard_factory_ozone.cc"],
        contents: CLIPBOARD_FACTORY_OZONE_CC,
    },
];

const PATCHER_TEMPLATE: &str = include_str!("../assets/cef_patcher.py.in");

/// Render the standalone patcher script with `patches` embedded as base64.
pub fn render_patcher_script(patches: &[SourcePatch]) -> String {
    let engine = base64::engine::general_purpose::STANDARD;
    let entries = patches
        .iter()
        .map(|patch| {
            let parts = patch
                .relative_path
                .iter()
                .map(|part| format!("{part:?}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("    ([{}], \"{}\"),", parts, engine.encode(patch.contents))
        })
        .collect::<Vec<_>>()
        .join("\n");
    PATCHER_TEMPLATE.replace("@PATCHES@", &entries)
}

/// Write the patcher script next to the automation script.
pub fn install_patcher_script(dest: &Path) -> Result<()> {
    info!(
        "Installing script for applying Browservice-specific CEF/Chromium patches to '{}'",
        dest.display()
    );
    fs::write(dest, render_patcher_script(CLIPBOARD_PATCHES))
        .with_context(|| format!("writing patcher script '{}'", dest.display()))
}
