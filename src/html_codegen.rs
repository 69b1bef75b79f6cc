//! Compiles the retrojsvice HTML templates into C++ writer functions.
//!
//! Each `html/<name>.html` becomes
//! `void write<Name>HTML(ostream& out, const <Name>HTMLData& data)`, which
//! streams the template as a raw string literal. Placeholders of the form
//! `%-field-%` become `data.field` insertions.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::info;

pub const TEMPLATE_DIR: &str = "html";
pub const TEMPLATE_EXTENSION: &str = "html";

const PLACEHOLDER_PATTERN: &str = r"%-([a-zA-Z0-9]+)-%";

/// `main_page` -> `MainPage`. Each part is capitalized and the rest lowercased.
pub fn function_name(stem: &str) -> String {
    stem.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Replace `%-field-%` with a break out of the raw literal into `data.field`.
pub fn substitute_placeholders(template: &str) -> Result<String> {
    let placeholder = Regex::new(PLACEHOLDER_PATTERN).context("compiling placeholder pattern")?;
    Ok(placeholder
        .replace_all(template, r#")DELIM" << data.$1 << R"DELIM("#)
        .into_owned())
}

fn template_files(template_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(template_dir)
        .with_context(|| format!("listing templates in '{}'", template_dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("reading entry of '{}'", template_dir.display()))?
            .path();
        if path.extension().is_some_and(|ext| ext == TEMPLATE_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Generate the full `html.cpp` for the plugin rooted at `plugin_dir`.
pub fn generate(plugin_dir: &Path) -> Result<String> {
    let mut out = String::new();
    out.push_str("#include \"../src/html.hpp\"\n\nnamespace retrojsvice {\n");

    for path in template_files(&plugin_dir.join(TEMPLATE_DIR))? {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = function_name(&stem);
        let template = fs::read_to_string(&path)
            .with_context(|| format!("reading template '{}'", path.display()))?;

        let body = substitute_placeholders(&template)?;
        write!(
            out,
            "\nvoid write{name}HTML(ostream& out, const {name}HTMLData& data) {{\n    out << R\"DELIM({body})DELIM\";\n}}\n"
        )
        .with_context(|| format!("emitting writer for '{}'", path.display()))?;
    }

    out.push_str("\n}\n");
    Ok(out)
}

/// Generate into `<plugin_dir>/gen/html.cpp`, creating `gen/`.
pub fn generate_into_plugin(plugin_dir: &Path) -> Result<PathBuf> {
    let gen_dir = plugin_dir.join("gen");
    let target = gen_dir.join("html.cpp");
    info!(
        "Creating directory '{}' and generating '{}'",
        gen_dir.display(),
        target.display()
    );
    fs::create_dir(&gen_dir)
        .with_context(|| format!("creating directory '{}'", gen_dir.display()))?;
    let code = generate(plugin_dir)?;
    fs::write(&target, code).with_context(|| format!("writing '{}'", target.display()))?;
    Ok(target)
}
