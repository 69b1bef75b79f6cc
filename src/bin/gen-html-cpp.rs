//! Print the generated `html.cpp` for the plugin in the current directory.

use std::io::Write;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use browservice_builder::{exit_status, html_codegen, logging};

fn main() -> ExitCode {
    logging::init();
    exit_status(run())
}

fn run() -> Result<()> {
    if std::env::args().len() != 1 {
        bail!("Usage: gen-html-cpp (run from the plugin directory)");
    }
    let code = html_codegen::generate(std::path::Path::new("."))?;
    std::io::stdout()
        .write_all(code.as_bytes())
        .context("writing generated code to stdout")
}
