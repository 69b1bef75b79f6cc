use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use browservice_builder::config::BuildConfig;
use browservice_builder::smoke::{self, launch, Mode};
use browservice_builder::{exit_status, logging};

fn main() -> ExitCode {
    logging::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Re-invocation used to deliver Ctrl+C to the console of the process under test.
    if let [flag, pid] = args.as_slice() {
        if flag == launch::SEND_CTRL_C_ARG {
            return exit_status(send_ctrl_c(pid));
        }
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            smoke::report_failure(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn send_ctrl_c(pid: &str) -> Result<()> {
    let pid: u32 = pid
        .parse()
        .with_context(|| format!("invalid process id '{pid}'"))?;
    launch::send_ctrl_c_to_console(pid)
}

fn run(args: &[String]) -> Result<()> {
    let [exe, mode] = args else {
        bail!(smoke::USAGE);
    };
    let mode: Mode = mode.parse()?;
    let config = BuildConfig::load()?;
    smoke::run(Path::new(exe), mode, &config.smoke)
}
