use std::process::ExitCode;

use anyhow::Result;
use browservice_builder::config::BuildConfig;
use browservice_builder::request::DistributionRequest;
use browservice_builder::{exit_status, logging, stages};

fn main() -> ExitCode {
    logging::init();
    exit_status(run())
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = BuildConfig::load()?;
    let request = DistributionRequest::from_args(&args, &config)?;
    stages::windows::run(&request, &config)?;
    Ok(())
}
