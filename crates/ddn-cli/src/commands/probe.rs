//! `ddn probe` - run the local determinism probe.
//!
//! # Exit Codes
//!
//! - 0: probe passed
//! - 1: probe ran but did not pass (reason preserved in the report)
//! - 2: the report artifact could not be written

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use ddn_core::exec::CommandRunner;
use ddn_core::probe::ProbeRunner;

/// Exit codes for the probe command.
pub mod exit_codes {
    /// Probe passed.
    pub const SUCCESS: u8 = 0;
    /// Probe completed with `ok=false`.
    pub const PROBE_FAILED: u8 = 1;
    /// The report could not be written.
    pub const ERROR: u8 = 2;
}

/// Arguments for `ddn probe`.
#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Native engine command: program followed by any fixed arguments
    #[arg(long = "engine", num_args = 1.., required = true)]
    pub engine: Vec<String>,

    /// Where to write the probe report
    #[arg(long)]
    pub out: PathBuf,

    /// Bound on the engine invocation, in seconds
    #[arg(long, default_value = "60")]
    pub timeout_secs: u64,
}

/// Runs the probe command.
pub fn run_probe(args: &ProbeArgs, runner: &dyn CommandRunner) -> u8 {
    match try_probe(args, runner) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("probe error: {err:#}");
            exit_codes::ERROR
        },
    }
}

fn try_probe(args: &ProbeArgs, runner: &dyn CommandRunner) -> Result<u8> {
    let probe = ProbeRunner::new(args.engine.clone())
        .with_timeout(Duration::from_secs(args.timeout_secs));
    let report = probe
        .run_to_file(runner, &args.out)
        .with_context(|| format!("writing probe report to {}", args.out.display()))?;

    if report.ok {
        println!(
            "probe passed on {} ({} raw values), report written to {}",
            report.platform.system,
            report
                .probe
                .as_ref()
                .map_or(0, |vector| vector.raw_i64.len()),
            args.out.display()
        );
        Ok(exit_codes::SUCCESS)
    } else {
        eprintln!(
            "probe failed on {}: {}",
            report.platform.system,
            report.reason.as_deref().unwrap_or("no reason recorded")
        );
        Ok(exit_codes::PROBE_FAILED)
    }
}
