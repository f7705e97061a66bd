//! `ddn worker-check` - worker/one-shot output equivalence.
//!
//! # Exit Codes
//!
//! - 0: normalized outputs are identical and the worker rejected a
//!   parameterized reset
//! - 1: outputs diverged or the reset contract was violated
//! - 2: either execution path could not be driven to completion

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use ddn_core::exec::CommandRunner;
use ddn_core::worker::{run_equivalence_check, EquivalenceConfig, DEFAULT_RUN_MODE};

/// Cap on divergence lines surfaced to operators.
const MAX_DIVERGENCE_LINES: usize = 8;

/// Exit codes for the worker-check command.
pub mod exit_codes {
    /// Worker and one-shot outputs are equivalent.
    pub const SUCCESS: u8 = 0;
    /// Outputs diverged or the reset contract was violated.
    pub const NOT_EQUIVALENT: u8 = 1;
    /// The check could not be driven to completion.
    pub const ERROR: u8 = 2;
}

/// Arguments for `ddn worker-check`.
#[derive(Debug, Args)]
pub struct WorkerCheckArgs {
    /// Native engine command: program followed by any fixed arguments
    #[arg(long = "engine", num_args = 1.., required = true)]
    pub engine: Vec<String>,

    /// Program source file to execute on both paths
    #[arg(long)]
    pub program: PathBuf,

    /// Argument passed to the program (repeatable)
    #[arg(long = "arg")]
    pub args: Vec<String>,

    /// Execution mode forwarded to run_file
    #[arg(long, default_value = DEFAULT_RUN_MODE)]
    pub mode: String,

    /// Bound on the one-shot invocation, in seconds
    #[arg(long, default_value = "60")]
    pub timeout_secs: u64,

    /// Bound on graceful worker shutdown, in seconds
    #[arg(long, default_value = "5")]
    pub shutdown_grace_secs: u64,
}

/// Runs the worker-check command.
pub fn run_worker_check(args: &WorkerCheckArgs, runner: &dyn CommandRunner) -> u8 {
    match try_worker_check(args, runner) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("worker check error: {err:#}");
            exit_codes::ERROR
        },
    }
}

fn try_worker_check(args: &WorkerCheckArgs, runner: &dyn CommandRunner) -> Result<u8> {
    let config = EquivalenceConfig {
        engine: args.engine.clone(),
        program: args.program.clone(),
        args: args.args.clone(),
        mode: args.mode.clone(),
        command_timeout: Duration::from_secs(args.timeout_secs),
        shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
    };

    let report = run_equivalence_check(runner, &config)?;
    if report.passed() {
        println!(
            "worker-check passed: worker output matches one-shot for {}",
            args.program.display()
        );
        return Ok(exit_codes::SUCCESS);
    }

    if !report.reset_contract_ok {
        eprintln!("worker-check failed: worker accepted a reset carrying parameters");
    }
    if !report.equivalent {
        eprintln!(
            "worker-check failed: {} divergence(s) between one-shot and worker output",
            report.divergences.len()
        );
        let shown = report.divergences.len().min(MAX_DIVERGENCE_LINES);
        for line in &report.divergences[..shown] {
            eprintln!("  - {line}");
        }
        if report.divergences.len() > shown {
            eprintln!("  ... and {} more", report.divergences.len() - shown);
        }
    }
    Ok(exit_codes::NOT_EQUIVALENT)
}
