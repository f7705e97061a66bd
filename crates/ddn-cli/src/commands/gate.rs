//! `ddn threeway-gate` - tri-state cross-platform consensus.
//!
//! # Exit Codes
//!
//! - 0: `pass_3way` or `pending_darwin`
//! - 1: `fail`
//! - 2: the gate report could not be written or the checker command could
//!   not be located

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use ddn_core::exec::CommandRunner;
use ddn_core::gate::{run_gate_to_file, GateConfig, GateStatus};

/// Exit codes for the threeway-gate command.
pub mod exit_codes {
    /// `pass_3way` or `pending_darwin`.
    pub const SUCCESS: u8 = 0;
    /// `fail`.
    pub const FAIL: u8 = 1;
    /// The gate could not run or persist its decision.
    pub const ERROR: u8 = 2;
}

/// Arguments for `ddn threeway-gate`.
#[derive(Debug, Args)]
pub struct GateArgs {
    /// Windows probe report path
    #[arg(long)]
    pub windows_report: PathBuf,

    /// Linux probe report path
    #[arg(long)]
    pub linux_report: PathBuf,

    /// Darwin probe report path (optional unless --require-darwin)
    #[arg(long)]
    pub darwin_report: Option<PathBuf>,

    /// Fail instead of pending when the darwin report is absent
    #[arg(long)]
    pub require_darwin: bool,

    /// Where to write the gate report
    #[arg(long)]
    pub out: PathBuf,

    /// Bound on the delegated matrix check, in seconds
    #[arg(long, default_value = "60")]
    pub timeout_secs: u64,
}

/// Runs the threeway-gate command.
pub fn run_gate(args: &GateArgs, runner: &dyn CommandRunner) -> u8 {
    match try_gate(args, runner) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("threeway gate error: {err:#}");
            exit_codes::ERROR
        },
    }
}

fn try_gate(args: &GateArgs, runner: &dyn CommandRunner) -> Result<u8> {
    let exe = std::env::current_exe().context("locating the ddn executable")?;
    let config = GateConfig {
        windows_report: args.windows_report.clone(),
        linux_report: args.linux_report.clone(),
        darwin_report: args.darwin_report.clone(),
        require_darwin: args.require_darwin,
        check_command: vec![exe.display().to_string(), "matrix-check".to_string()],
        timeout: Duration::from_secs(args.timeout_secs),
    };

    let report = run_gate_to_file(runner, &config, &args.out)
        .with_context(|| format!("writing gate report to {}", args.out.display()))?;

    match report.status {
        GateStatus::Pass3Way | GateStatus::PendingDarwin => {
            println!("threeway gate: {} ({})", report.status, report.reason);
            Ok(exit_codes::SUCCESS)
        },
        GateStatus::Fail => {
            eprintln!("threeway gate: fail ({})", report.reason);
            if let Some(check) = &report.check {
                for line in &check.stderr {
                    eprintln!("  - {line}");
                }
            }
            Ok(exit_codes::FAIL)
        },
    }
}
