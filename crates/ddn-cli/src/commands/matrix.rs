//! `ddn matrix-check` - n-way probe report agreement.
//!
//! # Exit Codes
//!
//! - 0: all reports valid, required systems observed, all digests and raw
//!   sequences agree
//! - 1: any structural failure, missing required system, or disagreement

use std::path::PathBuf;

use clap::Args;
use ddn_core::matrix::{check_matrix, MatrixOutcome};

/// Exit codes for the matrix-check command.
pub mod exit_codes {
    /// All loaded reports agree.
    pub const SUCCESS: u8 = 0;
    /// Validation failure, missing required system, or disagreement.
    pub const MISMATCH: u8 = 1;
}

/// Arguments for `ddn matrix-check`.
#[derive(Debug, Args)]
pub struct MatrixCheckArgs {
    /// Probe report paths to compare
    #[arg(required = true)]
    pub reports: Vec<PathBuf>,

    /// Comma-separated platform systems that must all be observed
    #[arg(long)]
    pub require_systems: Option<String>,

    /// Emit the outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl MatrixCheckArgs {
    /// Parses the required-systems list, ignoring empty entries.
    #[must_use]
    pub fn required_systems(&self) -> Vec<String> {
        self.require_systems
            .as_deref()
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Runs the matrix-check command.
pub fn run_matrix_check(args: &MatrixCheckArgs) -> u8 {
    let outcome = check_matrix(&args.reports, &args.required_systems());
    render(&outcome, args.json);
    if outcome.ok {
        exit_codes::SUCCESS
    } else {
        exit_codes::MISMATCH
    }
}

fn render(outcome: &MatrixOutcome, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(outcome).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }
    if outcome.ok {
        println!("{}", outcome.summary());
    } else {
        eprintln!("{}", outcome.summary());
        let (shown, hidden) = outcome.capped_failures();
        for line in shown {
            eprintln!("  - {line}");
        }
        if hidden > 0 {
            eprintln!("  ... and {hidden} more");
        }
    }
}
