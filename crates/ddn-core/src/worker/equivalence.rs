//! One-shot versus worker output equivalence.
//!
//! Running a program once via direct invocation and once via `run_file`
//! against a live worker must yield identical ordered line sequences after
//! host-volatile digest lines are stripped. The digest values themselves
//! are cross-checked by the probe/matrix subsystem; this check is about
//! structural output equivalence.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::exec::{CommandOutput, CommandRunner, CommandSpec, DEFAULT_COMMAND_TIMEOUT, ExecError};

use super::client::WorkerError;
use super::proto::{RunFileParams, RunFileResult};
use super::session::{SessionError, WorkerSession, DEFAULT_SHUTDOWN_GRACE, WORKER_SUBCOMMAND};

/// Line prefixes that carry per-run digests and are stripped before
/// comparison.
pub const HASH_LINE_PREFIXES: &[&str] = &["state#", "trace#", "shape#"];

/// Engine subcommand for a direct one-shot run.
pub const ONESHOT_SUBCOMMAND: &str = "run";

/// Default `run_file` execution mode.
pub const DEFAULT_RUN_MODE: &str = "run";

/// Configuration for one equivalence check.
#[derive(Debug, Clone)]
pub struct EquivalenceConfig {
    /// Engine command (program plus fixed arguments).
    pub engine: Vec<String>,
    /// Program source file to run on both paths.
    pub program: PathBuf,
    /// Arguments handed to the program.
    pub args: Vec<String>,
    /// Execution mode forwarded to `run_file`.
    pub mode: String,
    /// Bound on the one-shot invocation.
    pub command_timeout: Duration,
    /// Bound on graceful worker shutdown.
    pub shutdown_grace: Duration,
}

impl EquivalenceConfig {
    /// Builds a config with default mode, timeout, and grace.
    #[must_use]
    pub fn new(engine: Vec<String>, program: PathBuf) -> Self {
        Self {
            engine,
            program,
            args: Vec::new(),
            mode: DEFAULT_RUN_MODE.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Errors that prevent the comparison from being made at all.
#[derive(Debug, Error)]
pub enum EquivalenceError {
    /// The one-shot run itself failed, so there is nothing to compare.
    #[error("one-shot engine run failed with exit code {exit_code}")]
    OneShotFailed {
        /// The one-shot exit code.
        exit_code: i32,
    },

    /// The one-shot command could not be executed.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// The worker process could not be started.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The worker protocol broke down.
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Verdict of one equivalence check.
#[derive(Debug, Clone, Serialize)]
pub struct EquivalenceReport {
    /// True when the normalized output streams match.
    pub equivalent: bool,
    /// True when the worker rejected a parameterized reset with an error
    /// response.
    pub reset_contract_ok: bool,
    /// One line per observed divergence.
    pub divergences: Vec<String>,
}

impl EquivalenceReport {
    /// True when both the output comparison and the reset contract held.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.equivalent && self.reset_contract_ok
    }
}

/// Removes lines beginning with a recognized digest marker.
#[must_use]
pub fn strip_hash_lines(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter(|line| {
            !HASH_LINE_PREFIXES
                .iter()
                .any(|prefix| line.starts_with(prefix))
        })
        .cloned()
        .collect()
}

/// Compares two normalized streams, describing every position where they
/// differ.
#[must_use]
pub fn diff_normalized(label: &str, oneshot: &[String], worker: &[String]) -> Vec<String> {
    let oneshot = strip_hash_lines(oneshot);
    let worker = strip_hash_lines(worker);
    let mut divergences = Vec::new();

    let shared = oneshot.len().min(worker.len());
    for idx in 0..shared {
        if oneshot[idx] != worker[idx] {
            divergences.push(format!(
                "{label} line {}: one-shot {:?} vs worker {:?}",
                idx + 1,
                oneshot[idx],
                worker[idx]
            ));
        }
    }
    for (idx, line) in oneshot.iter().enumerate().skip(shared) {
        divergences.push(format!(
            "{label} line {}: one-shot {line:?} vs worker <missing>",
            idx + 1
        ));
    }
    for (idx, line) in worker.iter().enumerate().skip(shared) {
        divergences.push(format!(
            "{label} line {}: one-shot <missing> vs worker {line:?}",
            idx + 1
        ));
    }
    divergences
}

/// Combines the one-shot output and the worker result into a verdict.
#[must_use]
pub fn evaluate(
    oneshot: &CommandOutput,
    worker: &RunFileResult,
    reset_contract_ok: bool,
) -> EquivalenceReport {
    let mut divergences = Vec::new();
    if !worker.ok {
        divergences.push("worker run_file reported ok=false".to_string());
    }
    divergences.extend(diff_normalized(
        "stdout",
        &oneshot.stdout_lines(),
        &worker.stdout,
    ));
    divergences.extend(diff_normalized(
        "stderr",
        &oneshot.stderr_lines(),
        &worker.stderr,
    ));
    EquivalenceReport {
        equivalent: divergences.is_empty(),
        reset_contract_ok,
        divergences,
    }
}

/// Runs the full check: one-shot invocation, then the same program through
/// a live worker, then the comparison. The worker is terminated on every
/// path.
///
/// # Errors
///
/// Returns [`EquivalenceError`] when either execution path cannot be
/// driven to completion; divergences are not errors, they are the report.
pub fn run_equivalence_check(
    runner: &dyn CommandRunner,
    config: &EquivalenceConfig,
) -> Result<EquivalenceReport, EquivalenceError> {
    let mut oneshot_argv = config.engine.clone();
    oneshot_argv.push(ONESHOT_SUBCOMMAND.to_string());
    oneshot_argv.push(config.program.display().to_string());
    oneshot_argv.extend(config.args.iter().cloned());
    let spec = CommandSpec::new(oneshot_argv).with_timeout(config.command_timeout);
    debug!(command = %spec.display(), "one-shot engine run");
    let oneshot = runner.run(&spec)?;
    if !oneshot.success() {
        return Err(EquivalenceError::OneShotFailed {
            exit_code: oneshot.exit_code,
        });
    }

    let mut worker_argv = config.engine.clone();
    worker_argv.push(WORKER_SUBCOMMAND.to_string());
    let mut session = WorkerSession::spawn(&worker_argv)?;
    let outcome = drive_worker(&mut session, config, &oneshot);
    let shutdown = session.shutdown(config.shutdown_grace);
    debug!(?shutdown, "worker session closed");
    outcome
}

fn drive_worker(
    session: &mut WorkerSession,
    config: &EquivalenceConfig,
    oneshot: &CommandOutput,
) -> Result<EquivalenceReport, EquivalenceError> {
    let client = session.client();
    client.reset()?;

    let reset_contract_ok = match client.reset_expecting_rejection(json!({ "unexpected": true })) {
        Ok(_) => true,
        Err(WorkerError::ResetContractViolated) => false,
        Err(err) => return Err(err.into()),
    };

    let result = client.run_file(&RunFileParams {
        path: config.program.display().to_string(),
        args: config.args.clone(),
        mode: config.mode.clone(),
    })?;

    Ok(evaluate(oneshot, &result, reset_contract_ok))
}
