//! Three-way consensus gate.
//!
//! Combines the mandatory windows+linux probe pair with the optional
//! darwin probe into one verdict. The agreement decision itself is
//! delegated to the matrix-check command, invoked through the
//! command-runner capability; the gate records that invocation verbatim in
//! its report and promotes the checker's exit code to a verdict.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::exec::{CommandRunner, CommandSpec, DEFAULT_COMMAND_TIMEOUT};
use crate::report::{write_json_report, ReportError};

/// Schema identifier for gate report files.
pub const GATE_REPORT_SCHEMA: &str = "ddn.fixed64.cross_platform_threeway_gate.v1";

/// Gate configuration; environment-free by construction.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Path to the windows probe report (mandatory).
    pub windows_report: PathBuf,
    /// Path to the linux probe report (mandatory).
    pub linux_report: PathBuf,
    /// Path to the darwin probe report, when one was staged.
    pub darwin_report: Option<PathBuf>,
    /// Treat an absent darwin report as failure instead of pending.
    pub require_darwin: bool,
    /// Argv prefix of the matrix-check command the gate delegates to.
    pub check_command: Vec<String>,
    /// Bound on the delegated check's runtime.
    pub timeout: Duration,
}

impl GateConfig {
    /// Builds a config with the default timeout and darwin optional.
    #[must_use]
    pub fn new(
        windows_report: PathBuf,
        linux_report: PathBuf,
        check_command: Vec<String>,
    ) -> Self {
        Self {
            windows_report,
            linux_report,
            darwin_report: None,
            require_darwin: false,
            check_command,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// Terminal gate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    /// All three platform reports are present and agree.
    #[serde(rename = "pass_3way")]
    Pass3Way,
    /// The mandatory pair agrees; darwin is absent and was not required.
    #[serde(rename = "pending_darwin")]
    PendingDarwin,
    /// A mandatory report is missing, a report is invalid, or the matrix
    /// comparison disagreed.
    #[serde(rename = "fail")]
    Fail,
}

impl GateStatus {
    /// Wire rendering of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass3Way => "pass_3way",
            Self::PendingDarwin => "pending_darwin",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The report paths the gate consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateInputs {
    /// Windows probe report path.
    pub windows: PathBuf,
    /// Linux probe report path.
    pub linux: PathBuf,
    /// Darwin probe report path, when present on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub darwin: Option<PathBuf>,
}

/// Verbatim record of the delegated matrix check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckInvocation {
    /// The full argv that was run.
    pub command: Vec<String>,
    /// Its raw exit code.
    pub exit_code: i32,
    /// Captured standard output lines.
    pub stdout: Vec<String>,
    /// Captured standard error lines.
    pub stderr: Vec<String>,
}

/// The gate's full decision, persisted per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateReport {
    /// Always [`GATE_REPORT_SCHEMA`].
    pub schema: String,
    /// Terminal status.
    pub status: GateStatus,
    /// True for `pass_3way` and `pending_darwin`.
    pub ok: bool,
    /// Human-readable explanation of the status.
    pub reason: String,
    /// The inputs the gate consumed.
    pub reports: GateInputs,
    /// The delegated check, when one was invoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckInvocation>,
    /// RFC 3339 decision timestamp.
    pub captured_at: String,
}

/// Runs the gate decision procedure.
#[must_use]
pub fn run_gate(runner: &dyn CommandRunner, config: &GateConfig) -> GateReport {
    let darwin_present = config
        .darwin_report
        .as_deref()
        .is_some_and(Path::is_file);
    let inputs = GateInputs {
        windows: config.windows_report.clone(),
        linux: config.linux_report.clone(),
        darwin: darwin_present.then(|| config.darwin_report.clone()).flatten(),
    };
    let captured_at = chrono::Utc::now().to_rfc3339();
    let report = |status: GateStatus, reason: String, check: Option<CheckInvocation>| {
        info!(status = %status, reason = %reason, "threeway gate decided");
        GateReport {
            schema: GATE_REPORT_SCHEMA.to_string(),
            status,
            ok: !matches!(status, GateStatus::Fail),
            reason,
            reports: inputs.clone(),
            check,
            captured_at: captured_at.clone(),
        }
    };

    let mut missing = Vec::new();
    if !config.windows_report.is_file() {
        missing.push("windows");
    }
    if !config.linux_report.is_file() {
        missing.push("linux");
    }
    if !missing.is_empty() {
        return report(
            GateStatus::Fail,
            format!("mandatory probe report(s) missing: {}", missing.join(", ")),
            None,
        );
    }

    if !darwin_present && config.require_darwin {
        return report(
            GateStatus::Fail,
            "darwin probe report is required but missing".to_string(),
            None,
        );
    }

    let mut command = config.check_command.clone();
    let mut systems = vec!["windows", "linux"];
    command.push(config.windows_report.display().to_string());
    command.push(config.linux_report.display().to_string());
    if darwin_present {
        if let Some(darwin) = &config.darwin_report {
            command.push(darwin.display().to_string());
        }
        systems.push("darwin");
    }
    command.push("--require-systems".to_string());
    command.push(systems.join(","));

    let spec = CommandSpec::new(command.clone()).with_timeout(config.timeout);
    debug!(command = %spec.display(), "delegating to matrix check");
    match runner.run(&spec) {
        Ok(output) => {
            let agreed = output.success();
            let exit_code = output.exit_code;
            let check = CheckInvocation {
                command,
                exit_code,
                stdout: output.stdout_lines(),
                stderr: output.stderr_lines(),
            };
            if !agreed {
                report(
                    GateStatus::Fail,
                    format!("matrix check failed with exit code {exit_code}"),
                    Some(check),
                )
            } else if darwin_present {
                report(
                    GateStatus::Pass3Way,
                    "windows, linux, and darwin probe reports agree".to_string(),
                    Some(check),
                )
            } else {
                report(
                    GateStatus::PendingDarwin,
                    "windows and linux agree; darwin report not yet supplied".to_string(),
                    Some(check),
                )
            }
        },
        Err(err) => report(
            GateStatus::Fail,
            format!("failed to invoke matrix check: {err}"),
            None,
        ),
    }
}

/// Runs the gate and persists its decision atomically.
///
/// # Errors
///
/// Returns [`ReportError`] only when the report file cannot be written.
pub fn run_gate_to_file(
    runner: &dyn CommandRunner,
    config: &GateConfig,
    out_path: &Path,
) -> Result<GateReport, ReportError> {
    let report = run_gate(runner, config);
    write_json_report(out_path, &report)?;
    Ok(report)
}
