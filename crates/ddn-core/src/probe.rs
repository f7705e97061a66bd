//! Local determinism probe.
//!
//! Runs the native engine's built-in determinism vector on this host and
//! captures the result verbatim as a [`ProbeReport`]. The probe never
//! retries: any invocation failure, parse failure, or cross-check failure
//! lands in the report's `reason` with `ok=false`.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::digest::digest_raw_values;
use crate::exec::{CommandRunner, CommandSpec, DEFAULT_COMMAND_TIMEOUT};
use crate::report::{PlatformDescriptor, ProbeReport, ReportError, PROBE_REPORT_SCHEMA};
use crate::vector::{
    reference_raw_values, DeterminismVector, DETERMINISM_VECTOR_SCHEMA, VECTOR_STATUS_PASS,
};

/// Arguments appended to the engine command to request its vector.
pub const ENGINE_PROBE_ARGS: &[&str] = &["probe", "--json"];

/// Runs the canonical determinism computation through the native engine.
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    engine: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Error)]
enum VectorCapture {
    #[error("no determinism vector found on engine stdout")]
    Missing,

    #[error("malformed determinism vector on engine stdout: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl ProbeRunner {
    /// Creates a runner for the given engine command (program plus fixed
    /// arguments).
    #[must_use]
    pub fn new(engine: Vec<String>) -> Self {
        Self {
            engine,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Overrides the invocation bound.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the probe. Failures are never errors at this layer: they are
    /// preserved in the returned report with `ok=false`.
    #[must_use]
    pub fn run(&self, runner: &dyn CommandRunner) -> ProbeReport {
        let platform = PlatformDescriptor::capture(runner);
        let mut command = self.engine.clone();
        command.extend(ENGINE_PROBE_ARGS.iter().map(|arg| (*arg).to_string()));
        let captured_at = chrono::Utc::now().to_rfc3339();

        let spec = CommandSpec::new(command.clone()).with_timeout(self.timeout);
        debug!(command = %spec.display(), "invoking engine determinism vector");
        let output = match runner.run(&spec) {
            Ok(output) => output,
            Err(err) => {
                return ProbeReport {
                    schema: PROBE_REPORT_SCHEMA.to_string(),
                    ok: false,
                    platform,
                    command,
                    exit_code: -1,
                    probe: None,
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    reason: Some(format!("engine invocation failed: {err}")),
                    captured_at,
                };
            },
        };

        let stdout = output.stdout_lines();
        let stderr = output.stderr_lines();

        let mut reason: Option<String> = None;
        if !output.success() {
            reason = Some(format!("engine exited with code {}", output.exit_code));
        }

        let probe = match extract_vector(&stdout) {
            Ok(vector) => Some(vector),
            Err(err) => {
                reason.get_or_insert_with(|| err.to_string());
                None
            },
        };

        if let Some(vector) = &probe {
            if reason.is_none() && vector.status != VECTOR_STATUS_PASS {
                reason = Some(format!(
                    "engine reported status {:?}, expected {:?}",
                    vector.status, VECTOR_STATUS_PASS
                ));
            }
            if reason.is_none() && vector.raw_i64 != vector.expected_raw_i64 {
                reason =
                    Some("raw values diverge from the engine-declared expectations".to_string());
            }
            if reason.is_none() && vector.raw_i64 != reference_raw_values() {
                reason = Some("raw values diverge from the local reference computation".to_string());
            }
            if reason.is_none() {
                let recomputed = digest_raw_values(&vector.raw_i64);
                if vector.content_digest != recomputed {
                    reason = Some(format!(
                        "content digest mismatch: declared {}, recomputed {recomputed}",
                        vector.content_digest
                    ));
                }
            }
        }

        let ok = reason.is_none() && probe.is_some();
        if ok {
            info!(system = %platform.system, "determinism probe passed");
        } else {
            info!(
                system = %platform.system,
                reason = reason.as_deref().unwrap_or("unknown"),
                "determinism probe failed"
            );
        }

        ProbeReport {
            schema: PROBE_REPORT_SCHEMA.to_string(),
            ok,
            platform,
            command,
            exit_code: output.exit_code,
            probe,
            stdout,
            stderr,
            reason,
            captured_at,
        }
    }

    /// Runs the probe and writes the report atomically to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] only when the report file cannot be
    /// written; probe failures themselves are recorded in the report.
    pub fn run_to_file(
        &self,
        runner: &dyn CommandRunner,
        path: &Path,
    ) -> Result<ProbeReport, ReportError> {
        let report = self.run(runner);
        crate::report::write_json_report(path, &report)?;
        Ok(report)
    }
}

/// Scans stdout for the first JSON object tagged with the vector schema.
/// Engines are free to interleave log lines with the vector itself.
fn extract_vector(lines: &[String]) -> Result<DeterminismVector, VectorCapture> {
    for line in lines {
        let trimmed = line.trim();
        if !trimmed.starts_with('{') {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
            continue;
        };
        if value.get("schema").and_then(serde_json::Value::as_str)
            == Some(DETERMINISM_VECTOR_SCHEMA)
        {
            return serde_json::from_value(value).map_err(VectorCapture::Malformed);
        }
    }
    Err(VectorCapture::Missing)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::exec::{ExecError, ScriptedRunner};

    fn engine_stdout(vector: &DeterminismVector) -> String {
        format!(
            "booting lesson engine\n{}\n",
            serde_json::to_string(vector).unwrap()
        )
    }

    fn probe_runner() -> ProbeRunner {
        ProbeRunner::new(vec!["lesson-engine".to_string()])
    }

    #[test]
    fn test_probe_passes_on_reference_vector() {
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_ok(0, &engine_stdout(&DeterminismVector::reference()), "");

        let report = probe_runner().run(&runner);
        assert!(report.ok, "reason: {:?}", report.reason);
        assert_eq!(report.exit_code, 0);
        assert!(report.reason.is_none());
        assert_eq!(
            report.command,
            vec!["lesson-engine", "probe", "--json"]
        );
        let vector = report.probe.unwrap();
        assert_eq!(vector.raw_i64, reference_raw_values());
    }

    #[test]
    fn test_probe_records_nonzero_exit() {
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_ok(2, &engine_stdout(&DeterminismVector::reference()), "boom");

        let report = probe_runner().run(&runner);
        assert!(!report.ok);
        assert_eq!(report.exit_code, 2);
        assert_eq!(
            report.reason.as_deref(),
            Some("engine exited with code 2")
        );
        // The vector is still captured for the record.
        assert!(report.probe.is_some());
        assert_eq!(report.stderr, vec!["boom".to_string()]);
    }

    #[test]
    fn test_probe_records_spawn_failure() {
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_err(ExecError::Spawn {
            command: "lesson-engine probe --json".to_string(),
            source: std::io::Error::other("no such file"),
        });

        let report = probe_runner().run(&runner);
        assert!(!report.ok);
        assert_eq!(report.exit_code, -1);
        let reason = report.reason.unwrap();
        assert!(reason.contains("engine invocation failed"));
    }

    #[test]
    fn test_probe_records_missing_vector() {
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_ok(0, "just some logs\n", "");

        let report = probe_runner().run(&runner);
        assert!(!report.ok);
        assert!(report.probe.is_none());
        assert_eq!(
            report.reason.as_deref(),
            Some("no determinism vector found on engine stdout")
        );
    }

    #[test]
    fn test_probe_records_failing_status() {
        let mut vector = DeterminismVector::reference();
        vector.status = "fail".to_string();
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_ok(0, &engine_stdout(&vector), "");

        let report = probe_runner().run(&runner);
        assert!(!report.ok);
        assert!(report.reason.unwrap().contains("status"));
    }

    #[test]
    fn test_probe_cross_checks_against_local_reference() {
        // Engine claims internal consistency over the wrong values.
        let raw = vec![1_i64, 2, 3];
        let vector = DeterminismVector {
            schema: DETERMINISM_VECTOR_SCHEMA.to_string(),
            status: VECTOR_STATUS_PASS.to_string(),
            content_digest: digest_raw_values(&raw),
            raw_i64: raw.clone(),
            expected_raw_i64: raw,
        };
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_ok(0, &engine_stdout(&vector), "");

        let report = probe_runner().run(&runner);
        assert!(!report.ok);
        assert!(report
            .reason
            .unwrap()
            .contains("local reference computation"));
    }

    #[test]
    fn test_probe_detects_digest_mismatch() {
        let mut vector = DeterminismVector::reference();
        vector.content_digest = "00".repeat(32);
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_ok(0, &engine_stdout(&vector), "");

        let report = probe_runner().run(&runner);
        assert!(!report.ok);
        assert!(report.reason.unwrap().contains("content digest mismatch"));
    }

    #[test]
    fn test_probe_detects_expectation_divergence() {
        let mut vector = DeterminismVector::reference();
        vector.expected_raw_i64[0] += 1;
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_ok(0, &engine_stdout(&vector), "");

        let report = probe_runner().run(&runner);
        assert!(!report.ok);
        assert!(report
            .reason
            .unwrap()
            .contains("engine-declared expectations"));
    }

    #[test]
    fn test_run_to_file_writes_loadable_report() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("probe_local.json");
        let runner = ScriptedRunner::new();
        runner.push_platform_capture();
        runner.push_ok(0, &engine_stdout(&DeterminismVector::reference()), "");

        let written = probe_runner().run_to_file(&runner, &path).unwrap();
        let loaded = crate::report::load_probe_report(&path).unwrap();
        assert_eq!(loaded, written);
        assert!(loaded.ok);
    }
}
