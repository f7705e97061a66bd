//! Probe report artifacts: data model, validation, and atomic IO.
//!
//! A probe report is a write-once file: created by the probe on one host,
//! then consumed read-only by the resolver, matrix checker, and gate.
//! Loading decodes by schema tag first and rejects unknown schemas
//! explicitly rather than duck-typing fields.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::exec::{CommandRunner, CommandSpec};
use crate::vector::{DeterminismVector, VECTOR_STATUS_PASS};

/// Schema identifier for probe report files.
pub const PROBE_REPORT_SCHEMA: &str = "ddn.fixed64.cross_platform_probe.v1";

/// Platform system names the pipeline knows about.
pub const KNOWN_SYSTEMS: &[&str] = &["windows", "linux", "darwin"];

/// Identity of the host a probe ran on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformDescriptor {
    /// Normalized system name: `windows`, `linux`, or `darwin`.
    pub system: String,
    /// Kernel release, when the host can report one.
    pub release: String,
    /// Kernel version string, when the host can report one.
    pub version: String,
    /// Machine architecture, when the host can report one.
    pub machine: String,
    /// Version of the harness that captured the report.
    pub harness_version: String,
}

impl PlatformDescriptor {
    /// Captures the local host identity. Release, version, and machine are
    /// read through `uname` via the command-runner capability and left
    /// empty where unavailable.
    #[must_use]
    pub fn capture(runner: &dyn CommandRunner) -> Self {
        Self {
            system: normalized_system().to_string(),
            release: uname_field(runner, "-r"),
            version: uname_field(runner, "-v"),
            machine: uname_field(runner, "-m"),
            harness_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Maps the std platform name onto the pipeline's convention (`macos`
/// hosts report as `darwin`).
#[must_use]
pub fn normalized_system() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn uname_field(runner: &dyn CommandRunner, flag: &str) -> String {
    let spec = CommandSpec::new(["uname", flag]);
    match runner.run(&spec) {
        Ok(output) if output.success() => output.stdout.trim().to_string(),
        _ => String::new(),
    }
}

/// One host's probe run, persisted as a write-once JSON artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeReport {
    /// Must equal [`PROBE_REPORT_SCHEMA`].
    pub schema: String,
    /// True only when the invocation succeeded and the engine reported a
    /// passing vector that withstood cross-checking.
    pub ok: bool,
    /// The host the probe ran on.
    pub platform: PlatformDescriptor,
    /// The exact external command that was invoked.
    pub command: Vec<String>,
    /// Exit code of that command (`-1` when it never ran to completion).
    pub exit_code: i32,
    /// The engine's declared determinism vector, when one was parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<DeterminismVector>,
    /// Captured standard output lines.
    pub stdout: Vec<String>,
    /// Captured standard error lines.
    pub stderr: Vec<String>,
    /// The condition that made `ok` false, preserved verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// RFC 3339 capture timestamp.
    pub captured_at: String,
}

/// Errors loading, validating, or writing report artifacts.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The file was not valid JSON or did not match the typed shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Offending path.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The schema tag did not match the expected constant.
    #[error("unknown report schema in {path}: expected {expected}, found {found:?}")]
    SchemaMismatch {
        /// Offending path.
        path: PathBuf,
        /// The schema this loader expects.
        expected: &'static str,
        /// The schema the file carried.
        found: String,
    },

    /// The report parsed but violates a structural invariant.
    #[error("report {path} failed validation: {reason}")]
    Invalid {
        /// Offending path.
        path: PathBuf,
        /// Which invariant failed.
        reason: String,
    },

    /// The artifact could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Offending path.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Loads a probe report, checking the schema tag before the typed decode.
///
/// # Errors
///
/// Returns [`ReportError`] on read failure, malformed JSON, or a schema
/// mismatch.
pub fn load_probe_report(path: &Path) -> Result<ProbeReport, ReportError> {
    let text = fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| ReportError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let found = value
        .get("schema")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    if found != PROBE_REPORT_SCHEMA {
        return Err(ReportError::SchemaMismatch {
            path: path.to_path_buf(),
            expected: PROBE_REPORT_SCHEMA,
            found,
        });
    }
    serde_json::from_value(value).map_err(|source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Checks the structural invariants aggregation points rely on: `ok=true`,
/// a non-empty platform system, and a passing, well-formed nested vector.
///
/// # Errors
///
/// Returns [`ReportError::Invalid`] naming the first violated invariant.
pub fn validate_probe_report(report: &ProbeReport, path: &Path) -> Result<(), ReportError> {
    let invalid = |reason: String| ReportError::Invalid {
        path: path.to_path_buf(),
        reason,
    };
    if !report.ok {
        let detail = report
            .reason
            .as_deref()
            .unwrap_or("no reason recorded")
            .to_string();
        return Err(invalid(format!("report is marked ok=false ({detail})")));
    }
    if report.platform.system.is_empty() {
        return Err(invalid("platform system is empty".to_string()));
    }
    let Some(vector) = &report.probe else {
        return Err(invalid("no determinism vector is present".to_string()));
    };
    vector
        .validate()
        .map_err(|err| invalid(err.to_string()))?;
    if vector.status != VECTOR_STATUS_PASS {
        return Err(invalid(format!(
            "nested vector status is {:?}, expected {:?}",
            vector.status, VECTOR_STATUS_PASS
        )));
    }
    Ok(())
}

/// Writes bytes to `path` atomically: the file either holds the complete
/// content or is untouched, never a partial write.
///
/// # Errors
///
/// Returns [`ReportError::Write`] on any filesystem failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    let write_err = |source: std::io::Error| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_err)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(bytes).map_err(write_err)?;
    temp.persist(path)
        .map_err(|err| write_err(err.error))?;
    Ok(())
}

/// Serializes `value` as pretty JSON and writes it atomically.
///
/// # Errors
///
/// Returns [`ReportError::Write`] when serialization or the write fails.
pub fn write_json_report<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let mut text = serde_json::to_string_pretty(value).map_err(|source| ReportError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other(source),
    })?;
    text.push('\n');
    write_atomic(path, text.as_bytes())
}


#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::fixtures::{passing_report, passing_report_with_values};
    use super::*;

    #[test]
    fn test_write_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("probe_linux.json");
        let report = passing_report("linux");
        write_json_report(&path, &report).unwrap();

        let loaded = load_probe_report(&path).unwrap();
        assert_eq!(loaded, report);
        validate_probe_report(&loaded, &path).unwrap();
    }

    #[test]
    fn test_load_rejects_wrong_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("other.json");
        write_atomic(&path, br#"{"schema": "ddn.fixed64.something_else.v1"}"#).unwrap();
        assert!(matches!(
            load_probe_report(&path),
            Err(ReportError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_load_rejects_missing_schema_tag() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("untagged.json");
        write_atomic(&path, br#"{"ok": true}"#).unwrap();
        assert!(matches!(
            load_probe_report(&path),
            Err(ReportError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        write_atomic(&path, b"not json at all").unwrap();
        assert!(matches!(
            load_probe_report(&path),
            Err(ReportError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.json");
        assert!(matches!(
            load_probe_report(&path),
            Err(ReportError::Read { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_not_ok() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("r.json");
        let mut report = passing_report("linux");
        report.ok = false;
        report.reason = Some("engine exited with code 2".to_string());
        let err = validate_probe_report(&report, &path).unwrap_err();
        assert!(err.to_string().contains("ok=false"));
        assert!(err.to_string().contains("exited with code 2"));
    }

    #[test]
    fn test_validate_rejects_empty_system() {
        let path = PathBuf::from("r.json");
        let mut report = passing_report("linux");
        report.platform.system.clear();
        assert!(validate_probe_report(&report, &path).is_err());
    }

    #[test]
    fn test_validate_rejects_missing_vector() {
        let path = PathBuf::from("r.json");
        let mut report = passing_report("linux");
        report.probe = None;
        assert!(validate_probe_report(&report, &path).is_err());
    }

    #[test]
    fn test_validate_rejects_non_pass_status() {
        let path = PathBuf::from("r.json");
        let mut report = passing_report_with_values("linux", &[1, 2]);
        if let Some(vector) = report.probe.as_mut() {
            vector.status = "fail".to_string();
        }
        let err = validate_probe_report(&report, &path).unwrap_err();
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn test_write_atomic_replaces_existing_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("artifact.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_write_atomic_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("dir").join("artifact.json");
        write_atomic(&path, b"content").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "content");
    }

    #[test]
    fn test_platform_capture_uses_runner() {
        let runner = crate::exec::ScriptedRunner::new();
        runner.push_platform_capture();
        let platform = PlatformDescriptor::capture(&runner);
        assert_eq!(platform.release, "6.1.0-test");
        assert_eq!(platform.version, "#1 SMP test");
        assert_eq!(platform.machine, "x86_64");
        assert!(KNOWN_SYSTEMS.contains(&platform.system.as_str()));
        assert_eq!(runner.calls.borrow().len(), 3);
    }

    #[test]
    fn test_platform_capture_tolerates_missing_uname() {
        let runner = crate::exec::ScriptedRunner::new();
        for _ in 0..3 {
            runner.push_err(crate::exec::ExecError::EmptyCommand);
        }
        let platform = PlatformDescriptor::capture(&runner);
        assert!(platform.release.is_empty());
        assert!(platform.machine.is_empty());
        assert!(!platform.system.is_empty());
    }
}
