//! End-to-end pipeline over real report files: probe artifacts in, matrix
//! agreement, gate verdicts out.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use ddn_core::digest::digest_raw_values;
use ddn_core::exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use ddn_core::gate::{run_gate, run_gate_to_file, GateConfig, GateStatus, GATE_REPORT_SCHEMA};
use ddn_core::matrix::check_matrix;
use ddn_core::report::{
    write_json_report, PlatformDescriptor, ProbeReport, PROBE_REPORT_SCHEMA,
};
use ddn_core::vector::{reference_raw_values, DeterminismVector, DETERMINISM_VECTOR_SCHEMA};

/// Runner that serves `matrix-check` invocations by running the checker
/// in-process, mirroring what the CLI subprocess would do.
struct InProcessChecker;

impl CommandRunner for InProcessChecker {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        assert_eq!(spec.argv[0], "ddn");
        assert_eq!(spec.argv[1], "matrix-check");
        let mut reports = Vec::new();
        let mut required: Vec<String> = Vec::new();
        let mut args = spec.argv[2..].iter();
        while let Some(arg) = args.next() {
            if arg == "--require-systems" {
                let list = args.next().expect("--require-systems takes a value");
                required = list.split(',').map(str::to_string).collect();
            } else {
                reports.push(PathBuf::from(arg));
            }
        }
        let outcome = check_matrix(&reports, &required);
        Ok(CommandOutput {
            exit_code: i32::from(!outcome.ok),
            stdout: format!("{}\n", outcome.summary()),
            stderr: outcome.failures.join("\n"),
        })
    }
}

fn probe_report(system: &str, raw: &[i64]) -> ProbeReport {
    let vector = DeterminismVector {
        schema: DETERMINISM_VECTOR_SCHEMA.to_string(),
        status: "pass".to_string(),
        content_digest: digest_raw_values(raw),
        raw_i64: raw.to_vec(),
        expected_raw_i64: raw.to_vec(),
    };
    ProbeReport {
        schema: PROBE_REPORT_SCHEMA.to_string(),
        ok: true,
        platform: PlatformDescriptor {
            system: system.to_string(),
            release: "6.1.0-test".to_string(),
            version: "#1 SMP test".to_string(),
            machine: "x86_64".to_string(),
            harness_version: "0.1.0".to_string(),
        },
        command: vec![
            "lesson-engine".to_string(),
            "probe".to_string(),
            "--json".to_string(),
        ],
        exit_code: 0,
        probe: Some(vector),
        stdout: Vec::new(),
        stderr: Vec::new(),
        reason: None,
        captured_at: "2026-01-01T00:00:00+00:00".to_string(),
    }
}

fn write_probe(dir: &Path, system: &str, raw: &[i64]) -> PathBuf {
    let path = dir.join(format!("fixed64_probe_{system}.json"));
    write_json_report(&path, &probe_report(system, raw)).unwrap();
    path
}

fn gate_config(windows: PathBuf, linux: PathBuf, darwin: PathBuf) -> GateConfig {
    let mut config = GateConfig::new(
        windows,
        linux,
        vec!["ddn".to_string(), "matrix-check".to_string()],
    );
    config.darwin_report = Some(darwin);
    config
}

#[test]
fn gate_walks_pending_to_pass_as_darwin_arrives() {
    let temp = TempDir::new().unwrap();
    let reference = reference_raw_values();
    let windows = write_probe(temp.path(), "windows", &reference);
    let linux = write_probe(temp.path(), "linux", &reference);
    let darwin_path = temp.path().join("fixed64_probe_darwin.json");

    let mut config = gate_config(windows, linux, darwin_path.clone());

    // Mandatory pair only: pending, and a success.
    let report = run_gate(&InProcessChecker, &config);
    assert_eq!(report.status, GateStatus::PendingDarwin);
    assert!(report.ok);

    // Same inputs but darwin required: fail.
    config.require_darwin = true;
    let report = run_gate(&InProcessChecker, &config);
    assert_eq!(report.status, GateStatus::Fail);
    assert!(!report.ok);

    // An agreeing darwin report arrives: full three-way pass either way.
    write_probe(temp.path(), "darwin", &reference);
    let report = run_gate(&InProcessChecker, &config);
    assert_eq!(report.status, GateStatus::Pass3Way);
    assert!(report.ok);
    let check = report.check.expect("check was invoked");
    assert_eq!(check.exit_code, 0);
}

#[test]
fn gate_fails_when_one_host_diverges() {
    let temp = TempDir::new().unwrap();
    let reference = reference_raw_values();
    let mut diverged = reference.clone();
    diverged[0] += 1;

    let windows = write_probe(temp.path(), "windows", &reference);
    let linux = write_probe(temp.path(), "linux", &reference);
    let darwin = write_probe(temp.path(), "darwin", &diverged);

    let config = gate_config(windows, linux, darwin);
    let report = run_gate(&InProcessChecker, &config);
    assert_eq!(report.status, GateStatus::Fail);
    let check = report.check.expect("check was invoked");
    assert_ne!(check.exit_code, 0);
    assert!(check
        .stderr
        .iter()
        .any(|line| line.contains("mismatch")));
}

#[test]
fn gate_fails_on_disagreeing_mandatory_pair_even_without_darwin() {
    let temp = TempDir::new().unwrap();
    let reference = reference_raw_values();
    let mut diverged = reference.clone();
    diverged[4] -= 7;

    let windows = write_probe(temp.path(), "windows", &reference);
    let linux = write_probe(temp.path(), "linux", &diverged);
    let darwin_path = temp.path().join("fixed64_probe_darwin.json");

    let config = gate_config(windows, linux, darwin_path);
    let report = run_gate(&InProcessChecker, &config);
    assert_eq!(report.status, GateStatus::Fail);
}

#[test]
fn gate_report_artifact_is_complete() {
    let temp = TempDir::new().unwrap();
    let reference = reference_raw_values();
    let windows = write_probe(temp.path(), "windows", &reference);
    let linux = write_probe(temp.path(), "linux", &reference);
    let darwin = write_probe(temp.path(), "darwin", &reference);
    let out = temp.path().join("threeway_gate.json");

    let config = gate_config(windows, linux, darwin);
    let written = run_gate_to_file(&InProcessChecker, &config, &out).unwrap();
    assert_eq!(written.status, GateStatus::Pass3Way);

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains(GATE_REPORT_SCHEMA));
    assert!(text.contains("pass_3way"));
    assert!(text.contains("--require-systems"));
}

#[test]
fn matrix_check_agrees_with_gate_over_the_same_files() {
    let temp = TempDir::new().unwrap();
    let reference = reference_raw_values();
    let windows = write_probe(temp.path(), "windows", &reference);
    let linux = write_probe(temp.path(), "linux", &reference);
    let darwin = write_probe(temp.path(), "darwin", &reference);

    let outcome = check_matrix(
        &[windows, linux, darwin],
        &[
            "windows".to_string(),
            "linux".to_string(),
            "darwin".to_string(),
        ],
    );
    assert!(outcome.ok, "failures: {:?}", outcome.failures);
    assert_eq!(outcome.checked, 3);
}
