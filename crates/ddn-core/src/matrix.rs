//! Cross-platform matrix check.
//!
//! An n-way equality reduction over probe reports with a designated
//! baseline: the first successfully-loaded report. The baseline choice
//! only affects which report is blamed on mismatch, never whether a
//! failure occurs.

use std::path::PathBuf;

use serde::Serialize;

use crate::report::{load_probe_report, validate_probe_report};

/// Cap on the detail lines surfaced to operators, to keep CI logs
/// scannable.
pub const MAX_DETAIL_LINES: usize = 8;

/// Result of one matrix check run.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixOutcome {
    /// True when every report loaded, every required system was observed,
    /// and every report agrees with the baseline.
    pub ok: bool,
    /// How many reports were structurally valid.
    pub checked: usize,
    /// Platform systems observed across the valid reports, in load order.
    pub observed_systems: Vec<String>,
    /// One line per problem, each naming the offending report(s).
    pub failures: Vec<String>,
}

impl MatrixOutcome {
    /// One-line categorized summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.ok {
            format!(
                "matrix check passed: {} report(s) agree across [{}]",
                self.checked,
                self.observed_systems.join(", ")
            )
        } else {
            format!("matrix check failed: {} problem(s)", self.failures.len())
        }
    }

    /// The failure details capped at [`MAX_DETAIL_LINES`], plus how many
    /// were suppressed.
    #[must_use]
    pub fn capped_failures(&self) -> (&[String], usize) {
        let shown = self.failures.len().min(MAX_DETAIL_LINES);
        (&self.failures[..shown], self.failures.len() - shown)
    }
}

/// Compares probe reports for exact agreement of digest and raw values.
///
/// Every report must be structurally valid; when `required_systems` is
/// non-empty, each named system must appear among the valid reports.
#[must_use]
pub fn check_matrix(paths: &[PathBuf], required_systems: &[String]) -> MatrixOutcome {
    let mut failures = Vec::new();
    let mut loaded = Vec::new();

    for path in paths {
        let result = load_probe_report(path)
            .and_then(|report| validate_probe_report(&report, path).map(|()| report));
        match result {
            Ok(report) => loaded.push((path.clone(), report)),
            Err(err) => failures.push(err.to_string()),
        }
    }

    if paths.is_empty() {
        failures.push("no probe report paths were supplied".to_string());
    }

    let mut observed_systems: Vec<String> = Vec::new();
    for (_, report) in &loaded {
        if !observed_systems.contains(&report.platform.system) {
            observed_systems.push(report.platform.system.clone());
        }
    }

    let missing: Vec<&str> = required_systems
        .iter()
        .filter(|system| !observed_systems.iter().any(|seen| seen == *system))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        failures.push(format!(
            "required system(s) missing from loaded reports: {}",
            missing.join(", ")
        ));
    }

    if let Some(((baseline_path, baseline), rest)) = loaded.split_first() {
        for (path, report) in rest {
            let (Some(base_vector), Some(vector)) = (&baseline.probe, &report.probe) else {
                continue;
            };
            if base_vector.content_digest != vector.content_digest {
                failures.push(format!(
                    "content digest mismatch between {} and {}",
                    baseline_path.display(),
                    path.display()
                ));
            }
            if base_vector.raw_i64 != vector.raw_i64 {
                failures.push(format!(
                    "raw value sequence mismatch between {} and {}",
                    baseline_path.display(),
                    path.display()
                ));
            }
        }
    }

    MatrixOutcome {
        ok: failures.is_empty(),
        checked: loaded.len(),
        observed_systems,
        failures,
    }
}
