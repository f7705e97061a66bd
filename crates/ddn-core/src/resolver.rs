//! Cross-host input resolution and staging.
//!
//! A darwin-class host cannot run inside the pipeline, so its probe report
//! arrives out-of-band and may land in several places. The resolver walks
//! an ordered candidate list, validates the first file it finds, and
//! stages it into the canonical path the rest of the pipeline expects.
//! First valid candidate wins; later candidates are never consulted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::report::{
    load_probe_report, validate_probe_report, write_atomic, ReportError,
};

/// Schema identifier for resolver outcome reports.
pub const RESOLVER_REPORT_SCHEMA: &str = "ddn.fixed64.threeway_inputs.v1";

/// Environment variable conventionally naming an externally-supplied
/// darwin report. Read at the process boundary, never inside this module.
pub const DEFAULT_ENV_VAR: &str = "DDN_DARWIN_PROBE_PATH";

/// Environment flag conventionally making a staged report mandatory.
pub const DEFAULT_REQUIRE_ENV_VAR: &str = "DDN_REQUIRE_DARWIN";

/// Filename of the staged report inside the report directory.
pub const STAGED_REPORT_FILENAME: &str = "fixed64_probe_darwin.json";

/// Explicit resolver configuration. The environment is consulted once at
/// the CLI boundary and handed in here; the core logic carries no ambient
/// state.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Directory holding the pipeline's canonical report artifacts.
    pub report_dir: PathBuf,
    /// Platform system a staged report must declare.
    pub expected_system: String,
    /// Path taken from the environment variable, when one was set.
    pub env_path: Option<PathBuf>,
    /// Additional candidate paths, scanned after the conventional ones.
    pub extra_candidates: Vec<PathBuf>,
    /// Escalate invalid hits to failure when nothing valid was staged.
    pub strict_invalid: bool,
    /// Escalate "nothing staged" to failure.
    pub require_staged: bool,
}

impl ResolverConfig {
    /// Builds a config with no env path, no extras, and both gates off.
    #[must_use]
    pub fn new(report_dir: PathBuf, expected_system: impl Into<String>) -> Self {
        Self {
            report_dir,
            expected_system: expected_system.into(),
            env_path: None,
            extra_candidates: Vec::new(),
            strict_invalid: false,
            require_staged: false,
        }
    }

    /// The canonical path a valid report is staged to.
    #[must_use]
    pub fn canonical_target(&self) -> PathBuf {
        self.report_dir.join(STAGED_REPORT_FILENAME)
    }
}

/// Terminal status of one resolution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStatus {
    /// A valid report was found and staged.
    Staged,
    /// No candidate existed; not required, so not fatal.
    Missing,
    /// Candidates existed but none validated.
    Invalid,
    /// Nothing was staged and a staged report was required.
    MissingRequired,
}

/// A candidate that existed but failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidHit {
    /// The candidate path.
    pub path: PathBuf,
    /// Why it was rejected.
    pub reason: String,
}

/// Outcome of a resolution run, persistable as a JSON report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverOutcome {
    /// Always [`RESOLVER_REPORT_SCHEMA`].
    pub schema: String,
    /// Terminal status.
    pub status: ResolveStatus,
    /// Whether the run counts as a success under the configured gates.
    pub ok: bool,
    /// Where the report was staged, when one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_path: Option<PathBuf>,
    /// The candidate that supplied the staged report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Candidates that existed but failed validation, in scan order.
    pub invalid_hits: Vec<InvalidHit>,
    /// Human-readable explanation of the status.
    pub reason: String,
}

/// Builds the ordered candidate list: env-indicated path first, then the
/// canonical target itself, conventional drop locations, and caller
/// extras, de-duplicated case-insensitively.
#[must_use]
pub fn candidate_paths(config: &ResolverConfig) -> Vec<PathBuf> {
    let mut ordered = Vec::new();
    if let Some(path) = &config.env_path {
        ordered.push(path.clone());
    }
    ordered.push(config.canonical_target());
    ordered.push(config.report_dir.join("inbox").join(STAGED_REPORT_FILENAME));
    ordered.push(PathBuf::from(STAGED_REPORT_FILENAME));
    ordered.extend(config.extra_candidates.iter().cloned());

    let mut seen = std::collections::HashSet::new();
    ordered.retain(|path| seen.insert(path.to_string_lossy().to_lowercase()));
    ordered
}

/// Walks the candidate list and stages the first valid report.
#[must_use]
pub fn resolve_and_stage(config: &ResolverConfig) -> ResolverOutcome {
    let target = config.canonical_target();
    let mut invalid_hits = Vec::new();
    let mut staged_from: Option<PathBuf> = None;

    for candidate in candidate_paths(config) {
        if !candidate.is_file() {
            debug!(candidate = %candidate.display(), "candidate absent");
            continue;
        }
        match validate_candidate(&candidate, &config.expected_system) {
            Ok(()) => {
                if let Err(err) = stage(&candidate, &target) {
                    warn!(
                        candidate = %candidate.display(),
                        error = %err,
                        "valid candidate could not be staged"
                    );
                    invalid_hits.push(InvalidHit {
                        path: candidate,
                        reason: format!("staging failed: {err}"),
                    });
                    continue;
                }
                info!(
                    source = %candidate.display(),
                    target = %target.display(),
                    "staged external probe report"
                );
                staged_from = Some(candidate);
                break;
            },
            Err(err) => {
                warn!(candidate = %candidate.display(), error = %err, "invalid candidate");
                invalid_hits.push(InvalidHit {
                    path: candidate,
                    reason: err.to_string(),
                });
            },
        }
    }

    let (status, ok, reason) = match &staged_from {
        Some(source) => (
            ResolveStatus::Staged,
            true,
            format!(
                "staged {} from {}",
                target.display(),
                source.display()
            ),
        ),
        None if config.require_staged => (
            ResolveStatus::MissingRequired,
            false,
            format!(
                "no {} probe report was staged and one is required",
                config.expected_system
            ),
        ),
        None if !invalid_hits.is_empty() => (
            ResolveStatus::Invalid,
            !config.strict_invalid,
            format!(
                "{} candidate(s) existed but failed validation",
                invalid_hits.len()
            ),
        ),
        None => (
            ResolveStatus::Missing,
            true,
            "no candidate probe report was found".to_string(),
        ),
    };

    ResolverOutcome {
        schema: RESOLVER_REPORT_SCHEMA.to_string(),
        status,
        ok,
        staged_path: staged_from.as_ref().map(|_| target.clone()),
        source: staged_from,
        invalid_hits,
        reason,
    }
}

fn validate_candidate(path: &Path, expected_system: &str) -> Result<(), ReportError> {
    let report = load_probe_report(path)?;
    validate_probe_report(&report, path)?;
    if report.platform.system != expected_system {
        return Err(ReportError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "platform system {:?} does not match expected {expected_system:?}",
                report.platform.system
            ),
        });
    }
    Ok(())
}

/// Copies the candidate to the canonical target unless it already is the
/// target.
fn stage(candidate: &Path, target: &Path) -> Result<(), ReportError> {
    let already_staged = match (candidate.canonicalize(), target.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => candidate == target,
    };
    if already_staged {
        return Ok(());
    }
    let bytes = fs::read(candidate).map_err(|source| ReportError::Read {
        path: candidate.to_path_buf(),
        source,
    })?;
    write_atomic(target, &bytes)
}
