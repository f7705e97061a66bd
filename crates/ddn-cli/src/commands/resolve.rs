//! `ddn resolve-inputs` - stage an externally-produced probe report.
//!
//! The environment is read exactly once here, at the process boundary,
//! and handed to the resolver as explicit configuration.
//!
//! # Exit Codes
//!
//! - 0: staged, missing (not required), or invalid hits without
//!   --strict-invalid
//! - 1: missing while required, or invalid hits under --strict-invalid
//! - 2: the outcome report could not be written

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ddn_core::report::write_json_report;
use ddn_core::resolver::{
    resolve_and_stage, ResolverConfig, ResolverOutcome, DEFAULT_ENV_VAR,
    DEFAULT_REQUIRE_ENV_VAR,
};

/// Exit codes for the resolve-inputs command.
pub mod exit_codes {
    /// Resolution succeeded or was acceptably inconclusive.
    pub const SUCCESS: u8 = 0;
    /// Resolution failed under the configured gates.
    pub const UNRESOLVED: u8 = 1;
    /// The outcome report could not be written.
    pub const ERROR: u8 = 2;
}

/// Arguments for `ddn resolve-inputs`.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Directory holding the pipeline's canonical report artifacts
    #[arg(long)]
    pub report_dir: PathBuf,

    /// Platform system the staged report must declare
    #[arg(long, default_value = "darwin")]
    pub system: String,

    /// Environment variable naming an externally-supplied report path
    #[arg(long, default_value = DEFAULT_ENV_VAR)]
    pub env_var: String,

    /// Additional candidate path (repeatable, scanned after conventional
    /// locations)
    #[arg(long = "candidate")]
    pub candidates: Vec<PathBuf>,

    /// Escalate invalid hits to failure when nothing valid was staged
    #[arg(long)]
    pub strict_invalid: bool,

    /// Environment flag that makes a staged report mandatory when set to
    /// "true"
    #[arg(long, default_value = DEFAULT_REQUIRE_ENV_VAR)]
    pub require_env: String,

    /// Optional JSON outcome report path
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Runs the resolve-inputs command.
pub fn run_resolve(args: &ResolveArgs) -> u8 {
    match try_resolve(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("resolve error: {err:#}");
            exit_codes::ERROR
        },
    }
}

fn try_resolve(args: &ResolveArgs) -> Result<u8> {
    // Sole environment reads in the pipeline; everything downstream gets
    // explicit configuration.
    let env_path = std::env::var_os(&args.env_var)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty());
    let require_staged = env_flag(&args.require_env);

    let config = ResolverConfig {
        report_dir: args.report_dir.clone(),
        expected_system: args.system.clone(),
        env_path,
        extra_candidates: args.candidates.clone(),
        strict_invalid: args.strict_invalid,
        require_staged,
    };

    let outcome = resolve_and_stage(&config);
    if let Some(out) = &args.out {
        write_json_report(out, &outcome)
            .with_context(|| format!("writing resolver report to {}", out.display()))?;
    }
    render(&outcome);
    if outcome.ok {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::UNRESOLVED)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value.to_lowercase() == "true")
        .unwrap_or(false)
}

fn render(outcome: &ResolverOutcome) {
    if outcome.ok {
        println!("resolve-inputs: {}", outcome.reason);
    } else {
        eprintln!("resolve-inputs failed: {}", outcome.reason);
    }
    for hit in &outcome.invalid_hits {
        eprintln!("  invalid candidate {}: {}", hit.path.display(), hit.reason);
    }
}

#[cfg(test)]
mod tests {
    use ddn_core::report::{
        write_json_report, PlatformDescriptor, ProbeReport, PROBE_REPORT_SCHEMA,
    };
    use ddn_core::resolver::ResolveStatus;
    use ddn_core::vector::DeterminismVector;
    use serial_test::serial;
    use tempfile::TempDir;

    use super::*;

    fn darwin_report() -> ProbeReport {
        ProbeReport {
            schema: PROBE_REPORT_SCHEMA.to_string(),
            ok: true,
            platform: PlatformDescriptor {
                system: "darwin".to_string(),
                release: "23.0.0".to_string(),
                version: "Darwin Kernel".to_string(),
                machine: "arm64".to_string(),
                harness_version: "0.1.0".to_string(),
            },
            command: Vec::new(),
            exit_code: 0,
            probe: Some(DeterminismVector::reference()),
            stdout: Vec::new(),
            stderr: Vec::new(),
            reason: None,
            captured_at: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn args(temp: &TempDir) -> ResolveArgs {
        ResolveArgs {
            report_dir: temp.path().join("reports"),
            system: "darwin".to_string(),
            env_var: "DDN_TEST_DARWIN_PROBE_PATH".to_string(),
            candidates: Vec::new(),
            strict_invalid: false,
            require_env: "DDN_TEST_REQUIRE_DARWIN".to_string(),
            out: None,
        }
    }

    #[test]
    #[serial]
    fn test_no_candidates_exits_zero() {
        std::env::remove_var("DDN_TEST_DARWIN_PROBE_PATH");
        std::env::remove_var("DDN_TEST_REQUIRE_DARWIN");
        let temp = TempDir::new().unwrap();
        assert_eq!(run_resolve(&args(&temp)), exit_codes::SUCCESS);
    }

    #[test]
    #[serial]
    fn test_require_env_escalates_missing() {
        std::env::remove_var("DDN_TEST_DARWIN_PROBE_PATH");
        std::env::set_var("DDN_TEST_REQUIRE_DARWIN", "true");
        let temp = TempDir::new().unwrap();
        assert_eq!(run_resolve(&args(&temp)), exit_codes::UNRESOLVED);
        std::env::remove_var("DDN_TEST_REQUIRE_DARWIN");
    }

    #[test]
    #[serial]
    fn test_env_supplied_report_is_staged_and_outcome_written() {
        let temp = TempDir::new().unwrap();
        let handed_back = temp.path().join("handed_back.json");
        write_json_report(&handed_back, &darwin_report()).unwrap();
        std::env::set_var("DDN_TEST_DARWIN_PROBE_PATH", &handed_back);
        std::env::remove_var("DDN_TEST_REQUIRE_DARWIN");

        let mut args = args(&temp);
        let out = temp.path().join("threeway_inputs.json");
        args.out = Some(out.clone());

        assert_eq!(run_resolve(&args), exit_codes::SUCCESS);
        let text = std::fs::read_to_string(&out).unwrap();
        let outcome: ResolverOutcome = serde_json::from_str(&text).unwrap();
        assert_eq!(outcome.status, ResolveStatus::Staged);
        assert!(args
            .report_dir
            .join("fixed64_probe_darwin.json")
            .is_file());
        std::env::remove_var("DDN_TEST_DARWIN_PROBE_PATH");
    }

    #[test]
    #[serial]
    fn test_strict_invalid_escalates_bad_candidate() {
        let temp = TempDir::new().unwrap();
        let junk = temp.path().join("junk.json");
        std::fs::write(&junk, "not json").unwrap();
        std::env::remove_var("DDN_TEST_DARWIN_PROBE_PATH");
        std::env::remove_var("DDN_TEST_REQUIRE_DARWIN");

        let mut args = args(&temp);
        args.candidates.push(junk.clone());
        assert_eq!(run_resolve(&args), exit_codes::SUCCESS);

        args.strict_invalid = true;
        assert_eq!(run_resolve(&args), exit_codes::UNRESOLVED);
    }

    #[test]
    fn test_env_flag_accepts_only_true() {
        std::env::set_var("DDN_TEST_FLAG_PARSE", "TRUE");
        assert!(env_flag("DDN_TEST_FLAG_PARSE"));
        std::env::set_var("DDN_TEST_FLAG_PARSE", "1");
        assert!(!env_flag("DDN_TEST_FLAG_PARSE"));
        std::env::remove_var("DDN_TEST_FLAG_PARSE");
        assert!(!env_flag("DDN_TEST_FLAG_PARSE"));
    }
}
