//! ddn - cross-host determinism net for the lesson engine.
//!
//! CLI surface over the `ddn-core` pipeline: local probes, cross-platform
//! matrix checks, the three-way consensus gate, external-input staging,
//! and worker equivalence checks. The process exit code is the sole
//! machine-readable success signal of every subcommand.

#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use ddn_core::exec::SystemRunner;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

/// ddn - cross-host determinism net
#[derive(Parser, Debug)]
#[command(name = "ddn")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the local determinism probe against the native engine
    Probe(commands::probe::ProbeArgs),

    /// Compare probe reports for exact cross-platform agreement
    MatrixCheck(commands::matrix::MatrixCheckArgs),

    /// Combine windows/linux/darwin probes into a tri-state verdict
    ThreewayGate(commands::gate::GateArgs),

    /// Locate and stage an externally-produced probe report
    ResolveInputs(commands::resolve::ResolveArgs),

    /// Assert worker output equivalence against a one-shot run
    WorkerCheck(commands::worker_check::WorkerCheckArgs),
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let runner = SystemRunner::new();
    tracing::debug!(command = ?cli.command, "dispatching");

    // Each subcommand owns its exact exit-code contract; bypass any
    // implicit error handling so the codes reach CI unchanged.
    let exit_code = match cli.command {
        Commands::Probe(args) => commands::probe::run_probe(&args, &runner),
        Commands::MatrixCheck(args) => commands::matrix::run_matrix_check(&args),
        Commands::ThreewayGate(args) => commands::gate::run_gate(&args, &runner),
        Commands::ResolveInputs(args) => commands::resolve::run_resolve(&args),
        Commands::WorkerCheck(args) => commands::worker_check::run_worker_check(&args, &runner),
    };
    std::process::exit(i32::from(exit_code));
}
