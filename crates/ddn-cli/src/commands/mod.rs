//! Subcommand implementations.
//!
//! Every module exposes a clap `Args` struct and a `run_*` function
//! returning a `u8` exit code, with the code constants collected in a
//! per-module `exit_codes` module.

pub mod gate;
pub mod matrix;
pub mod probe;
pub mod resolve;
pub mod worker_check;
