//! Core library for the cross-host determinism net.
//!
//! The lesson engine grades and replays lessons by hashing per-tick
//! simulation state, which only works if every host produces bit-identical
//! results. This crate supplies the pieces that prove (and police) that
//! property:
//!
//! - **Numeric contract**: saturating Q32.32 fixed-point arithmetic
//!   ([`fixed`]) and a seedable, stateless-by-construction generator
//!   ([`rng`]) so no IEEE-754 or libm divergence can creep in
//! - **Probes**: run the engine's canonical determinism vector on the local
//!   host and persist the result as a write-once report ([`probe`],
//!   [`vector`], [`report`])
//! - **Consensus**: compare reports across hosts ([`matrix`]), stage
//!   reports produced out-of-band ([`resolver`]), and combine the mandatory
//!   pair plus the optional darwin host into a tri-state verdict ([`gate`])
//! - **Worker equivalence**: drive a persistent engine worker over a framed
//!   request/response protocol and assert its output matches a one-shot
//!   invocation ([`worker`])
//!
//! External commands are reached exclusively through the [`exec`]
//! capability trait so every component can be exercised without spawning
//! real processes.

#![forbid(unsafe_code)]

pub mod digest;
pub mod exec;
pub mod fixed;
pub mod gate;
pub mod matrix;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod rng;
pub mod vector;
pub mod worker;
