//! Worker execution protocol and equivalence checking.
//!
//! The engine can run as a persistent worker serving framed JSON-RPC-style
//! requests over stdin/stdout. This module owns the client side of that
//! protocol and the harness that proves a worker is observably equivalent,
//! output-for-output, to invoking the engine fresh:
//!
//! - [`frame`]: `Content-Length`-delimited frames with a size bound
//! - [`proto`]: request/response/error wire types and method constants
//! - [`client`]: lock-step request/response correlation
//! - [`session`]: worker process ownership with bounded-grace shutdown
//! - [`equivalence`]: output normalization and the one-shot-vs-worker
//!   comparison
//!
//! The protocol is strictly half-duplex: the harness never issues a second
//! request before the first response arrives, and every request id is
//! answered exactly once.

pub mod client;
pub mod equivalence;
pub mod frame;
pub mod proto;
pub mod session;

pub use client::{WorkerClient, WorkerError};
pub use equivalence::{
    run_equivalence_check, strip_hash_lines, EquivalenceConfig, EquivalenceError,
    EquivalenceReport, DEFAULT_RUN_MODE, HASH_LINE_PREFIXES,
};
pub use frame::{read_frame, write_frame, FrameError, MAX_FRAME_SIZE};
pub use proto::{
    RpcError, RunFileParams, RunFileResult, WorkerRequest, WorkerResponse, JSONRPC_VERSION,
    METHOD_RESET, METHOD_RUN_FILE,
};
pub use session::{ShutdownOutcome, SessionError, WorkerSession, WORKER_SUBCOMMAND};
