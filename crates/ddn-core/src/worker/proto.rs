//! Worker wire types.
//!
//! Messages are JSON-RPC-shaped: requests carry `{jsonrpc, id, method,
//! params}`, responses carry `{jsonrpc, id, result}` or `{jsonrpc, id,
//! error}`. Errors always travel as an `error` member; a worker must never
//! tear down the connection because a method got invalid parameters.

use serde::{Deserialize, Serialize};

/// Protocol version carried on every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Clears worker state; accepts no parameters.
pub const METHOD_RESET: &str = "reset";

/// Executes a program file; parameters are [`RunFileParams`].
pub const METHOD_RUN_FILE: &str = "run_file";

/// One request on the worker wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerRequest {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,
    /// Correlation id; answered exactly once.
    pub id: u64,
    /// Method name.
    pub method: String,
    /// Method parameters, when the method takes any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// One response on the worker wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerResponse {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,
    /// Echoes the request id.
    pub id: u64,
    /// Successful result, mutually exclusive with `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure description, mutually exclusive with `result`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// A JSON-RPC-style error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Parameters of [`METHOD_RUN_FILE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFileParams {
    /// Program source path.
    pub path: String,
    /// Arguments handed to the program.
    pub args: Vec<String>,
    /// Execution mode, passed through to the engine verbatim.
    pub mode: String,
}

/// Result of [`METHOD_RUN_FILE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunFileResult {
    /// Whether the program ran to completion.
    pub ok: bool,
    /// The program's standard output lines.
    pub stdout: Vec<String>,
    /// The program's standard error lines.
    pub stderr: Vec<String>,
}
