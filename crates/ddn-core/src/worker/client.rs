//! Lock-step worker client.
//!
//! Sends one request, reads exactly one response, and insists the ids
//! match before the next request may be issued. The protocol is never
//! pipelined.

use std::io::{BufRead, Write};

use thiserror::Error;
use tracing::debug;

use super::frame::{read_frame, write_frame, FrameError};
use super::proto::{
    RpcError, RunFileParams, RunFileResult, WorkerRequest, WorkerResponse, JSONRPC_VERSION,
    METHOD_RESET, METHOD_RUN_FILE,
};

/// Errors on the request/response layer.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A framing-layer failure.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A frame body that was not a valid protocol message.
    #[error("worker message could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),

    /// The response id did not match the outstanding request.
    #[error("worker answered id {got} to request id {expected}")]
    IdMismatch {
        /// The id of the outstanding request.
        expected: u64,
        /// The id the worker answered with.
        got: u64,
    },

    /// The worker returned an `error` member.
    #[error("worker error {code}: {message}")]
    Rpc {
        /// Numeric error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// The response carried neither `result` nor `error`.
    #[error("worker response to {method:?} carried neither result nor error")]
    EmptyResponse {
        /// The method that was invoked.
        method: String,
    },

    /// The `result` member did not match the method's result shape.
    #[error("malformed {method} result: {source}")]
    ResultShape {
        /// The method that was invoked.
        method: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The worker accepted a `reset` that carried parameters.
    #[error("worker accepted a reset carrying parameters; expected an error response")]
    ResetContractViolated,
}

impl From<RpcError> for WorkerError {
    fn from(err: RpcError) -> Self {
        Self::Rpc {
            code: err.code,
            message: err.message,
        }
    }
}

/// A half-duplex client over arbitrary byte streams.
#[derive(Debug)]
pub struct WorkerClient<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
}

impl<R: BufRead, W: Write> WorkerClient<R, W> {
    /// Wraps a reader/writer pair. Ids start at 1 and increase by one per
    /// request.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
        }
    }

    /// Sends one request and reads its response, enforcing id
    /// correlation.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] on framing, decoding, or correlation
    /// failures. An `error` member in the response is *not* an error at
    /// this layer; callers decide what an error response means.
    pub fn call(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<WorkerResponse, WorkerError> {
        let id = self.next_id;
        self.next_id += 1;
        let request = WorkerRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        };
        let body = serde_json::to_vec(&request).map_err(WorkerError::Decode)?;
        debug!(method, id, "sending worker request");
        write_frame(&mut self.writer, &body)?;

        let frame = read_frame(&mut self.reader)?;
        let response: WorkerResponse =
            serde_json::from_slice(&frame).map_err(WorkerError::Decode)?;
        if response.id != id {
            return Err(WorkerError::IdMismatch {
                expected: id,
                got: response.id,
            });
        }
        Ok(response)
    }

    /// `reset` with no parameters; the worker must answer with a result.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Rpc`] when the worker rejects the reset.
    pub fn reset(&mut self) -> Result<(), WorkerError> {
        let response = self.call(METHOD_RESET, None)?;
        if let Some(error) = response.error {
            return Err(error.into());
        }
        if response.result.is_none() {
            return Err(WorkerError::EmptyResponse {
                method: METHOD_RESET.to_string(),
            });
        }
        Ok(())
    }

    /// Negative probe: `reset` with parameters must produce an `error`
    /// member, never a crash or a success.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::ResetContractViolated`] when the worker
    /// accepted the parameters.
    pub fn reset_expecting_rejection(
        &mut self,
        params: serde_json::Value,
    ) -> Result<RpcError, WorkerError> {
        let response = self.call(METHOD_RESET, Some(params))?;
        response.error.ok_or(WorkerError::ResetContractViolated)
    }

    /// `run_file` with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Rpc`] when the worker answers with an error
    /// member, and shape errors when the result cannot be decoded.
    pub fn run_file(&mut self, params: &RunFileParams) -> Result<RunFileResult, WorkerError> {
        let value = serde_json::to_value(params).map_err(WorkerError::Decode)?;
        let response = self.call(METHOD_RUN_FILE, Some(value))?;
        if let Some(error) = response.error {
            return Err(error.into());
        }
        let result = response.result.ok_or_else(|| WorkerError::EmptyResponse {
            method: METHOD_RUN_FILE.to_string(),
        })?;
        serde_json::from_value(result).map_err(|source| WorkerError::ResultShape {
            method: METHOD_RUN_FILE.to_string(),
            source,
        })
    }
}
