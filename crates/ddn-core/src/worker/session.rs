//! Worker process ownership.
//!
//! The harness owns the worker's lifetime for the duration of one
//! equivalence check: spawn with piped stdio, drive the protocol, then
//! terminate with a bounded graceful wait followed by a kill. The kill
//! also runs from `Drop` so an exceptional exit cannot orphan the worker.

use std::io::BufReader;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use super::client::WorkerClient;

/// Subcommand that puts the engine into worker mode.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// Default bound on graceful worker shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Poll interval while waiting for the worker to exit.
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// Errors spawning a worker.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No program was given.
    #[error("cannot spawn a worker from an empty command")]
    EmptyCommand,

    /// The worker process could not be started.
    #[error("failed to spawn worker `{command}`: {source}")]
    Spawn {
        /// The rendered command line.
        command: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The worker's stdio pipes could not be captured.
    #[error("worker stdio could not be captured")]
    MissingStdio,
}

/// How a worker session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// The worker exited on its own within the grace period.
    Exited {
        /// Its exit code, when one was reported.
        code: Option<i32>,
    },
    /// The worker had to be killed.
    Killed,
}

/// A live worker process plus its protocol client.
#[derive(Debug)]
pub struct WorkerSession {
    child: Child,
    client: Option<WorkerClient<BufReader<ChildStdout>, ChildStdin>>,
}

impl WorkerSession {
    /// Spawns the worker process with piped stdin/stdout. The caller
    /// supplies the complete argv, worker subcommand included.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the process cannot be started or its
    /// pipes cannot be captured.
    pub fn spawn(argv: &[String]) -> Result<Self, SessionError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(SessionError::EmptyCommand);
        };
        let command_line = argv.join(" ");
        debug!(command = %command_line, "spawning worker");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SessionError::Spawn {
                command: command_line,
                source,
            })?;

        let stdin = child.stdin.take().ok_or(SessionError::MissingStdio)?;
        let stdout = child.stdout.take().ok_or(SessionError::MissingStdio)?;
        Ok(Self {
            child,
            client: Some(WorkerClient::new(BufReader::new(stdout), stdin)),
        })
    }

    /// The protocol client for this session.
    pub fn client(
        &mut self,
    ) -> &mut WorkerClient<BufReader<ChildStdout>, ChildStdin> {
        self.client
            .as_mut()
            .expect("worker client present until shutdown")
    }

    /// Terminates the worker: closes its stdin, waits up to `grace` for a
    /// voluntary exit, then kills it.
    pub fn shutdown(mut self, grace: Duration) -> ShutdownOutcome {
        // Dropping the client closes stdin; a well-behaved worker exits on
        // EOF.
        self.client = None;
        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(code = ?status.code(), "worker exited within grace");
                    return ShutdownOutcome::Exited {
                        code: status.code(),
                    };
                },
                Ok(None) => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    thread::sleep(SHUTDOWN_POLL);
                },
                Err(_) => break,
            }
        }
        warn!("worker did not exit within grace period, killing");
        let _ = self.child.kill();
        let _ = self.child.wait();
        ShutdownOutcome::Killed
    }
}

impl Drop for WorkerSession {
    fn drop(&mut self) {
        // Backstop for exceptional exits; harmless after a normal
        // shutdown because the child is already reaped.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
