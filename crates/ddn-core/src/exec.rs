//! Synchronous command-execution capability.
//!
//! Every external invocation in this crate (the native engine, `uname`,
//! the matrix-check command the gate delegates to) goes through the
//! [`CommandRunner`] trait so components can be exercised in tests without
//! spawning real processes. The production implementation,
//! [`SystemRunner`], runs commands in a hermetic environment with a
//! bounded wait followed by forceful termination.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

/// Default bound on external command completion.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll interval while waiting for a child to exit.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// A fully-specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// How long the command may run before it is killed.
    pub timeout: Duration,
    /// Extra environment entries layered over the hermetic base.
    pub envs: Vec<(String, String)>,
}

impl CommandSpec {
    /// Builds a spec with the default timeout and no extra environment.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            envs: Vec::new(),
        }
    }

    /// Overrides the completion bound.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds an environment entry.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Space-joined rendering for diagnostics.
    #[must_use]
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Captured result of a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code (`-1` when terminated by a signal).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// True when the command exited zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Standard output split into owned lines.
    #[must_use]
    pub fn stdout_lines(&self) -> Vec<String> {
        self.stdout.lines().map(str::to_string).collect()
    }

    /// Standard error split into owned lines.
    #[must_use]
    pub fn stderr_lines(&self) -> Vec<String> {
        self.stderr.lines().map(str::to_string).collect()
    }
}

/// Errors from attempting to run an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The command carried no program name.
    #[error("cannot run an empty command")]
    EmptyCommand,

    /// The program could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// The rendered command line.
        command: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The command did not exit within its bound and was killed.
    #[error("`{command}` did not exit within {timeout_ms}ms and was killed")]
    Timeout {
        /// The rendered command line.
        command: String,
        /// The configured bound, in milliseconds.
        timeout_ms: u128,
    },

    /// An I/O error occurred while driving the command.
    #[error("i/o error while running `{command}`: {source}")]
    Io {
        /// The rendered command line.
        command: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Capability for running external commands to completion.
pub trait CommandRunner {
    /// Runs the command and returns its exit code and captured output.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecError`] when the command cannot be started, does
    /// not exit within its bound, or its output cannot be collected. A
    /// non-zero exit code is not an error at this layer.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError>;
}

/// [`CommandRunner`] backed by `std::process` with a hermetic environment.
///
/// The child environment is cleared down to `PATH` and `LANG` (plus the
/// spec's explicit entries) so engine runs cannot pick up host-specific
/// configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        let Some((program, args)) = spec.argv.split_first() else {
            return Err(ExecError::EmptyCommand);
        };
        let command_line = spec.display();
        debug!(command = %command_line, "running external command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command.env_clear();
        command.env("PATH", std::env::var("PATH").unwrap_or_default());
        command.env("LANG", "C.UTF-8");
        for (key, value) in &spec.envs {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = wait_bounded(&mut child, spec.timeout).map_err(|kind| match kind {
            WaitFailure::Timeout => {
                warn!(command = %command_line, "command timed out, killing");
                ExecError::Timeout {
                    command: command_line.clone(),
                    timeout_ms: spec.timeout.as_millis(),
                }
            },
            WaitFailure::Io(source) => ExecError::Io {
                command: command_line.clone(),
                source,
            },
        })?;

        let stdout = join_reader(stdout_reader, &command_line)?;
        let stderr = join_reader(stderr_reader, &command_line)?;

        Ok(CommandOutput {
            exit_code: status,
            stdout,
            stderr,
        })
    }
}

enum WaitFailure {
    Timeout,
    Io(std::io::Error),
}

/// Polls the child until it exits or the bound elapses; on timeout the
/// child is killed and reaped before the error is reported.
fn wait_bounded(child: &mut Child, timeout: Duration) -> Result<i32, WaitFailure> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code().unwrap_or(-1)),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(WaitFailure::Timeout);
                }
                thread::sleep(WAIT_POLL);
            },
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WaitFailure::Io(source));
            },
        }
    }
}

/// Drains a child pipe on a helper thread so a chatty child cannot block
/// on a full pipe buffer while we wait for it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<std::io::Result<String>> {
    thread::spawn(move || match pipe {
        Some(mut pipe) => {
            let mut buffer = String::new();
            pipe.read_to_string(&mut buffer)?;
            Ok(buffer)
        },
        None => Ok(String::new()),
    })
}

fn join_reader(
    handle: JoinHandle<std::io::Result<String>>,
    command: &str,
) -> Result<String, ExecError> {
    match handle.join() {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(source)) => Err(ExecError::Io {
            command: command.to_string(),
            source,
        }),
        Err(_) => Err(ExecError::Io {
            command: command.to_string(),
            source: std::io::Error::other("output reader thread panicked"),
        }),
    }
}

/// Queue-backed [`CommandRunner`] for tests: pops one scripted result per
/// `run` call and records every spec it saw.
#[cfg(test)]
pub(crate) struct ScriptedRunner {
    responses: std::cell::RefCell<std::collections::VecDeque<Result<CommandOutput, ExecError>>>,
    pub(crate) calls: std::cell::RefCell<Vec<CommandSpec>>,
}

#[cfg(test)]
impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self {
            responses: std::cell::RefCell::new(std::collections::VecDeque::new()),
            calls: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn push_ok(&self, exit_code: i32, stdout: &str, stderr: &str) {
        self.responses.borrow_mut().push_back(Ok(CommandOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }));
    }

    pub(crate) fn push_err(&self, error: ExecError) {
        self.responses.borrow_mut().push_back(Err(error));
    }

    /// Scripts the three `uname` probes platform capture performs.
    pub(crate) fn push_platform_capture(&self) {
        self.push_ok(0, "6.1.0-test\n", "");
        self.push_ok(0, "#1 SMP test\n", "");
        self.push_ok(0, "x86_64\n", "");
    }
}

#[cfg(test)]
impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.borrow_mut().push(spec.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command: {}", spec.display()))
    }
}
