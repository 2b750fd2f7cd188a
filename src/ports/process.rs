//! Process launcher port for spawning and observing child processes.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::PortError;

/// Signal the orchestrator uses to force-terminate its own children.
pub const KILL_SIGNAL: &str = "SIGKILL";

/// A readable child output stream.
pub type OutputStream = Pin<Box<dyn AsyncRead + Send>>;

/// Boxed future resolving to a process exit.
pub type ExitFuture<'a> = Pin<Box<dyn Future<Output = std::io::Result<ProcessExit>> + Send + 'a>>;

/// What to run and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub working_dir: PathBuf,
}

impl CommandSpec {
    /// Creates a command spec.
    pub fn new<I, S>(program: impl Into<String>, args: I, working_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: working_dir.into(),
        }
    }
}

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
    /// Exit code, absent when the process died from a signal.
    pub code: Option<i32>,
    /// Name of the terminating signal (e.g. `"SIGKILL"`), if any.
    pub signal: Option<String>,
}

impl ProcessExit {
    /// A normal exit with the given code.
    #[must_use]
    pub fn code(code: i32) -> Self {
        Self { code: Some(code), signal: None }
    }

    /// A death by the named signal.
    pub fn signalled(signal: impl Into<String>) -> Self {
        Self { code: None, signal: Some(signal.into()) }
    }

    /// The exit produced by the orchestrator's own kill.
    #[must_use]
    pub fn killed() -> Self {
        Self::signalled(KILL_SIGNAL)
    }

    /// Returns `true` if the process exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Returns `true` if the process was terminated by [`KILL_SIGNAL`].
    #[must_use]
    pub fn was_killed(&self) -> bool {
        self.signal.as_deref() == Some(KILL_SIGNAL)
    }
}

impl std::fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, &self.signal) {
            (Some(code), Some(signal)) => write!(f, "code {code} ({signal})"),
            (Some(code), None) => write!(f, "code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// A running child process.
pub trait ChildProcess: Send {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Takes the piped stdout stream; `None` on subsequent calls.
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Takes the piped stderr stream; `None` on subsequent calls.
    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Waits for the process to exit. Must be cancel-safe.
    fn wait(&mut self) -> ExitFuture<'_>;

    /// Sends [`KILL_SIGNAL`] and waits for the process to exit.
    fn kill(&mut self) -> ExitFuture<'_>;
}

/// Spawns child processes with piped stdout and stderr.
pub trait ProcessLauncher: Send + Sync {
    /// Starts `command`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned (missing binary,
    /// bad working directory, permissions).
    fn spawn(&self, command: &CommandSpec) -> Result<Box<dyn ChildProcess>, PortError>;
}
