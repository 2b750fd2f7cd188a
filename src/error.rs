//! Error taxonomy for install, local-run and deployment checks.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed error type returned by the port traits.
pub type PortError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can end a workflow invocation unsuccessfully.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The child process could not be spawned.
    #[error("{target}: failed to start `{program}`: {source}")]
    Start {
        /// Target the process belonged to.
        target: String,
        /// Program that failed to launch.
        program: String,
        /// Underlying spawn failure.
        #[source]
        source: PortError,
    },

    /// The child exited nonzero without being killed by us.
    #[error("{message}")]
    Exit {
        /// Workflow-specific failure message, e.g. `myapp: failed to deploy!`.
        message: String,
        /// Exit code, when the process exited normally.
        code: Option<i32>,
        /// Terminating signal name, when the process was signalled.
        signal: Option<String>,
    },

    /// Every probe attempt hit a transport-level error.
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        /// URL that was probed.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// The last transport error.
        #[source]
        source: PortError,
    },

    /// A response arrived but did not match expectations.
    #[error("{label}: failed verification!\nExpected: {expected}\nActual: {actual}")]
    Verification {
        /// Label of the target under test.
        label: String,
        /// Substring the body was expected to contain.
        expected: String,
        /// Status code actually received.
        status: u16,
        /// Body actually received.
        actual: String,
    },

    /// Dependency installation failed.
    #[error("{target}: failed to install dependencies!")]
    Installation {
        /// Target whose dependencies failed to install.
        target: String,
        /// Exit code of the installer, if any.
        code: Option<i32>,
    },

    /// The deployment log could not be created or written.
    #[error("failed to write deployment log {path}: {source}")]
    LogFile {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Settings are missing or invalid.
    #[error("{0}")]
    Config(String),

    /// The target manifest is missing, malformed, or lacks a target.
    #[error("{0}")]
    Manifest(String),

    /// The async runtime could not be created.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// Every reporter of a workflow went away without finishing it.
    #[error("{target}: workflow ended without reporting an outcome")]
    Abandoned {
        /// Target of the abandoned workflow.
        target: String,
    },
}

impl HarnessError {
    /// Returns `true` for failures that came from the probe step.
    #[must_use]
    pub fn is_probe_failure(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Verification { .. })
    }
}
