//! Worker-specific error types.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::SettingsError;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur while supervising or talking to the worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The supervisor has no live worker process.
    #[error("worker process is not running")]
    WorkerNotRunning,

    /// The worker rejected the input with 415 Unsupported Media Type.
    #[error("worker does not support this input format")]
    UnsupportedFormat,

    /// The request did not complete within the time envelope.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The HTTP exchange failed below the application level.
    #[error("transport error: {0}")]
    Transport(String),

    /// No free port between the preferred port and the ceiling.
    #[error("no free port in range {start}..={end}")]
    PortExhausted {
        /// First port probed.
        start: u16,
        /// Last port allowed.
        end: u16,
    },

    /// Worker settings could not be resolved (e.g. an unset `${VAR}`).
    #[error("invalid worker settings: {0}")]
    Config(#[from] SettingsError),

    /// Failed to spawn the worker process.
    #[error("failed to spawn worker process: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Worker process exited before it became ready.
    #[error("worker process exited during startup ({status})")]
    WorkerExited {
        /// Exit status as reported by the OS.
        status: String,
    },

    /// Worker did not answer the readiness probe before the ceiling.
    #[error("worker not ready after {0:?}")]
    StartupTimeout(Duration),

    /// Response body could not be decoded into key/value rows.
    #[error("failed to decode worker response: {0}")]
    Decode(String),

    /// Worker answered with a status other than success or 415.
    #[error("worker returned unexpected status {0}")]
    UnexpectedStatus(u16),

    /// Input file does not exist.
    #[error("input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The worker artifact could not be located.
    #[error("worker artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Local I/O failure (reading input, extracting the artifact).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WorkerError {
    /// Create a transport error from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    /// Check if this error means the worker could not be brought up.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed(_)
                | Self::Config(_)
                | Self::WorkerExited { .. }
                | Self::StartupTimeout(_)
                | Self::PortExhausted { .. }
                | Self::ArtifactNotFound(_)
        )
    }

    /// Check if this error indicates there is no usable worker.
    pub fn is_worker_unavailable(&self) -> bool {
        matches!(self, Self::WorkerNotRunning) || self.is_launch_failure()
    }
}

impl From<csv::Error> for WorkerError {
    fn from(err: csv::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
