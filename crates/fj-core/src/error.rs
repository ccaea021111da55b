//! Unified error type for ffjob.
//!
//! Every failure a job can end in is one variant of [`Error`]. Configuration
//! problems are reported before any process is spawned; the remaining variants
//! are terminal outcomes of an execution.

use std::time::Duration;

/// Unified error type covering all failure modes of a job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The job (or the configuration file) is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The external tool could not be located.
    #[error("Binary not found: {tool}")]
    BinaryNotFound {
        /// Logical name of the tool (e.g. "ffmpeg").
        tool: String,
    },

    /// The process exited with a non-zero code, or could not be run at all.
    #[error("Execution failed with exit code {exit_code}: {output}")]
    Execution {
        /// Process exit code, `-1` when none is available.
        exit_code: i32,
        /// Captured combined output of the process.
        output: String,
    },

    /// The process did not finish within the configured time and was killed.
    #[error("Process timed out after {secs} seconds")]
    Timeout {
        /// The configured timeout.
        secs: u64,
    },

    /// The job was cancelled and the process was killed.
    #[error("Job cancelled")]
    Cancelled,

    /// Media probing produced output that could not be interpreted.
    #[error("Probe error: {0}")]
    Probe(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Convenience constructor for [`Error::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Convenience constructor for [`Error::BinaryNotFound`].
    pub fn binary_not_found(tool: impl Into<String>) -> Self {
        Error::BinaryNotFound { tool: tool.into() }
    }

    /// Convenience constructor for [`Error::Execution`].
    pub fn execution(exit_code: i32, output: impl Into<String>) -> Self {
        Error::Execution {
            exit_code,
            output: output.into(),
        }
    }

    /// Convenience constructor for [`Error::Timeout`].
    pub fn timeout(duration: Duration) -> Self {
        Error::Timeout {
            secs: duration.as_secs(),
        }
    }

    /// Whether this error was raised before any process was launched.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
