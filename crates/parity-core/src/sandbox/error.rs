//! Error types for the sandbox module.

use std::path::PathBuf;

/// Errors produced by the sandbox layer.
///
/// A command exceeding its timeout is not an error: it is reported through
/// `ExecutionResult::timed_out`.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("sandbox not started")]
    NotStarted,

    #[error("command wait interrupted; execution cancelled")]
    Cancelled,

    #[error("path escapes the sandbox workspace: {0:?}")]
    PathEscape(PathBuf),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sandbox io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SandboxError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;
