//! Error types for child process execution.
//!
//! The taxonomy separates "could not run the tool" (lookup, capability
//! probe, spawn) from "the tool ran and reported failure", which is not an
//! error at this layer: a non-zero exit code is returned inside a
//! [`ProcessResult`](crate::ProcessResult).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for execution operations.
pub type Result<T> = std::result::Result<T, ExecError>;

/// Errors that can occur while locating, starting or supervising a tool.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The tool could not be found at the supplied path or on the search path.
    #[error("'{tool}' not found! Add '{tool}' to your PATH or specify the file using {option} option")]
    ToolNotFound {
        /// Logical tool name.
        tool: String,
        /// Command-line option that supplies an explicit path.
        option: String,
    },

    /// The tool was found but failed its capability probe.
    #[error("'{tool}' at {} does not support a required feature: {reason}", path.display())]
    ToolUnsupported {
        /// Logical tool name.
        tool: String,
        /// Resolved executable path.
        path: PathBuf,
        /// What the probe was checking.
        reason: String,
    },

    /// The operating system refused to start the process.
    #[error("failed to start {}: {source}", program.display())]
    StartFailure {
        /// Executable that could not be started.
        program: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded its hard ceiling and was terminated.
    #[error("{command} did not complete within {timeout_ms} ms and was terminated")]
    Timeout {
        /// Command line description.
        command: String,
        /// Ceiling in milliseconds.
        timeout_ms: u64,
    },

    /// An argument contains a character that cannot be passed to a child.
    #[error("invalid argument {argument:?}: {reason}")]
    InvalidArgument {
        /// The offending argument.
        argument: String,
        /// Why it was rejected.
        reason: String,
    },

    /// IO error while supervising a running process.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Creates a `ToolNotFound` error.
    #[must_use]
    pub fn tool_not_found(tool: impl Into<String>, option: impl Into<String>) -> Self {
        Self::ToolNotFound {
            tool: tool.into(),
            option: option.into(),
        }
    }

    /// Creates a `ToolUnsupported` error.
    #[must_use]
    pub fn tool_unsupported(
        tool: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ToolUnsupported {
            tool: tool.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `StartFailure` error.
    #[must_use]
    pub fn start_failure(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StartFailure {
            program: program.into(),
            source,
        }
    }

    /// Creates a `Timeout` error.
    #[must_use]
    pub fn timeout(command: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            command: command.into(),
            timeout_ms,
        }
    }

    /// Creates an `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for failures that must abort a workflow before any
    /// batch work starts (missing or unsupported tools).
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::ToolNotFound { .. } | Self::ToolUnsupported { .. })
    }

    /// Returns `true` if the caller can recover by supplying a different
    /// tool path or upgrading the tool.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ToolNotFound { .. } | Self::ToolUnsupported { .. })
    }

    /// Returns `true` if this error is confined to one operation; a batch
    /// records it against the item and moves on.
    #[must_use]
    pub fn is_per_item(&self) -> bool {
        matches!(
            self,
            Self::StartFailure { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}
