//! CLI error types.

use cutover_connect::ConnectError;
use cutover_exec::ExecError;
use cutover_extract::ExtractError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Tool lookup, start or timeout failure.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Tool output could not be turned into a record.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Tunnel or polling failure.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid settings file.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid command-line value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Returns `true` when the error concerns a single batch item and the
    /// batch should record it and continue.
    #[must_use]
    pub fn is_per_item(&self) -> bool {
        match self {
            Self::Exec(e) => e.is_per_item(),
            Self::Extract(_) => true,
            Self::Connect(e) => e.is_per_item(),
            Self::Config(_) | Self::InvalidArgument(_) | Self::Format(_) | Self::Io(_) => false,
        }
    }
}
