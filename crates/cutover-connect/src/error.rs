//! Error types for tunnels and connectivity polling.

use cutover_exec::ExecError;
use thiserror::Error;

/// Result type alias for connectivity operations.
pub type Result<T> = std::result::Result<T, ConnectError>;

/// Errors from opening tunnels and waiting for them.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The probe never reported ready within the attempt budget.
    #[error("target not ready after {attempts} attempts")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },

    /// The tunnel process did not stay up after starting.
    #[error("tunnel '{command}' is not running after {attempts} checks")]
    TunnelExited {
        /// Tunnel command line.
        command: String,
        /// Liveness checks made.
        attempts: u32,
    },

    /// The tunnel process could not be started.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl ConnectError {
    /// Creates an `Exhausted` error.
    #[must_use]
    pub const fn exhausted(attempts: u32) -> Self {
        Self::Exhausted { attempts }
    }

    /// Creates a `TunnelExited` error.
    #[must_use]
    pub fn tunnel_exited(command: impl Into<String>, attempts: u32) -> Self {
        Self::TunnelExited {
            command: command.into(),
            attempts,
        }
    }

    /// Returns `true` if the failure concerns one target and a batch can
    /// continue with the next.
    #[must_use]
    pub fn is_per_item(&self) -> bool {
        match self {
            Self::Exhausted { .. } | Self::TunnelExited { .. } => true,
            Self::Exec(e) => e.is_per_item(),
        }
    }
}
