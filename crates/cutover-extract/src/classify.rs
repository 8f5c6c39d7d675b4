//! Error-marker classification.
//!
//! Tools report failures as prose on the same streams that carry their
//! data. Output is checked against a tool's markers before any positional
//! parsing so an error message is never parsed as data.

use crate::error::{ExtractError, Result};

/// Error tokens for one tool dialect. Connection markers are checked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorMarkers {
    /// Substrings meaning the remote side could not be reached.
    pub connection: &'static [&'static str],
    /// Substrings meaning the remote side reported any other failure.
    pub operation: &'static [&'static str],
}

/// `mongo` shell `--eval` output.
pub const MONGO_SHELL: ErrorMarkers = ErrorMarkers {
    connection: &["SocketException"],
    operation: &["Error"],
};

/// `kubectl` standard error.
pub const KUBECTL: ErrorMarkers = ErrorMarkers {
    connection: &["Unable to connect to the server"],
    operation: &["error:", "Error from server"],
};

/// `oc` standard error.
pub const OPENSHIFT: ErrorMarkers = ErrorMarkers {
    connection: &["Unable to connect to the server"],
    operation: &["Error from server"],
};

/// `dig` standard output.
pub const DIG: ErrorMarkers = ErrorMarkers {
    connection: &["connection timed out", "no servers could be reached"],
    operation: &["couldn't get address"],
};

impl ErrorMarkers {
    /// Fail if `output` contains any marker.
    ///
    /// # Errors
    ///
    /// [`ExtractError::RemoteConnection`] for a connection marker, otherwise
    /// [`ExtractError::RemoteOperation`] for an operation marker.
    pub fn check(&self, output: &str) -> Result<()> {
        if self.connection.iter().any(|m| output.contains(m)) {
            return Err(ExtractError::remote_connection(output));
        }
        if self.operation.iter().any(|m| output.contains(m)) {
            return Err(ExtractError::remote_operation(output));
        }
        Ok(())
    }
}
