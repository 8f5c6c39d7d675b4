//! Error types for output extraction.

use thiserror::Error;

/// Result type alias for extraction.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Ways tool output can fail to become a typed record.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The output carries a connectivity-class error token.
    #[error("remote connection error: {output}")]
    RemoteConnection {
        /// The offending output, trimmed.
        output: String,
    },

    /// The output carries a generic error token.
    #[error("remote operation error: {output}")]
    RemoteOperation {
        /// The offending output, trimmed.
        output: String,
    },

    /// Expected content is absent or malformed.
    #[error("could not extract {what}: {detail}")]
    Extraction {
        /// What was being extracted.
        what: String,
        /// What was found instead.
        detail: String,
    },

    /// The output is not valid JSON for the expected shape.
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),

    /// A secret value is not valid base64.
    #[error("secret key '{key}' is not valid base64: {reason}")]
    Decode {
        /// Secret key whose value failed to decode.
        key: String,
        /// Decoder message.
        reason: String,
    },
}

impl ExtractError {
    /// Creates a `RemoteConnection` error.
    #[must_use]
    pub fn remote_connection(output: impl AsRef<str>) -> Self {
        Self::RemoteConnection {
            output: output.as_ref().trim().to_string(),
        }
    }

    /// Creates a `RemoteOperation` error.
    #[must_use]
    pub fn remote_operation(output: impl AsRef<str>) -> Self {
        Self::RemoteOperation {
            output: output.as_ref().trim().to_string(),
        }
    }

    /// Creates an `Extraction` error.
    #[must_use]
    pub fn extraction(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Extraction {
            what: what.into(),
            detail: detail.into(),
        }
    }

    /// Creates a `Decode` error.
    #[must_use]
    pub fn decode(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if the remote side reported a failure (as opposed to
    /// the output being unparseable).
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RemoteConnection { .. } | Self::RemoteOperation { .. }
        )
    }

    /// Returns `true` if retrying once connectivity is restored may help.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RemoteConnection { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_errors_trim_output() {
        let err = ExtractError::remote_connection("  SocketException: refused\n");
        assert_eq!(err.to_string(), "remote connection error: SocketException: refused");
        assert!(err.is_remote());
        assert!(err.is_recoverable());

        let err = ExtractError::remote_operation("Error: auth failed\n");
        assert!(err.is_remote());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_extraction_display() {
        let err = ExtractError::extraction("integer", "'abc'");
        assert_eq!(err.to_string(), "could not extract integer: 'abc'");
        assert!(!err.is_remote());
    }

    #[test]
    fn test_json_from() {
        let json_err = serde_json::from_str::<Vec<String>>("nope").expect_err("invalid json");
        let err: ExtractError = json_err.into();
        assert!(matches!(err, ExtractError::Json(_)));
    }
}
