//! Protocol error types.

use thiserror::Error;

/// Errors that can occur while exchanging a command with the controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The device did not send enough bytes before the read deadline.
    #[error("timeout: expected {expected} bytes, got {actual}")]
    Timeout {
        /// Number of bytes requested.
        expected: usize,
        /// Number of bytes received before the deadline.
        actual: usize,
    },

    /// A byte arrived but it was not the one expected at this step, or a
    /// field decoded to a value outside its valid band.
    #[error("unexpected response during {step}: {detail}")]
    UnexpectedResponse {
        /// Protocol step that failed.
        step: &'static str,
        /// What was received.
        detail: String,
    },

    /// The device answered with its ERROR code.
    #[error("device reported an error during {step}")]
    ErrorResponse {
        /// Protocol step that failed.
        step: &'static str,
    },

    /// The caller supplied a value that cannot be encoded.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The transport failed for a reason other than a timeout.
    #[error("transport I/O error: {0}")]
    Io(String),
}

impl ProtocolError {
    /// Whether the command may be attempted again.
    ///
    /// Device communication failures are recoverable; a malformed value will
    /// fail the same way on every attempt.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ProtocolError::MalformedInput(_))
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_malformed_input_is_fatal() {
        assert!(ProtocolError::Timeout { expected: 1, actual: 0 }.is_recoverable());
        assert!(ProtocolError::ErrorResponse { step: "handshake" }.is_recoverable());
        assert!(ProtocolError::UnexpectedResponse {
            step: "handshake",
            detail: "0x05".to_string()
        }
        .is_recoverable());
        assert!(ProtocolError::Io("broken pipe".to_string()).is_recoverable());
        assert!(!ProtocolError::MalformedInput("too big".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = ProtocolError::Timeout { expected: 2, actual: 1 };
        assert_eq!(err.to_string(), "timeout: expected 2 bytes, got 1");

        let err = ProtocolError::ErrorResponse { step: "payload" };
        assert_eq!(err.to_string(), "device reported an error during payload");
    }
}
