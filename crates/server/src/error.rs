//! Error replies written back to the host.

use serde::Serialize;

use pwa_relay_core::Error;

/// Errors from the bridge itself, before an event reaches the worker.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The line is not a valid `{"id": .., "event": ..}` envelope.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

/// `{"code": "...", "message": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
    pub code: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorReply {
    fn from(err: &Error) -> Self {
        Self { code: err.code(), message: err.to_string() }
    }
}

impl From<&BridgeError> for ErrorReply {
    fn from(err: &BridgeError) -> Self {
        let code = match err {
            BridgeError::InvalidInput(_) => "INVALID_INPUT",
        };
        Self { code, message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_carries_code() {
        let reply = ErrorReply::from(&Error::Network("connection refused".into()));
        assert_eq!(reply.code, "NETWORK_ERROR");
        assert!(reply.message.contains("connection refused"));

        let reply = ErrorReply::from(&BridgeError::InvalidInput("missing id".into()));
        assert_eq!(reply.code, "INVALID_INPUT");
        assert_eq!(reply.message, "INVALID_INPUT: missing id");
    }
}
