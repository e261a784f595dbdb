//! Error types for ferritel.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for ferritel operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection-level errors (connect, login, loss)
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Expect request errors
    #[error("Expect error: {0}")]
    Expect(#[from] ExpectError),

    /// Session-level errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl Error {
    /// Whether this error reports a lost or failed connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Connection errors (TCP connect, login, transport loss).
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    Failed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Connect attempt timed out
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// Login did not reach the shell prompt in time
    #[error("Login not completed within {0:?}")]
    LoginTimeout(Duration),

    /// The transport went away while the session was in use
    #[error("Connection lost: {reason}")]
    Lost { reason: String },
}

impl ConnectionError {
    pub(crate) fn lost(reason: impl Into<String>) -> Self {
        ConnectionError::Lost {
            reason: reason.into(),
        }
    }
}

/// Expect request errors.
#[derive(Error, Debug)]
pub enum ExpectError {
    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session task has shut down
    #[error("Session closed")]
    Closed,

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias using ferritel's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_display() {
        let err: Error = ConnectionError::lost("peer reset").into();
        assert!(err.is_connection());
        assert_eq!(
            err.to_string(),
            "Connection error: Connection lost: peer reset"
        );
    }

    #[test]
    fn test_invalid_pattern_is_not_connection() {
        let regex_err = regex::Regex::new("(unclosed").unwrap_err();
        let err: Error = ExpectError::from(regex_err).into();
        assert!(!err.is_connection());
        assert!(err.to_string().starts_with("Expect error: Invalid regex pattern"));
    }
}
