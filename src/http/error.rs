//! Error types for the HTTP layer.

use std::io;
use thiserror::Error;

/// Errors that can occur while serving or issuing HTTP requests.
#[derive(Debug, Error)]
pub enum HttpError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed HTTP message.
    #[error("parse error: {0}")]
    Parse(String),

    /// Request exceeded the configured size limit.
    #[error("request too large: {size} bytes (max: {max})")]
    RequestTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// The peer closed the connection before a full message arrived.
    #[error("connection closed")]
    ConnectionClosed,

    /// Read or write deadline expired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A backend could not be reached or did not answer usefully.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

/// Result type for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

impl From<httparse::Error> for HttpError {
    fn from(err: httparse::Error) -> Self {
        HttpError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HttpError::Unreachable("connection refused".to_string());
        assert_eq!(err.to_string(), "backend unreachable: connection refused");

        let err = HttpError::RequestTooLarge {
            size: 100_000,
            max: 65_536,
        };
        assert!(err.to_string().contains("100000"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = HttpError::from(io_err);
        assert!(matches!(err, HttpError::Io(_)));
    }

    #[test]
    fn test_error_from_httparse() {
        let err = HttpError::from(httparse::Error::HeaderName);
        assert!(matches!(err, HttpError::Parse(_)));
    }
}
