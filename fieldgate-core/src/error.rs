//! Error types for fieldgate API operations

use thiserror::Error;

/// Errors surfaced by any backend round-trip.
///
/// `Clone` so a single failed load can be handed to every coalesced caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, when the server answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for backend operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ApiError::status(503, "maintenance");
        assert_eq!(err.to_string(), "HTTP 503: maintenance");
        assert_eq!(err.http_status(), Some(503));
    }

    #[test]
    fn test_transport_has_no_status() {
        let err = ApiError::Transport("connection refused".into());
        assert_eq!(err.http_status(), None);
    }
}
