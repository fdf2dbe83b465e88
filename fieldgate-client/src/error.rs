//! Error types for the REST client.

use fieldgate_core::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Config error: {0}")]
    Config(String),
}

impl From<RestError> for ApiError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http(e) if e.is_decode() => ApiError::InvalidResponse(e.to_string()),
            RestError::Http(e) => ApiError::Transport(e.to_string()),
            RestError::Serde(e) => ApiError::InvalidResponse(e.to_string()),
            RestError::Status { status, message } => ApiError::Status { status, message },
            RestError::Config(msg) => ApiError::Config(msg),
        }
    }
}
