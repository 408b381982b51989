use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the ledger service on non-success responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default = "ApiError::default_status")]
    pub status: String,
    pub message: String,
}

impl ApiError {
    fn default_status() -> String {
        "error".to_string()
    }

    /// Parses an error body, returning `None` when it is not the service's error shape.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}

#[derive(Debug, Error)]
#[error("service responded with status {status}: {message}")]
pub struct ApiException {
    pub status: u16,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
