//! Backing store error types

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors talking to the backing store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Request never got an answer (connection refused, timeout, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-success status
    #[error("HTTP {0}: {1}")]
    Http(u16, String),

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    Parse(String),

    /// Table, row, column or sheet does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend rejected the request as invalid
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Store configuration is unusable
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Check if retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Network(_) => true,
            StoreError::Http(status, _) => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StoreError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            StoreError::Http(status.as_u16(), e.to_string())
        } else {
            StoreError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient() {
        assert!(StoreError::Network("refused".into()).is_transient());
        assert!(StoreError::Http(503, String::new()).is_transient());
        assert!(!StoreError::Http(404, String::new()).is_transient());
        assert!(!StoreError::NotFound("t".into()).is_transient());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::Http(500, "boom".into()).to_string(),
            "HTTP 500: boom"
        );
    }
}
