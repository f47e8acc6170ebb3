//! Error types for Docent.

use thiserror::Error;

/// Library-level error type for Docent operations.
#[derive(Error, Debug)]
pub enum DocentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl DocentError {
    /// Whether a caller may reasonably retry the failed operation.
    ///
    /// Only failures of external services qualify. The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DocentError::Upstream(_) | DocentError::Http(_))
    }
}

/// Result type alias for Docent operations.
pub type Result<T> = std::result::Result<T, DocentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = DocentError::DimensionMismatch {
            expected: 256,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Vector dimension mismatch: index expects 256, got 3"
        );
    }

    #[test]
    fn test_only_upstream_is_retryable() {
        assert!(DocentError::Upstream("timeout".to_string()).is_retryable());
        assert!(!DocentError::Validation("bad".to_string()).is_retryable());
        assert!(!DocentError::DimensionMismatch { expected: 2, actual: 3 }.is_retryable());
    }
}
