//! Error types for tournament persistence.

use thiserror::Error;

/// Errors returned by a `TournamentStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Tournament not found
    #[error("Tournament not found: {0}")]
    NotFound(String),

    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fixture or payload could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound("t-1".to_string());
        assert_eq!(err.to_string(), "Tournament not found: t-1");

        let err = StoreError::Storage("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));

        let err: StoreError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
