//! Error types for Docent.
//!
//! This module defines a unified error enum that covers every error category
//! in the workspace: configuration, I/O, embedding, index lifecycle and
//! persistence.

use thiserror::Error;

/// Unified error type for Docent.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Errors are represented and propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Retrieval and index errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Embedding provider errors raised while embedding text
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Chunking produced no chunks
    #[error("Document produced no chunks")]
    EmptyDocument,

    /// A query arrived before any successful build or load
    #[error("Index not ready: build or load an index first")]
    NotReady,

    /// Reading or writing the persisted index failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The requested similarity backend cannot be constructed here
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let err: AppError = serde_yaml::from_str::<Vec<u32>>("{not: a list")
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Serialization(_)));
    }

    #[test]
    fn test_lifecycle_messages() {
        assert_eq!(
            AppError::EmptyDocument.to_string(),
            "Document produced no chunks"
        );
        assert!(AppError::NotReady.to_string().contains("not ready"));
    }
}
