//! Error types for the Cognigraph engine
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Machine-readable error codes
//! - Structured conversion from collaborator failures

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Configuration errors (1xxx)
    ConfigurationError,
    DimensionMismatch,

    // Validation errors (2xxx)
    ValidationError,
    InvalidFormat,

    // Resource errors (3xxx)
    ConceptNotFound,
    AssociationNotFound,

    // Storage errors (4xxx)
    StorageError,
    ConnectionError,
    RetriesExhausted,

    // Collaborator errors (5xxx)
    EmbeddingError,
    ExtractionError,

    // Internal errors (9xxx)
    InternalError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Configuration (1xxx)
            ErrorCode::ConfigurationError => 1001,
            ErrorCode::DimensionMismatch => 1002,

            // Validation (2xxx)
            ErrorCode::ValidationError => 2001,
            ErrorCode::InvalidFormat => 2002,

            // Resources (3xxx)
            ErrorCode::ConceptNotFound => 3001,
            ErrorCode::AssociationNotFound => 3002,

            // Storage (4xxx)
            ErrorCode::StorageError => 4001,
            ErrorCode::ConnectionError => 4002,
            ErrorCode::RetriesExhausted => 4003,

            // Collaborators (5xxx)
            ErrorCode::EmbeddingError => 5001,
            ErrorCode::ExtractionError => 5002,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::SerializationError => 9002,
        }
    }
}

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    // Configuration errors: fail fast at construction, never recovered
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Embedding dimension mismatch: index built for {expected}, analyzer produces {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Resource errors
    #[error("Concept not found: {id}")]
    ConceptNotFound { id: String },

    #[error("Association not found: {source_id} -> {target_id}")]
    AssociationNotFound { source_id: String, target_id: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Storage connection error: {message}")]
    Connection { message: String },

    #[error("Storage call failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    // Collaborator errors
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    #[error("Extraction error: {message}")]
    Extraction { message: String },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl EngineError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Configuration { .. } => ErrorCode::ConfigurationError,
            EngineError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            EngineError::Validation { .. } => ErrorCode::ValidationError,
            EngineError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            EngineError::ConceptNotFound { .. } => ErrorCode::ConceptNotFound,
            EngineError::AssociationNotFound { .. } => ErrorCode::AssociationNotFound,
            EngineError::Storage { .. } => ErrorCode::StorageError,
            EngineError::Connection { .. } => ErrorCode::ConnectionError,
            EngineError::RetriesExhausted { .. } => ErrorCode::RetriesExhausted,
            EngineError::Embedding { .. } => ErrorCode::EmbeddingError,
            EngineError::Extraction { .. } => ErrorCode::ExtractionError,
            EngineError::Internal { .. } => ErrorCode::InternalError,
            EngineError::Serialization(_) => ErrorCode::SerializationError,
            EngineError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the adapter boundary may retry the originating call
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Storage { .. } | EngineError::Connection { .. }
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Storage {
            message: err.to_string(),
        }
    }
}
