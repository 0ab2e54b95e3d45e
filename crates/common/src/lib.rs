//! Cognigraph Common Library
//!
//! Shared code for the Cognigraph engine including:
//! - Knowledge-graph data model and persisted format
//! - Storage backend contract and bindings
//! - Text-analysis contract and embedded binding
//! - Error types and handling
//! - Configuration management

pub mod config;
pub mod errors;
pub mod model;
pub mod storage;
pub mod text;

// Re-export commonly used types
pub use config::EngineConfig;
pub use errors::{EngineError, Result};
pub use model::{Association, AssociationType, Concept, ConceptId, ReasoningPath, ReasoningStep};
pub use storage::{MemoryStore, RetryingStore, StorageBackend};
pub use text::{HashingAnalyzer, TextAnalyzer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding dimension for the embedded analyzer
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 256;
