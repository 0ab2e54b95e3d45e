//! Approximate nearest-neighbor index for semantic concept lookup
//!
//! Provides an HNSW (Hierarchical Navigable Small World) graph keyed by
//! concept id. The index is a derived cache: it is repopulated from stored
//! embeddings on restart and is never the system of record.

mod hnsw;

pub use hnsw::VectorIndex;
