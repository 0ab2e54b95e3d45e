//! In-memory knowledge graph
//!
//! Provides the mutable working set of concepts and associations plus the
//! derived lookup indices (neighbors, words). The indices are rebuildable
//! caches, never the system of record.

mod knowledge;

pub use knowledge::{GraphStats, KnowledgeGraph, PruneReport};
