//! Cognigraph reasoning engine
//!
//! Graph-based knowledge reasoning: concepts and typed associations are
//! learned from text, connected through pattern and co-occurrence
//! extraction, and queried by multi-strategy path search with consensus
//! aggregation over the discovered paths.
//!
//! Provides:
//! - `graph`: the in-memory knowledge graph and its derived indices
//! - `index`: HNSW vector index for semantic concept lookup
//! - `extraction`: sequential, parallel, and adaptive extraction
//! - `reasoning`: path finding, consensus aggregation, query processing
//! - `cache`: LRU/TTL query cache with selective invalidation
//! - `contradiction`: conflict detection and resolution
//! - `engine`: the async façade tying everything together

pub mod cache;
pub mod contradiction;
pub mod engine;
pub mod extraction;
pub mod graph;
pub mod index;
pub mod reasoning;

pub use cache::{CacheStats, QueryCache};
pub use contradiction::{
    Contradiction, ContradictionKind, ContradictionResolver, ResolutionBasis,
    ResolvedContradiction,
};
pub use engine::{
    BatchLearnReport, ConceptHit, EngineStats, LearnOutcome, ReasoningEngine, StreamChunk,
    StreamStage,
};
pub use extraction::{
    AdaptiveLearner, AssociationExtractor, BatchItem, ExtractionReport, Finding, FindingOrigin,
    ParallelExtractor,
};
pub use graph::{GraphStats, KnowledgeGraph, PruneReport};
pub use index::VectorIndex;
pub use reasoning::{
    Alternative, ConsensusResult, MultiPathAggregator, PathFinder, QueryIntent, QueryProcessor,
    QueryResponse, SearchStrategy,
};
