//! Reasoning over the knowledge graph
//!
//! Provides:
//! - Multi-strategy path finding between concept pairs
//! - Multi-path consensus aggregation over candidate answers
//! - Query processing: intent, concept relevance, strategy dispatch
//!
//! Paths are ephemeral values produced per query; nothing in this module
//! mutates the graph.

mod aggregator;
mod pathfinder;
mod query;

pub use aggregator::{Alternative, ConsensusResult, MultiPathAggregator};
pub use pathfinder::{PathFinder, SearchStrategy};
pub use query::{QueryIntent, QueryProcessor, QueryResponse};
pub(crate) use query::classify_intent;

use std::collections::HashSet;

/// Jaccard overlap of two string sets. Empty-vs-empty counts as full
/// overlap so identical empty answers cluster together.
pub(crate) fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f32 / union as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_jaccard_bounds() {
        assert!((jaccard(&set(&["a", "b"]), &set(&["a", "b"])) - 1.0).abs() < f32::EPSILON);
        assert!(jaccard(&set(&["a"]), &set(&["b"])).abs() < f32::EPSILON);
        let half = jaccard(&set(&["a", "b"]), &set(&["b", "c"]));
        assert!(half > 0.3 && half < 0.34);
    }

    #[test]
    fn test_jaccard_empty_sets_overlap() {
        assert!((jaccard(&set(&[]), &set(&[])) - 1.0).abs() < f32::EPSILON);
        assert!(jaccard(&set(&[]), &set(&["a"])).abs() < f32::EPSILON);
    }
}
