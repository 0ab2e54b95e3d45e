//! Contradiction detection and resolution
//!
//! Heuristic detection over concepts that share a subject: a statement
//! and its negation, or statements differing only by a known antonym
//! pair. Resolution prefers confidence, then recency, then provenance;
//! nothing is deleted, the resolver only reports which side to prefer.

use cognigraph_common::model::{Concept, ConceptId};
use cognigraph_common::text::tokenize;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::graph::KnowledgeGraph;

const NEGATION_WORDS: [&str; 6] = ["not", "never", "no", "cannot", "isn", "doesn"];

const ANTONYM_PAIRS: [(&str, &str); 8] = [
    ("hot", "cold"),
    ("big", "small"),
    ("wet", "dry"),
    ("true", "false"),
    ("alive", "dead"),
    ("up", "down"),
    ("solid", "liquid"),
    ("safe", "dangerous"),
];

/// Word overlap required between de-negated statements to call them
/// the same claim
const CLAIM_OVERLAP: f32 = 0.75;

/// A detected conflict between two stored concepts
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Contradiction {
    pub concept_a: ConceptId,
    pub concept_b: ConceptId,
    pub statement_a: String,
    pub statement_b: String,
    pub kind: ContradictionKind,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    Negation,
    Antonym,
}

/// Which side of a contradiction to prefer, and why
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolvedContradiction {
    pub preferred: ConceptId,
    pub rejected: ConceptId,
    pub basis: ResolutionBasis,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionBasis {
    Confidence,
    Recency,
    Provenance,
}

#[derive(Default)]
pub struct ContradictionResolver;

impl ContradictionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Scan the graph for contradicting concept pairs. Candidate pairs
    /// are limited to concepts sharing at least two content words, so
    /// the scan stays near-linear on sparse graphs.
    pub fn detect(&self, graph: &KnowledgeGraph) -> Vec<Contradiction> {
        let mut pair_words: HashMap<(ConceptId, ConceptId), usize> = HashMap::new();
        let mut word_buckets: HashMap<String, Vec<ConceptId>> = HashMap::new();

        for concept in graph.concepts() {
            for word in tokenize(&concept.content) {
                word_buckets.entry(word).or_default().push(concept.id.clone());
            }
        }
        for ids in word_buckets.values() {
            for (i, a) in ids.iter().enumerate() {
                for b in ids.iter().skip(i + 1) {
                    let key = if a < b {
                        (a.clone(), b.clone())
                    } else {
                        (b.clone(), a.clone())
                    };
                    *pair_words.entry(key).or_insert(0) += 1;
                }
            }
        }

        let mut found = Vec::new();
        for ((a, b), shared) in pair_words {
            if shared < 2 {
                continue;
            }
            let (Some(ca), Some(cb)) = (graph.get_concept(&a), graph.get_concept(&b)) else {
                continue;
            };
            if let Some(kind) = contradicts(&ca.content, &cb.content) {
                found.push(Contradiction {
                    concept_a: a,
                    concept_b: b,
                    statement_a: ca.content.clone(),
                    statement_b: cb.content.clone(),
                    kind,
                });
            }
        }

        if !found.is_empty() {
            debug!(count = found.len(), "Detected contradictions");
        }
        found
    }

    /// Pick a side: higher confidence wins; near-ties fall through to
    /// recency, then to whether a source is recorded.
    pub fn resolve(
        &self,
        graph: &KnowledgeGraph,
        contradiction: &Contradiction,
    ) -> Option<ResolvedContradiction> {
        let a = graph.get_concept(&contradiction.concept_a)?;
        let b = graph.get_concept(&contradiction.concept_b)?;

        let (winner, loser, basis) = if (a.confidence - b.confidence).abs() > 0.05 {
            if a.confidence > b.confidence {
                (a, b, ResolutionBasis::Confidence)
            } else {
                (b, a, ResolutionBasis::Confidence)
            }
        } else if a.last_accessed != b.last_accessed {
            if a.last_accessed > b.last_accessed {
                (a, b, ResolutionBasis::Recency)
            } else {
                (b, a, ResolutionBasis::Recency)
            }
        } else {
            match (&a.source, &b.source) {
                (Some(_), None) => (a, b, ResolutionBasis::Provenance),
                (None, Some(_)) => (b, a, ResolutionBasis::Provenance),
                _ => (a, b, ResolutionBasis::Provenance),
            }
        };

        Some(ResolvedContradiction {
            preferred: winner.id.clone(),
            rejected: loser.id.clone(),
            basis,
        })
    }

    /// Contradictions involving a specific concept, for checks at learn
    /// time.
    pub fn detect_for(&self, graph: &KnowledgeGraph, concept: &Concept) -> Vec<Contradiction> {
        self.detect(graph)
            .into_iter()
            .filter(|c| c.concept_a == concept.id || c.concept_b == concept.id)
            .collect()
    }
}

/// Do two statements contradict? Checks negation first, then antonym
/// substitution.
fn contradicts(a: &str, b: &str) -> Option<ContradictionKind> {
    let words_a: HashSet<String> = tokenize(a).into_iter().collect();
    let words_b: HashSet<String> = tokenize(b).into_iter().collect();

    let negated_a = NEGATION_WORDS.iter().any(|n| words_a.contains(*n));
    let negated_b = NEGATION_WORDS.iter().any(|n| words_b.contains(*n));

    if negated_a != negated_b {
        let strip = |words: &HashSet<String>| -> HashSet<String> {
            words
                .iter()
                .filter(|w| !NEGATION_WORDS.contains(&w.as_str()))
                .cloned()
                .collect()
        };
        let core_a = strip(&words_a);
        let core_b = strip(&words_b);
        if overlap(&core_a, &core_b) >= CLAIM_OVERLAP {
            return Some(ContradictionKind::Negation);
        }
    }

    for (left, right) in ANTONYM_PAIRS {
        let a_has = words_a.contains(left) && !words_a.contains(right);
        let b_has = words_b.contains(right) && !words_b.contains(left);
        let swapped = words_a.contains(right)
            && !words_a.contains(left)
            && words_b.contains(left)
            && !words_b.contains(right);
        if a_has && b_has || swapped {
            let rest_a: HashSet<String> = words_a
                .iter()
                .filter(|w| *w != left && *w != right)
                .cloned()
                .collect();
            let rest_b: HashSet<String> = words_b
                .iter()
                .filter(|w| *w != left && *w != right)
                .cloned()
                .collect();
            if overlap(&rest_a, &rest_b) >= CLAIM_OVERLAP {
                return Some(ContradictionKind::Antonym);
            }
        }
    }

    None
}

fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}
