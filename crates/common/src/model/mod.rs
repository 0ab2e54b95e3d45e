//! Core knowledge-graph data model
//!
//! Provides:
//! - Concepts (atomic claims with strength and confidence)
//! - Typed, weighted associations between concepts
//! - Reasoning paths produced by graph search
//! - The persisted knowledge-base file format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Concept identifier: hex-encoded SHA-256 of the normalized content.
pub type ConceptId = String;

/// Normalize content before hashing so that id is a pure function of
/// meaning-equivalent text: trimmed, lowercased, whitespace collapsed.
pub fn normalize_content(content: &str) -> String {
    content
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic concept id. Re-learning identical content maps to the
/// same id, so learning reinforces instead of duplicating.
pub fn concept_id(content: &str) -> ConceptId {
    let mut hasher = Sha256::new();
    hasher.update(normalize_content(content).as_bytes());
    hex::encode(hasher.finalize())
}

/// An atomic unit of knowledge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Concept {
    /// Deterministic hash of the normalized content
    pub id: ConceptId,

    /// Original content text
    pub content: String,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Number of times this concept was accessed
    pub access_count: u64,

    /// Strength in [0, 10]; grows multiplicatively per access
    pub strength: f32,

    /// Last access timestamp
    pub last_accessed: DateTime<Utc>,

    /// Confidence in [0, 1]
    pub confidence: f32,

    /// Optional provenance label
    pub source: Option<String>,

    /// Optional category label
    pub category: Option<String>,
}

impl Concept {
    /// Create a concept from content at the current time
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: concept_id(&content),
            content,
            created: now,
            access_count: 0,
            strength: 1.0,
            last_accessed: now,
            confidence: 0.5,
            source: None,
            category: None,
        }
    }

    /// Builder-style source label
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builder-style category label
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Record an access: bump the counter and reinforce strength
    /// multiplicatively up to the cap.
    pub fn record_access(&mut self, boost: f32, max_strength: f32) {
        self.access_count += 1;
        self.strength = (self.strength * boost).min(max_strength);
        self.last_accessed = Utc::now();
    }
}

/// Association type: a closed set, matched exhaustively at every
/// consumption site (pattern tables, persistence, display).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssociationType {
    /// General semantic relatedness
    Semantic,
    /// Cause-effect relation
    Causal,
    /// Temporal ordering
    Temporal,
    /// Is-a / kind-of relation
    Hierarchical,
    /// Part-whole relation
    Compositional,
}

impl AssociationType {
    /// Stable lowercase label used in explanations and persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationType::Semantic => "semantic",
            AssociationType::Causal => "causal",
            AssociationType::Temporal => "temporal",
            AssociationType::Hierarchical => "hierarchical",
            AssociationType::Compositional => "compositional",
        }
    }
}

impl fmt::Display for AssociationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssociationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "semantic" => Ok(AssociationType::Semantic),
            "causal" => Ok(AssociationType::Causal),
            "temporal" => Ok(AssociationType::Temporal),
            "hierarchical" => Ok(AssociationType::Hierarchical),
            "compositional" => Ok(AssociationType::Compositional),
            other => Err(format!("unknown association type: {}", other)),
        }
    }
}

/// A typed, directed, weighted edge between two concepts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Association {
    /// Source concept id
    pub source_id: ConceptId,

    /// Target concept id
    pub target_id: ConceptId,

    /// Relation type
    pub assoc_type: AssociationType,

    /// Weight in [0, 5]; grows multiplicatively on reinforcement
    pub weight: f32,

    /// Confidence in [0, 1]; grows additively on reinforcement
    pub confidence: f32,

    /// Creation timestamp
    pub created: DateTime<Utc>,

    /// Last traversal or reinforcement timestamp
    pub last_used: DateTime<Utc>,
}

impl Association {
    /// Create an association at the current time
    pub fn new(
        source_id: impl Into<ConceptId>,
        target_id: impl Into<ConceptId>,
        assoc_type: AssociationType,
        confidence: f32,
    ) -> Self {
        let now = Utc::now();
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            assoc_type,
            weight: 1.0,
            confidence: confidence.clamp(0.0, 1.0),
            created: now,
            last_used: now,
        }
    }

    /// Unique key within the graph: associations are keyed by the
    /// (source, target) pair, so repeat creation strengthens.
    pub fn key(&self) -> String {
        association_key(&self.source_id, &self.target_id)
    }

    /// Reinforce: weight grows multiplicatively up to its cap,
    /// confidence additively up to 1.0.
    pub fn reinforce(&mut self, weight_boost: f32, max_weight: f32, confidence_growth: f32) {
        self.weight = (self.weight * weight_boost).min(max_weight);
        self.confidence = (self.confidence + confidence_growth).min(1.0);
        self.last_used = Utc::now();
    }

    /// Mark a traversal without reinforcing
    pub fn touch(&mut self) {
        self.last_used = Utc::now();
    }
}

/// Build the "src:tgt" association key
pub fn association_key(source_id: &str, target_id: &str) -> String {
    format!("{}:{}", source_id, target_id)
}

/// One hop in a reasoning path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningStep {
    /// Content of the concept this hop started from
    pub source_concept: String,

    /// Relation label for the traversed association
    pub relation: String,

    /// Content of the concept this hop arrived at
    pub target_concept: String,

    /// Propagated confidence after this hop
    pub confidence: f32,

    /// 1-indexed position within the path
    pub step_number: usize,
}

/// A complete reasoning path from seed to answer. Ephemeral: created per
/// search and discarded after aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasoningPath {
    /// Query that triggered the search
    pub query: String,

    /// Answer candidate (content of the final concept)
    pub answer: String,

    /// Ordered hops
    pub steps: Vec<ReasoningStep>,

    /// Path confidence: product of per-hop confidences and decay
    pub confidence: f32,

    /// Search time for this path in milliseconds
    pub elapsed_ms: u64,
}

impl ReasoningPath {
    /// Number of hops
    pub fn hop_count(&self) -> usize {
        self.steps.len()
    }

    /// Step identity set used for diversity comparison between paths
    pub fn step_keys(&self) -> std::collections::HashSet<String> {
        self.steps
            .iter()
            .map(|s| format!("{}->{}", s.source_concept, s.target_concept))
            .collect()
    }

    /// Sequence of relation labels, used by the aggregator's diversity bonus
    pub fn relation_sequence(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.relation.clone()).collect()
    }
}

/// Persisted knowledge-base file format (fallback storage)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnowledgeBaseFile {
    /// Concept records keyed by id
    pub concepts: BTreeMap<String, ConceptRecord>,

    /// Association records keyed by "src:tgt"
    pub associations: BTreeMap<String, AssociationRecord>,

    /// File metadata
    pub metadata: KnowledgeBaseMetadata,
}

/// Concept as persisted (id lives in the map key)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptRecord {
    pub content: String,
    pub created: DateTime<Utc>,
    pub access_count: u64,
    pub strength: f32,
    pub last_accessed: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub confidence: f32,
}

/// Association as persisted (endpoints live in the map key)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociationRecord {
    pub assoc_type: AssociationType,
    pub weight: f32,
    pub confidence: f32,
    pub created: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// Knowledge-base file metadata
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnowledgeBaseMetadata {
    pub version: u32,
    pub saved_at: Option<DateTime<Utc>>,
    pub concept_count: usize,
    pub association_count: usize,
}

impl From<&Concept> for ConceptRecord {
    fn from(c: &Concept) -> Self {
        Self {
            content: c.content.clone(),
            created: c.created,
            access_count: c.access_count,
            strength: c.strength,
            last_accessed: c.last_accessed,
            source: c.source.clone(),
            category: c.category.clone(),
            confidence: c.confidence,
        }
    }
}

impl ConceptRecord {
    /// Rehydrate a concept from its record and map key
    pub fn into_concept(self, id: ConceptId) -> Concept {
        Concept {
            id,
            content: self.content,
            created: self.created,
            access_count: self.access_count,
            strength: self.strength,
            last_accessed: self.last_accessed,
            confidence: self.confidence,
            source: self.source,
            category: self.category,
        }
    }
}

impl From<&Association> for AssociationRecord {
    fn from(a: &Association) -> Self {
        Self {
            assoc_type: a.assoc_type,
            weight: a.weight,
            confidence: a.confidence,
            created: a.created,
            last_used: a.last_used,
        }
    }
}

impl AssociationRecord {
    /// Rehydrate an association from its record and "src:tgt" map key
    pub fn into_association(self, key: &str) -> Option<Association> {
        let (source_id, target_id) = key.split_once(':')?;
        Some(Association {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            assoc_type: self.assoc_type,
            weight: self.weight,
            confidence: self.confidence,
            created: self.created,
            last_used: self.last_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concept_id_deterministic() {
        assert_eq!(concept_id("The sky is blue."), concept_id("The sky is blue."));
        assert_eq!(concept_id("  The   SKY is blue.  "), concept_id("the sky is blue."));
        assert_ne!(concept_id("The sky is blue."), concept_id("Grass is green."));
    }

    #[test]
    fn test_strength_capped() {
        let mut c = Concept::new("test fact");
        c.strength = 9.99;
        for _ in 0..100 {
            c.record_access(1.02, 10.0);
        }
        assert!(c.strength <= 10.0);
        assert_eq!(c.access_count, 100);
    }

    #[test]
    fn test_association_reinforce_caps() {
        let mut a = Association::new("a", "b", AssociationType::Causal, 0.8);
        for _ in 0..100 {
            a.reinforce(1.1, 5.0, 0.05);
        }
        assert!(a.weight <= 5.0);
        assert!(a.confidence <= 1.0);
    }

    #[test]
    fn test_association_type_round_trip() {
        for t in [
            AssociationType::Semantic,
            AssociationType::Causal,
            AssociationType::Temporal,
            AssociationType::Hierarchical,
            AssociationType::Compositional,
        ] {
            assert_eq!(t.as_str().parse::<AssociationType>().unwrap(), t);
        }
    }

    #[test]
    fn test_kb_record_round_trip() {
        let concept = Concept::new("water boils at 100 degrees").with_source("textbook");
        let record = ConceptRecord::from(&concept);
        let restored = record.into_concept(concept.id.clone());
        assert_eq!(restored, concept);

        let assoc = Association::new("a", "b", AssociationType::Temporal, 0.7);
        let record = AssociationRecord::from(&assoc);
        let restored = record.into_association(&assoc.key()).unwrap();
        assert_eq!(restored, assoc);
    }

    #[test]
    fn test_path_step_keys() {
        let path = ReasoningPath {
            query: "q".into(),
            answer: "a".into(),
            steps: vec![
                ReasoningStep {
                    source_concept: "x".into(),
                    relation: "causal".into(),
                    target_concept: "y".into(),
                    confidence: 0.8,
                    step_number: 1,
                },
            ],
            confidence: 0.8,
            elapsed_ms: 1,
        };
        assert!(path.step_keys().contains("x->y"));
    }
}
