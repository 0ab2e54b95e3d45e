//! Knowledge graph storage and mutation
//!
//! Concepts are keyed by their deterministic content hash, associations by
//! the (source, target) pair. Repeat learning reinforces instead of
//! duplicating. Adjacency is indexed bidirectionally for traversal even
//! though association semantics stay directed.

use chrono::{Duration, Utc};
use cognigraph_common::config::GraphConfig;
use cognigraph_common::model::{
    association_key, Association, AssociationRecord, AssociationType, Concept, ConceptId,
    ConceptRecord, KnowledgeBaseFile, KnowledgeBaseMetadata,
};
use cognigraph_common::text::tokenize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Knowledge-base file format version written by this build
const KB_FORMAT_VERSION: u32 = 1;

/// Graph-level statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphStats {
    pub concept_count: usize,
    pub association_count: usize,
}

/// Outcome of a decay/prune pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub concepts_decayed: usize,
    pub concepts_removed: usize,
    pub associations_removed: usize,
}

impl PruneReport {
    /// Whether anything was removed (removal triggers index rebuilds)
    pub fn removed_any(&self) -> bool {
        self.concepts_removed > 0 || self.associations_removed > 0
    }
}

/// The mutable knowledge graph
pub struct KnowledgeGraph {
    config: GraphConfig,

    /// Concepts keyed by content hash
    concepts: HashMap<ConceptId, Concept>,

    /// Associations keyed by "src:tgt"
    associations: HashMap<String, Association>,

    /// Derived: concept -> adjacent concept ids (bidirectional)
    neighbors: HashMap<ConceptId, HashSet<ConceptId>>,

    /// Derived: word -> concept ids containing it
    word_index: HashMap<String, HashSet<ConceptId>>,
}

impl KnowledgeGraph {
    /// Create an empty graph
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            concepts: HashMap::new(),
            associations: HashMap::new(),
            neighbors: HashMap::new(),
            word_index: HashMap::new(),
        }
    }

    /// Learn a concept: create on first sight, reinforce on re-learning.
    /// Returns the concept id and whether it was newly created.
    pub fn learn_concept(
        &mut self,
        content: &str,
        source: Option<&str>,
        category: Option<&str>,
    ) -> (ConceptId, bool) {
        let id = cognigraph_common::model::concept_id(content);

        if let Some(existing) = self.concepts.get_mut(&id) {
            existing.record_access(self.config.access_boost, self.config.max_strength);
            return (id, false);
        }

        let mut concept = Concept::new(content);
        if let Some(source) = source {
            concept.source = Some(source.to_string());
        }
        if let Some(category) = category {
            concept.category = Some(category.to_string());
        }
        concept.record_access(self.config.access_boost, self.config.max_strength);

        for word in tokenize(content) {
            self.word_index.entry(word).or_default().insert(id.clone());
        }
        self.concepts.insert(id.clone(), concept);
        (id, true)
    }

    /// Insert a fully formed concept (used when rehydrating from storage)
    pub fn insert_concept(&mut self, concept: Concept) {
        for word in tokenize(&concept.content) {
            self.word_index
                .entry(word)
                .or_default()
                .insert(concept.id.clone());
        }
        self.concepts.insert(concept.id.clone(), concept);
    }

    /// Fetch a concept
    pub fn get_concept(&self, id: &str) -> Option<&Concept> {
        self.concepts.get(id)
    }

    /// Record an access on an existing concept
    pub fn record_access(&mut self, id: &str) {
        if let Some(concept) = self.concepts.get_mut(id) {
            concept.record_access(self.config.access_boost, self.config.max_strength);
        }
    }

    /// Extra strength reinforcement that does not count as an access;
    /// used by adaptive learning so access_count stays a pure event
    /// counter.
    pub fn boost_strength(&mut self, id: &str, times: u32) {
        if let Some(concept) = self.concepts.get_mut(id) {
            for _ in 0..times {
                concept.strength =
                    (concept.strength * self.config.access_boost).min(self.config.max_strength);
            }
        }
    }

    /// Create or reinforce an association. Keyed by (source, target):
    /// a repeat creation strengthens the existing link.
    pub fn add_association(
        &mut self,
        source_id: &str,
        target_id: &str,
        assoc_type: AssociationType,
        confidence: f32,
    ) -> bool {
        let key = association_key(source_id, target_id);

        if let Some(existing) = self.associations.get_mut(&key) {
            existing.reinforce(
                self.config.weight_boost,
                self.config.max_weight,
                self.config.confidence_growth,
            );
            return false;
        }

        let association = Association::new(source_id, target_id, assoc_type, confidence);
        self.neighbors
            .entry(association.source_id.clone())
            .or_default()
            .insert(association.target_id.clone());
        self.neighbors
            .entry(association.target_id.clone())
            .or_default()
            .insert(association.source_id.clone());
        self.associations.insert(key, association);
        true
    }

    /// Insert a fully formed association (used when rehydrating)
    pub fn insert_association(&mut self, association: Association) {
        self.neighbors
            .entry(association.source_id.clone())
            .or_default()
            .insert(association.target_id.clone());
        self.neighbors
            .entry(association.target_id.clone())
            .or_default()
            .insert(association.source_id.clone());
        self.associations.insert(association.key(), association);
    }

    /// Directed lookup of the association stored between two concepts.
    /// Checks both orientations since traversal is bidirectional.
    pub fn association_between(&self, a: &str, b: &str) -> Option<&Association> {
        self.associations
            .get(&association_key(a, b))
            .or_else(|| self.associations.get(&association_key(b, a)))
    }

    /// Adjacent concept ids (bidirectional)
    pub fn neighbors(&self, id: &str) -> Option<&HashSet<ConceptId>> {
        self.neighbors.get(id)
    }

    /// Number of adjacent concepts
    pub fn degree(&self, id: &str) -> usize {
        self.neighbors.get(id).map(|s| s.len()).unwrap_or(0)
    }

    /// Concept ids containing the given word
    pub fn concepts_for_word(&self, word: &str) -> Option<&HashSet<ConceptId>> {
        self.word_index.get(word)
    }

    /// Iterate all concepts
    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    /// Iterate all associations
    pub fn associations(&self) -> impl Iterator<Item = &Association> {
        self.associations.values()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            concept_count: self.concepts.len(),
            association_count: self.associations.len(),
        }
    }

    /// Rebuild the derived indices wholesale from the system of record.
    /// Called after bulk mutation or any removal.
    pub fn rebuild_indices(&mut self) {
        self.neighbors.clear();
        self.word_index.clear();

        for (id, concept) in &self.concepts {
            for word in tokenize(&concept.content) {
                self.word_index.entry(word).or_default().insert(id.clone());
            }
        }

        for association in self.associations.values() {
            self.neighbors
                .entry(association.source_id.clone())
                .or_default()
                .insert(association.target_id.clone());
            self.neighbors
                .entry(association.target_id.clone())
                .or_default()
                .insert(association.source_id.clone());
        }

        debug!(
            concepts = self.concepts.len(),
            associations = self.associations.len(),
            "Rebuilt graph indices"
        );
    }

    /// Decay strength of inactive concepts, then prune concepts that are
    /// simultaneously very weak, long-untouched, never accessed beyond
    /// creation, and degree-zero. Separately prunes stale low-confidence
    /// associations. Any removal rebuilds the indices.
    pub fn decay_and_prune(&mut self) -> PruneReport {
        let now = Utc::now();
        let inactivity = Duration::seconds(self.config.decay_after_secs as i64);
        let stale = Duration::seconds(self.config.stale_after_secs as i64);
        let mut report = PruneReport::default();

        for concept in self.concepts.values_mut() {
            if now - concept.last_accessed > inactivity {
                concept.strength *= self.config.decay_factor;
                report.concepts_decayed += 1;
            }
        }

        let prunable: Vec<ConceptId> = self
            .concepts
            .values()
            .filter(|c| {
                c.strength < self.config.prune_strength
                    && now - c.last_accessed > inactivity
                    && c.access_count <= 1
                    && self.degree(&c.id) == 0
            })
            .map(|c| c.id.clone())
            .collect();

        for id in &prunable {
            self.concepts.remove(id);
            // Cascade: drop any association still referencing the concept
            self.associations
                .retain(|_, a| a.source_id != *id && a.target_id != *id);
        }
        report.concepts_removed = prunable.len();

        let before = self.associations.len();
        let prune_confidence = self.config.prune_confidence;
        self.associations
            .retain(|_, a| !(a.confidence < prune_confidence && now - a.last_used > stale));
        report.associations_removed += before - self.associations.len();

        if report.removed_any() {
            self.rebuild_indices();
            info!(
                concepts_removed = report.concepts_removed,
                associations_removed = report.associations_removed,
                "Pruned knowledge graph"
            );
        }

        report
    }

    /// Serialize to the persisted knowledge-base format
    pub fn to_kb_file(&self) -> KnowledgeBaseFile {
        let concepts = self
            .concepts
            .iter()
            .map(|(id, c)| (id.clone(), ConceptRecord::from(c)))
            .collect();
        let associations = self
            .associations
            .iter()
            .map(|(key, a)| (key.clone(), AssociationRecord::from(a)))
            .collect();

        KnowledgeBaseFile {
            concepts,
            associations,
            metadata: KnowledgeBaseMetadata {
                version: KB_FORMAT_VERSION,
                saved_at: Some(Utc::now()),
                concept_count: self.concepts.len(),
                association_count: self.associations.len(),
            },
        }
    }

    /// Rehydrate from the persisted knowledge-base format. Malformed
    /// entries are skipped, not fatal.
    pub fn from_kb_file(config: GraphConfig, file: KnowledgeBaseFile) -> Self {
        let mut graph = Self::new(config);

        for (id, record) in file.concepts {
            graph.insert_concept(record.into_concept(id));
        }
        for (key, record) in file.associations {
            if let Some(association) = record.into_association(&key) {
                graph.insert_association(association);
            }
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> KnowledgeGraph {
        KnowledgeGraph::new(GraphConfig::default())
    }

    #[test]
    fn test_learning_is_idempotent() {
        let mut g = graph();
        let (id1, created1) = g.learn_concept("X is Y.", None, None);
        let (id2, created2) = g.learn_concept("X is Y.", None, None);

        assert_eq!(id1, id2);
        assert!(created1);
        assert!(!created2);
        assert_eq!(g.stats().concept_count, 1);
        assert_eq!(g.get_concept(&id1).unwrap().access_count, 2);
    }

    #[test]
    fn test_repeated_learning_bounds_strength() {
        let mut g = graph();
        let (id, _) = g.learn_concept("repeated fact", None, None);
        let mut last = 0.0;
        for _ in 0..500 {
            g.record_access(&id);
            let s = g.get_concept(&id).unwrap().strength;
            assert!(s >= last);
            last = s;
        }
        assert!(last <= 10.0);
    }

    #[test]
    fn test_association_uniqueness() {
        let mut g = graph();
        let (a, _) = g.learn_concept("fire", None, None);
        let (b, _) = g.learn_concept("smoke", None, None);

        assert!(g.add_association(&a, &b, AssociationType::Causal, 0.8));
        let w1 = g.association_between(&a, &b).unwrap().weight;
        assert!(!g.add_association(&a, &b, AssociationType::Causal, 0.8));
        let w2 = g.association_between(&a, &b).unwrap().weight;

        assert_eq!(g.stats().association_count, 1);
        assert!(w2 > w1);
        assert!(w2 <= 5.0);
    }

    #[test]
    fn test_neighbors_bidirectional() {
        let mut g = graph();
        let (a, _) = g.learn_concept("rain", None, None);
        let (b, _) = g.learn_concept("wet ground", None, None);
        g.add_association(&a, &b, AssociationType::Causal, 0.8);

        assert!(g.neighbors(&a).unwrap().contains(&b));
        assert!(g.neighbors(&b).unwrap().contains(&a));
        assert!(g.association_between(&b, &a).is_some());
    }

    #[test]
    fn test_word_index() {
        let mut g = graph();
        let (id, _) = g.learn_concept("the sky is blue", None, None);
        assert!(g.concepts_for_word("sky").unwrap().contains(&id));
        assert!(g.concepts_for_word("blue").unwrap().contains(&id));
        assert!(g.concepts_for_word("green").is_none());
    }

    #[test]
    fn test_rebuild_indices_matches_incremental() {
        let mut g = graph();
        let (a, _) = g.learn_concept("alpha concept", None, None);
        let (b, _) = g.learn_concept("beta concept", None, None);
        g.add_association(&a, &b, AssociationType::Semantic, 0.7);

        let neighbors_before: HashSet<_> = g.neighbors(&a).unwrap().clone();
        g.rebuild_indices();
        assert_eq!(g.neighbors(&a).unwrap(), &neighbors_before);
        assert!(g.concepts_for_word("alpha").unwrap().contains(&a));
    }

    #[test]
    fn test_decay_and_prune_removes_isolated_weak_concepts() {
        let mut g = graph();
        let (id, _) = g.learn_concept("forgettable detail", None, None);

        // Age the concept past the inactivity window and weaken it
        {
            let concept = g.concepts.get_mut(&id).unwrap();
            concept.last_accessed = Utc::now() - Duration::days(365);
            concept.strength = 0.1;
            concept.access_count = 1;
        }

        let report = g.decay_and_prune();
        assert_eq!(report.concepts_removed, 1);
        assert!(g.get_concept(&id).is_none());
        assert!(g.concepts_for_word("forgettable").is_none());
    }

    #[test]
    fn test_connected_concepts_survive_prune() {
        let mut g = graph();
        let (a, _) = g.learn_concept("linked one", None, None);
        let (b, _) = g.learn_concept("linked two", None, None);
        g.add_association(&a, &b, AssociationType::Semantic, 0.9);

        for id in [&a, &b] {
            let concept = g.concepts.get_mut(id).unwrap();
            concept.last_accessed = Utc::now() - Duration::days(365);
            concept.strength = 0.1;
            concept.access_count = 1;
        }

        let report = g.decay_and_prune();
        assert_eq!(report.concepts_removed, 0);
        assert!(g.get_concept(&a).is_some());
    }

    #[test]
    fn test_stale_association_pruned() {
        let mut g = graph();
        let (a, _) = g.learn_concept("one", None, None);
        let (b, _) = g.learn_concept("two", None, None);
        g.add_association(&a, &b, AssociationType::Semantic, 0.1);

        let key = association_key(&a, &b);
        g.associations.get_mut(&key).unwrap().last_used = Utc::now() - Duration::days(365);

        let report = g.decay_and_prune();
        assert_eq!(report.associations_removed, 1);
        assert!(g.association_between(&a, &b).is_none());
        // Rebuild dropped the adjacency too
        assert_eq!(g.degree(&a), 0);
    }

    #[test]
    fn test_kb_file_round_trip() {
        let mut g = graph();
        let (a, _) = g.learn_concept("water freezes at zero", None, None);
        let (b, _) = g.learn_concept("ice is solid water", None, None);
        g.add_association(&a, &b, AssociationType::Hierarchical, 0.8);

        let file = g.to_kb_file();
        assert_eq!(file.metadata.concept_count, 2);

        let restored = KnowledgeGraph::from_kb_file(GraphConfig::default(), file);
        assert_eq!(restored.stats(), g.stats());
        assert_eq!(
            restored.get_concept(&a).unwrap().content,
            "water freezes at zero"
        );
        assert!(restored.association_between(&a, &b).is_some());
        assert!(restored.neighbors(&a).unwrap().contains(&b));
    }
}
