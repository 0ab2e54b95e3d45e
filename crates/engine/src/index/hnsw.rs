//! HNSW vector index
//!
//! Layered proximity graph with greedy descent through the upper layers
//! and beam search at layer 0. Updates are mark-delete-then-reinsert
//! (HNSW has no true in-place update); deleted slots are only reclaimed
//! by an explicit `rebuild`.

use cognigraph_common::config::IndexConfig;
use cognigraph_common::errors::{EngineError, Result};
use cognigraph_common::model::ConceptId;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::debug;

/// Search candidate ordered by distance (total order over f32)
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    distance: f32,
    slot: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Node {
    id: ConceptId,
    vector: Vec<f32>,
    /// Soft-delete flag; the slot stays in the graph until rebuild
    deleted: bool,
    /// Neighbor slots per layer, index 0 = base layer
    neighbors: Vec<Vec<usize>>,
}

impl Node {
    fn top_layer(&self) -> usize {
        self.neighbors.len() - 1
    }
}

/// HNSW index over concept embeddings
pub struct VectorIndex {
    config: IndexConfig,
    nodes: Vec<Node>,
    slots: HashMap<ConceptId, usize>,
    entry_point: Option<usize>,
    deleted_count: usize,
    /// Level normalization factor 1/ln(M)
    level_mult: f64,
}

impl VectorIndex {
    /// Create an empty index for the configured dimension
    pub fn new(config: IndexConfig) -> Result<Self> {
        if config.dimension == 0 {
            return Err(EngineError::Configuration {
                message: "index dimension must be non-zero".into(),
            });
        }
        let level_mult = 1.0 / (config.m as f64).ln();
        Ok(Self {
            config,
            nodes: Vec::new(),
            slots: HashMap::new(),
            entry_point: None,
            deleted_count: 0,
            level_mult,
        })
    }

    /// Number of live (non-deleted) entries
    pub fn len(&self) -> usize {
        self.nodes.len() - self.deleted_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an id is currently indexed
    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Embedding dimension this index was built for
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Insert or update an embedding. An existing id is soft-deleted and
    /// reinserted, since HNSW has no true update.
    pub fn insert(&mut self, id: &str, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }

        if self.slots.contains_key(id) {
            self.remove(id);
        }

        let level = self.assign_level(id);
        let slot = self.nodes.len();
        self.nodes.push(Node {
            id: id.to_string(),
            vector,
            deleted: false,
            neighbors: vec![Vec::new(); level + 1],
        });
        self.slots.insert(id.to_string(), slot);

        let Some(mut current) = self.entry_point else {
            self.entry_point = Some(slot);
            return Ok(());
        };

        let top = self.nodes[current].top_layer();

        // Greedy descent through layers above the new node's level
        for layer in ((level + 1)..=top).rev() {
            current = self.greedy_closest(&self.nodes[slot].vector, current, layer);
        }

        // Connect on each shared layer
        for layer in (0..=level.min(top)).rev() {
            let candidates = self.search_layer(
                &self.nodes[slot].vector,
                current,
                self.config.ef_construction,
                layer,
            );
            current = candidates.first().map(|c| c.slot).unwrap_or(current);

            let max_links = self.max_links(layer);
            let selected: Vec<usize> = candidates
                .iter()
                .take(max_links)
                .map(|c| c.slot)
                .collect();

            for &neighbor in &selected {
                self.nodes[slot].neighbors[layer].push(neighbor);
                self.nodes[neighbor].neighbors[layer].push(slot);
                self.trim_links(neighbor, layer);
            }
        }

        if level > top {
            self.entry_point = Some(slot);
        }
        Ok(())
    }

    /// Soft-delete an id. The slot remains in the graph as a routing node
    /// until `rebuild` reclaims it.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(slot) = self.slots.remove(id) else {
            return false;
        };
        if !self.nodes[slot].deleted {
            self.nodes[slot].deleted = true;
            self.deleted_count += 1;
        }
        if self.entry_point == Some(slot) {
            self.entry_point = self
                .nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| !n.deleted)
                .max_by_key(|(_, n)| n.top_layer())
                .map(|(i, _)| i);
        }
        true
    }

    /// Search up to k nearest live entries. Similarity is
    /// 1 - cosine_distance / 2, mapping into [0, 1]. When a filter set is
    /// given, 2k candidates are fetched before filtering.
    pub fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter_ids: Option<&HashSet<ConceptId>>,
    ) -> Result<Vec<(ConceptId, f32)>> {
        if vector.len() != self.config.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.len(),
            });
        }
        let Some(mut current) = self.entry_point else {
            return Ok(Vec::new());
        };

        let fetch = if filter_ids.is_some() { k * 2 } else { k };
        let ef = self.config.ef_search.max(fetch);

        let top = self.nodes[current].top_layer();
        for layer in (1..=top).rev() {
            current = self.greedy_closest(vector, current, layer);
        }

        let candidates = self.search_layer(vector, current, ef, 0);

        let mut results: Vec<(ConceptId, f32)> = candidates
            .into_iter()
            .filter(|c| !self.nodes[c.slot].deleted)
            .filter(|c| {
                filter_ids
                    .map(|f| f.contains(&self.nodes[c.slot].id))
                    .unwrap_or(true)
            })
            .take(k)
            .map(|c| (self.nodes[c.slot].id.clone(), 1.0 - c.distance / 2.0))
            .collect();
        results.truncate(k);
        Ok(results)
    }

    /// Whether the deleted fraction has crossed the compaction threshold.
    /// Compaction is never automatic: call `rebuild` explicitly.
    pub fn needs_compaction(&self) -> bool {
        !self.nodes.is_empty()
            && self.deleted_count as f32 / self.nodes.len() as f32
                >= self.config.compaction_threshold
    }

    /// Full reconstruction from live entries; the only way deleted slots
    /// are reclaimed.
    pub fn rebuild(&mut self) -> Result<()> {
        let live: Vec<(ConceptId, Vec<f32>)> = self
            .nodes
            .drain(..)
            .filter(|n| !n.deleted)
            .map(|n| (n.id, n.vector))
            .collect();

        self.slots.clear();
        self.entry_point = None;
        self.deleted_count = 0;

        let count = live.len();
        for (id, vector) in live {
            self.insert(&id, vector)?;
        }
        debug!(entries = count, "Rebuilt vector index");
        Ok(())
    }

    /// Deterministic level assignment derived from the id hash, so the
    /// index shape is reproducible for the same content.
    fn assign_level(&self, id: &str) -> usize {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in id.bytes() {
            h ^= b as u64;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        // Map hash to (0, 1) and invert the exponential CDF
        let uniform = (h >> 11) as f64 / (1u64 << 53) as f64;
        let uniform = uniform.max(f64::MIN_POSITIVE);
        (-uniform.ln() * self.level_mult).floor() as usize
    }

    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m * 2
        } else {
            self.config.m
        }
    }

    fn trim_links(&mut self, slot: usize, layer: usize) {
        let max_links = self.max_links(layer);
        if self.nodes[slot].neighbors[layer].len() <= max_links {
            return;
        }
        let origin = self.nodes[slot].vector.clone();
        let mut linked: Vec<Candidate> = self.nodes[slot].neighbors[layer]
            .iter()
            .map(|&n| Candidate {
                distance: cosine_distance(&origin, &self.nodes[n].vector),
                slot: n,
            })
            .collect();
        linked.sort();
        linked.truncate(max_links);
        self.nodes[slot].neighbors[layer] = linked.into_iter().map(|c| c.slot).collect();
    }

    /// Single-step greedy descent toward the query on one layer
    fn greedy_closest(&self, vector: &[f32], start: usize, layer: usize) -> usize {
        let mut current = start;
        let mut current_dist = cosine_distance(vector, &self.nodes[current].vector);

        loop {
            let mut improved = false;
            if layer < self.nodes[current].neighbors.len() {
                for &neighbor in &self.nodes[current].neighbors[layer] {
                    let d = cosine_distance(vector, &self.nodes[neighbor].vector);
                    if d < current_dist {
                        current = neighbor;
                        current_dist = d;
                        improved = true;
                    }
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Beam search on one layer; returns candidates sorted by ascending
    /// distance. Deleted slots are traversed (they still route) but the
    /// caller filters them from results.
    fn search_layer(&self, vector: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<Candidate> {
        let entry_dist = cosine_distance(vector, &self.nodes[entry].vector);
        let mut visited: HashSet<usize> = HashSet::from([entry]);
        // Min-heap of frontier candidates
        let mut frontier = BinaryHeap::from([Reverse(Candidate {
            distance: entry_dist,
            slot: entry,
        })]);
        // Max-heap of the ef best found so far
        let mut best = BinaryHeap::from([Candidate {
            distance: entry_dist,
            slot: entry,
        }]);

        while let Some(Reverse(candidate)) = frontier.pop() {
            let worst = best.peek().map(|c| c.distance).unwrap_or(f32::MAX);
            if candidate.distance > worst && best.len() >= ef {
                break;
            }

            if layer >= self.nodes[candidate.slot].neighbors.len() {
                continue;
            }
            for &neighbor in &self.nodes[candidate.slot].neighbors[layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let d = cosine_distance(vector, &self.nodes[neighbor].vector);
                let worst = best.peek().map(|c| c.distance).unwrap_or(f32::MAX);
                if best.len() < ef || d < worst {
                    let c = Candidate {
                        distance: d,
                        slot: neighbor,
                    };
                    frontier.push(Reverse(c));
                    best.push(c);
                    if best.len() > ef {
                        best.pop();
                    }
                }
            }
        }

        let mut results = best.into_vec();
        results.sort();
        results
    }
}

/// Cosine distance in [0, 2]
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}
