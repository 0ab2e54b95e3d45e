//! Multi-strategy path search between concept pairs
//!
//! Three strategies over the same graph:
//! - Best-first: priority queue ordered by propagated confidence times a
//!   proximity heuristic toward the target
//! - Breadth: level-order expansion keeping the best confidence seen per
//!   concept
//! - Bidirectional: half-depth searches from both endpoints stitched at
//!   meeting concepts
//!
//! Confidence decays per hop; branches under the floor are abandoned.
//! Finding no path is a normal outcome, not an error.

use cognigraph_common::config::PathFinderConfig;
use cognigraph_common::model::{ConceptId, ReasoningPath, ReasoningStep};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::time::Instant;
use tracing::trace;

use super::jaccard;
use crate::graph::KnowledgeGraph;

/// Which search strategy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    BestFirst,
    Breadth,
    Bidirectional,
}

/// A partial path during search
#[derive(Debug, Clone)]
struct SearchState {
    priority: f32,
    confidence: f32,
    concept: ConceptId,
    visited: HashSet<ConceptId>,
    steps: Vec<ReasoningStep>,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for SearchState {}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.total_cmp(&other.priority)
    }
}

pub struct PathFinder {
    config: PathFinderConfig,
}

impl PathFinder {
    pub fn new(config: PathFinderConfig) -> Self {
        Self { config }
    }

    /// Find up to `max_paths_per_pair` diverse paths from `start` to
    /// `target`. Unknown endpoints or an unreachable target yield an
    /// empty vec.
    pub fn find_paths(
        &self,
        graph: &KnowledgeGraph,
        query: &str,
        start: &str,
        target: &str,
        strategy: SearchStrategy,
    ) -> Vec<ReasoningPath> {
        if start == target
            || graph.get_concept(start).is_none()
            || graph.get_concept(target).is_none()
        {
            return Vec::new();
        }

        let started = Instant::now();
        let candidates = match strategy {
            SearchStrategy::BestFirst => self.best_first(graph, start, target),
            SearchStrategy::Breadth => self.breadth(graph, start, target),
            SearchStrategy::Bidirectional => self.bidirectional(graph, start, target),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let paths = self.diversify(candidates, query, elapsed_ms);
        trace!(
            start,
            target,
            ?strategy,
            found = paths.len(),
            "Path search finished"
        );
        paths
    }

    /// Proximity heuristic toward the target: the full value at the
    /// target itself, a flat bonus for direct neighbors, plus a capped
    /// per-shared-neighbor contribution.
    fn proximity(&self, graph: &KnowledgeGraph, concept: &str, target: &str) -> f32 {
        if concept == target {
            return self.config.target_proximity;
        }
        let target_neighbors = match graph.neighbors(target) {
            Some(n) => n,
            None => return 0.0,
        };

        let mut score = 0.0;
        if target_neighbors.contains(concept) {
            score += self.config.neighbor_proximity;
        }
        if let Some(own) = graph.neighbors(concept) {
            let shared = own.intersection(target_neighbors).count() as f32;
            score += (shared * self.config.shared_neighbor_step)
                .min(self.config.shared_neighbor_cap);
        }
        score
    }

    fn best_first(
        &self,
        graph: &KnowledgeGraph,
        start: &str,
        target: &str,
    ) -> Vec<(f32, Vec<ReasoningStep>)> {
        // Collect extras so the diversity filter has choices
        let want = self.config.max_paths_per_pair * 2;
        let mut found = Vec::new();

        let mut heap = BinaryHeap::new();
        heap.push(SearchState {
            priority: 1.0,
            confidence: 1.0,
            concept: start.to_string(),
            visited: HashSet::from([start.to_string()]),
            steps: Vec::new(),
        });

        while let Some(state) = heap.pop() {
            if state.concept == target {
                found.push((state.confidence, state.steps));
                if found.len() >= want {
                    break;
                }
                continue;
            }
            if state.steps.len() >= self.config.max_depth {
                continue;
            }
            self.expand(graph, &state, target, |next| heap.push(next));
        }

        found
    }

    fn breadth(
        &self,
        graph: &KnowledgeGraph,
        start: &str,
        target: &str,
    ) -> Vec<(f32, Vec<ReasoningStep>)> {
        let want = self.config.max_paths_per_pair * 2;
        let mut found = Vec::new();
        // Best propagated confidence per concept; weaker revisits are cut
        let mut best_seen: HashMap<ConceptId, f32> = HashMap::new();

        let mut queue = VecDeque::new();
        queue.push_back(SearchState {
            priority: 1.0,
            confidence: 1.0,
            concept: start.to_string(),
            visited: HashSet::from([start.to_string()]),
            steps: Vec::new(),
        });

        while let Some(state) = queue.pop_front() {
            if state.concept == target {
                found.push((state.confidence, state.steps));
                if found.len() >= want {
                    break;
                }
                continue;
            }
            if state.steps.len() >= self.config.max_depth {
                continue;
            }
            self.expand(graph, &state, target, |next| {
                let seen = best_seen.entry(next.concept.clone()).or_insert(0.0);
                if next.confidence > *seen || next.concept == target {
                    *seen = seen.max(next.confidence);
                    queue.push_back(next);
                }
            });
        }

        found
    }

    /// Half-depth searches from both endpoints, stitched where the
    /// frontiers meet.
    fn bidirectional(
        &self,
        graph: &KnowledgeGraph,
        start: &str,
        target: &str,
    ) -> Vec<(f32, Vec<ReasoningStep>)> {
        let half_depth = self.config.max_depth.div_ceil(2);
        let forward = self.reach(graph, start, half_depth);
        let backward = self.reach(graph, target, half_depth);

        let mut found = Vec::new();
        for (meeting, (f_conf, f_steps)) in &forward {
            if meeting == start {
                continue;
            }
            let Some((b_conf, b_steps)) = backward.get(meeting) else {
                continue;
            };

            // Reject stitches that revisit a concept on the other half
            let f_concepts: HashSet<&str> = f_steps
                .iter()
                .map(|s| s.source_concept.as_str())
                .collect();
            if b_steps
                .iter()
                .any(|s| f_concepts.contains(s.source_concept.as_str()))
            {
                continue;
            }

            let mut steps = f_steps.clone();
            // The backward half walked target -> meeting; reverse each
            // hop and the order to read meeting -> target
            for step in b_steps.iter().rev() {
                steps.push(ReasoningStep {
                    source_concept: step.target_concept.clone(),
                    relation: step.relation.clone(),
                    target_concept: step.source_concept.clone(),
                    confidence: step.confidence,
                    step_number: 0,
                });
            }
            if steps.is_empty() {
                continue;
            }
            for (i, step) in steps.iter_mut().enumerate() {
                step.step_number = i + 1;
            }

            let confidence = f_conf * b_conf;
            if confidence >= self.config.min_confidence {
                found.push((confidence, steps));
            }
        }

        found.sort_by(|a, b| b.0.total_cmp(&a.0));
        found.truncate(self.config.max_paths_per_pair * 2);
        found
    }

    /// Best partial path to every concept reachable within `depth` hops
    fn reach(
        &self,
        graph: &KnowledgeGraph,
        origin: &str,
        depth: usize,
    ) -> HashMap<ConceptId, (f32, Vec<ReasoningStep>)> {
        let mut best: HashMap<ConceptId, (f32, Vec<ReasoningStep>)> = HashMap::new();
        best.insert(origin.to_string(), (1.0, Vec::new()));

        let mut queue = VecDeque::new();
        queue.push_back(SearchState {
            priority: 1.0,
            confidence: 1.0,
            concept: origin.to_string(),
            visited: HashSet::from([origin.to_string()]),
            steps: Vec::new(),
        });

        while let Some(state) = queue.pop_front() {
            if state.steps.len() >= depth {
                continue;
            }
            self.expand(graph, &state, "", |next| {
                let entry = best
                    .entry(next.concept.clone())
                    .or_insert((0.0, Vec::new()));
                if next.confidence > entry.0 {
                    *entry = (next.confidence, next.steps.clone());
                    queue.push_back(next);
                }
            });
        }

        best
    }

    /// Push each admissible neighbor expansion of `state` through `emit`
    fn expand<F: FnMut(SearchState)>(
        &self,
        graph: &KnowledgeGraph,
        state: &SearchState,
        target: &str,
        mut emit: F,
    ) {
        let Some(neighbors) = graph.neighbors(&state.concept) else {
            return;
        };
        let Some(current) = graph.get_concept(&state.concept) else {
            return;
        };

        for neighbor in neighbors {
            if state.visited.contains(neighbor) {
                continue;
            }
            let Some(association) = graph.association_between(&state.concept, neighbor) else {
                continue;
            };
            let Some(next_concept) = graph.get_concept(neighbor) else {
                continue;
            };

            let confidence =
                state.confidence * association.confidence * self.config.hop_decay;
            if confidence < self.config.min_confidence {
                continue;
            }

            let mut steps = state.steps.clone();
            steps.push(ReasoningStep {
                source_concept: current.content.clone(),
                relation: association.assoc_type.as_str().to_string(),
                target_concept: next_concept.content.clone(),
                confidence,
                step_number: steps.len() + 1,
            });

            let mut visited = state.visited.clone();
            visited.insert(neighbor.clone());

            let priority = if target.is_empty() {
                confidence
            } else {
                confidence * (1.0 + self.proximity(graph, neighbor, target))
            };

            emit(SearchState {
                priority,
                confidence,
                concept: neighbor.clone(),
                visited,
                steps,
            });
        }
    }

    /// Keep the strongest paths whose step sets are sufficiently
    /// distinct from every already-kept path.
    fn diversify(
        &self,
        candidates: Vec<(f32, Vec<ReasoningStep>)>,
        query: &str,
        elapsed_ms: u64,
    ) -> Vec<ReasoningPath> {
        let paths = candidates
            .into_iter()
            .map(|(confidence, steps)| {
                let answer = steps
                    .last()
                    .map(|s| s.target_concept.clone())
                    .unwrap_or_default();
                ReasoningPath {
                    query: query.to_string(),
                    answer,
                    steps,
                    confidence,
                    elapsed_ms,
                }
            })
            .collect();
        self.select_diverse(paths, self.config.max_paths_per_pair)
    }

    /// Greedy diversity filter over any path set: strongest first, a
    /// candidate is dropped when its step-set overlap with an already
    /// kept path exceeds the configured maximum. Also applied across
    /// pairs so the combined result of a multi-pair search stays
    /// diverse.
    pub(crate) fn select_diverse(
        &self,
        mut paths: Vec<ReasoningPath>,
        limit: usize,
    ) -> Vec<ReasoningPath> {
        paths.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<ReasoningPath> = Vec::new();
        for path in paths {
            let keys = path.step_keys();
            let too_similar = kept
                .iter()
                .any(|k| jaccard(&keys, &k.step_keys()) > self.config.max_diversity_overlap);
            if !too_similar {
                kept.push(path);
            }
            if kept.len() >= limit {
                break;
            }
        }

        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognigraph_common::config::GraphConfig;
    use cognigraph_common::model::AssociationType;

    /// a - b - c chain plus a direct a - c shortcut
    fn chain_graph() -> (KnowledgeGraph, ConceptId, ConceptId, ConceptId) {
        let mut g = KnowledgeGraph::new(GraphConfig::default());
        let (a, _) = g.learn_concept("rain", None, None);
        let (b, _) = g.learn_concept("wet ground", None, None);
        let (c, _) = g.learn_concept("mud", None, None);
        g.add_association(&a, &b, AssociationType::Causal, 0.9);
        g.add_association(&b, &c, AssociationType::Causal, 0.9);
        (g, a, b, c)
    }

    fn finder() -> PathFinder {
        PathFinder::new(PathFinderConfig::default())
    }

    #[test]
    fn test_best_first_finds_two_hop_chain() {
        let (g, a, _, c) = chain_graph();
        let paths = finder().find_paths(&g, "q", &a, &c, SearchStrategy::BestFirst);

        assert!(!paths.is_empty());
        let path = &paths[0];
        assert_eq!(path.hop_count(), 2);
        assert_eq!(path.answer, "mud");
        assert_eq!(path.steps[0].relation, "causal");
        assert_eq!(path.steps[1].step_number, 2);
        // 0.9 * 0.85 per hop, twice
        let expected = 0.9 * 0.85 * 0.9 * 0.85;
        assert!((path.confidence - expected).abs() < 1e-4);
    }

    #[test]
    fn test_all_strategies_agree_on_simple_chain() {
        let (g, a, _, c) = chain_graph();
        for strategy in [
            SearchStrategy::BestFirst,
            SearchStrategy::Breadth,
            SearchStrategy::Bidirectional,
        ] {
            let paths = finder().find_paths(&g, "q", &a, &c, strategy);
            assert!(!paths.is_empty(), "{:?} found nothing", strategy);
            assert_eq!(paths[0].answer, "mud", "{:?}", strategy);
        }
    }

    #[test]
    fn test_unreachable_target_is_empty_not_error() {
        let (mut g, a, _, _) = chain_graph();
        let (isolated, _) = g.learn_concept("unrelated island", None, None);
        let paths = finder().find_paths(&g, "q", &a, &isolated, SearchStrategy::BestFirst);
        assert!(paths.is_empty());
    }

    #[test]
    fn test_unknown_concepts_are_empty() {
        let (g, a, _, _) = chain_graph();
        assert!(finder()
            .find_paths(&g, "q", &a, "missing", SearchStrategy::Breadth)
            .is_empty());
        assert!(finder()
            .find_paths(&g, "q", &a, &a, SearchStrategy::Breadth)
            .is_empty());
    }

    #[test]
    fn test_confidence_floor_prunes_weak_chains() {
        let mut g = KnowledgeGraph::new(GraphConfig::default());
        let (a, _) = g.learn_concept("start point", None, None);
        let (b, _) = g.learn_concept("weak middle", None, None);
        let (c, _) = g.learn_concept("end point", None, None);
        g.add_association(&a, &b, AssociationType::Semantic, 0.2);
        g.add_association(&b, &c, AssociationType::Semantic, 0.2);

        // 0.2 * 0.85 = 0.17 survives one hop but not two (0.029)
        let paths = finder().find_paths(&g, "q", &a, &c, SearchStrategy::BestFirst);
        assert!(paths.is_empty());
    }

    #[test]
    fn test_depth_limit_respected() {
        let mut g = KnowledgeGraph::new(GraphConfig::default());
        let ids: Vec<ConceptId> = (0..9)
            .map(|i| g.learn_concept(&format!("link number {}", i), None, None).0)
            .collect();
        for pair in ids.windows(2) {
            g.add_association(&pair[0], &pair[1], AssociationType::Causal, 1.0);
        }

        // 8 hops needed, max_depth is 6
        let paths = finder().find_paths(&g, "q", &ids[0], &ids[8], SearchStrategy::BestFirst);
        assert!(paths.is_empty());

        let paths = finder().find_paths(&g, "q", &ids[0], &ids[5], SearchStrategy::BestFirst);
        assert_eq!(paths[0].hop_count(), 5);
    }

    #[test]
    fn test_diverse_paths_returned() {
        let mut g = KnowledgeGraph::new(GraphConfig::default());
        let (a, _) = g.learn_concept("origin", None, None);
        let (z, _) = g.learn_concept("destination", None, None);
        // Three disjoint two-hop routes
        for i in 0..3 {
            let (mid, _) = g.learn_concept(&format!("route {}", i), None, None);
            g.add_association(&a, &mid, AssociationType::Semantic, 0.9);
            g.add_association(&mid, &z, AssociationType::Semantic, 0.9);
        }

        let paths = finder().find_paths(&g, "q", &a, &z, SearchStrategy::BestFirst);
        assert!(paths.len() >= 2);
        // No two kept paths share a hop
        for (i, p) in paths.iter().enumerate() {
            for q in &paths[i + 1..] {
                assert!(p.step_keys().is_disjoint(&q.step_keys()));
            }
        }
    }

    #[test]
    fn test_proximity_ladder() {
        let (g, a, b, c) = chain_graph();
        let f = finder();

        // 1.0 at the target itself, 0.5 for a direct neighbor, less for
        // anything further out
        assert!((f.proximity(&g, &c, &c) - 1.0).abs() < f32::EPSILON);
        assert!(f.proximity(&g, &b, &c) >= 0.5);
        assert!(f.proximity(&g, &a, &c) < 0.5);
    }

    #[test]
    fn test_bidirectional_stitches_at_meeting_point() {
        let mut g = KnowledgeGraph::new(GraphConfig::default());
        let ids: Vec<ConceptId> = (0..5)
            .map(|i| g.learn_concept(&format!("stage {}", i), None, None).0)
            .collect();
        for pair in ids.windows(2) {
            g.add_association(&pair[0], &pair[1], AssociationType::Temporal, 0.9);
        }

        let paths = finder().find_paths(&g, "q", &ids[0], &ids[4], SearchStrategy::Bidirectional);
        assert!(!paths.is_empty());
        let path = &paths[0];
        assert_eq!(path.hop_count(), 4);
        assert_eq!(path.steps[0].source_concept, "stage 0");
        assert_eq!(path.answer, "stage 4");
        // Step numbering is contiguous after stitching
        for (i, step) in path.steps.iter().enumerate() {
            assert_eq!(step.step_number, i + 1);
        }
    }
}
