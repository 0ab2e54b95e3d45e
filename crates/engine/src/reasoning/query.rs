//! Query processing: intent, relevance, strategy dispatch, consensus
//!
//! A query is answered by scoring concepts for relevance, expanding the
//! top seeds through high-confidence associations, searching for paths
//! between the resulting concept pairs with all three strategies, and
//! aggregating the paths into a consensus answer. Failure of any single
//! search is tolerated; only a total absence of concepts or paths
//! produces the zero-confidence answers.

use cognigraph_common::config::{AggregatorConfig, PathFinderConfig, QueryConfig};
use cognigraph_common::model::{ConceptId, ReasoningPath};
use cognigraph_common::text::tokenize;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

use super::{Alternative, MultiPathAggregator, PathFinder, SearchStrategy};
use crate::graph::KnowledgeGraph;

/// Advisory query intent; scales confidence through the complexity
/// factor but never gates an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Definition,
    Causal,
    Process,
    Examples,
    Comparative,
    Factual,
    Exploratory,
}

/// The complete answer to one query
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub confidence: f32,
    pub intent: QueryIntent,
    pub supporting_paths: usize,
    pub paths: Vec<ReasoningPath>,
    pub alternatives: Vec<Alternative>,
    /// How the answer and its confidence came about
    pub explanation: String,
    pub elapsed_ms: u64,
}

pub struct QueryProcessor {
    config: QueryConfig,
    pathfinder: PathFinder,
    aggregator: MultiPathAggregator,
}

impl QueryProcessor {
    pub fn new(
        config: QueryConfig,
        pathfinder: PathFinderConfig,
        aggregator: AggregatorConfig,
    ) -> Self {
        Self {
            config,
            pathfinder: PathFinder::new(pathfinder),
            aggregator: MultiPathAggregator::new(aggregator),
        }
    }

    /// Answer a query against the current graph. Read-only: access
    /// reinforcement is the caller's concern.
    pub fn process(&self, graph: &KnowledgeGraph, query: &str) -> QueryResponse {
        let started = Instant::now();
        let intent = classify_intent(query);
        let complexity = self.complexity_factor(query, intent);

        let scored = self.relevant_concepts(graph, query);
        if scored.is_empty() {
            return QueryResponse {
                query: query.to_string(),
                answer: "No relevant concepts found.".to_string(),
                confidence: 0.0,
                intent,
                supporting_paths: 0,
                paths: Vec::new(),
                alternatives: Vec::new(),
                explanation: "No concepts in the graph share words with the query."
                    .to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
        }

        let concepts = self.expand_context(graph, scored);

        // A single relevant concept cannot anchor a path search; answer
        // with the concept itself
        if concepts.len() < 2 {
            let (id, score) = &concepts[0];
            let answer = graph
                .get_concept(id)
                .map(|c| c.content.clone())
                .unwrap_or_default();
            return QueryResponse {
                query: query.to_string(),
                answer,
                confidence: (score * complexity).clamp(0.0, 1.0),
                intent,
                supporting_paths: 0,
                paths: Vec::new(),
                alternatives: Vec::new(),
                explanation: "Answered directly from the single matching concept; \
                              path search needs at least two."
                    .to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            };
        }

        let paths = self.collect_paths(graph, query, &concepts);
        let consensus = self.aggregator.aggregate(&paths);

        debug!(
            query,
            ?intent,
            concepts = concepts.len(),
            paths = paths.len(),
            confidence = consensus.confidence,
            "Processed query"
        );

        QueryResponse {
            query: query.to_string(),
            answer: consensus.answer,
            confidence: (consensus.confidence * complexity).clamp(0.0, 1.0),
            intent,
            supporting_paths: consensus.supporting_paths,
            paths,
            alternatives: consensus.alternatives,
            explanation: consensus.explanation,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Score every concept sharing a word with the query:
    /// overlap fraction, dampened strength, concept confidence.
    pub(crate) fn relevant_concepts(
        &self,
        graph: &KnowledgeGraph,
        query: &str,
    ) -> Vec<(ConceptId, f32)> {
        let query_words = tokenize(query);
        if query_words.is_empty() {
            return Vec::new();
        }

        let mut candidates: HashSet<ConceptId> = HashSet::new();
        for word in &query_words {
            if let Some(ids) = graph.concepts_for_word(word) {
                candidates.extend(ids.iter().cloned());
            }
        }

        let query_set: HashSet<&str> = query_words.iter().map(String::as_str).collect();
        let mut scored: Vec<(ConceptId, f32)> = candidates
            .into_iter()
            .filter_map(|id| {
                let concept = graph.get_concept(&id)?;
                let words = tokenize(&concept.content);
                let overlap = words
                    .iter()
                    .filter(|w| query_set.contains(w.as_str()))
                    .count() as f32
                    / query_words.len() as f32;
                let score = overlap * (concept.strength / 5.0).min(1.0) * concept.confidence;
                (score > 0.0).then_some((id, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.config.max_concepts);
        scored
    }

    /// Expand the top seeds one hop through high-confidence
    /// associations, up to the overall cap.
    pub(crate) fn expand_context(
        &self,
        graph: &KnowledgeGraph,
        scored: Vec<(ConceptId, f32)>,
    ) -> Vec<(ConceptId, f32)> {
        let mut included: HashSet<ConceptId> = scored.iter().map(|(id, _)| id.clone()).collect();
        let mut expanded = scored.clone();

        'seeds: for (seed, seed_score) in scored.iter().take(self.config.expansion_seeds) {
            let Some(neighbors) = graph.neighbors(seed) else {
                continue;
            };
            for neighbor in neighbors {
                if expanded.len() >= self.config.expansion_cap {
                    break 'seeds;
                }
                if included.contains(neighbor) {
                    continue;
                }
                let Some(association) = graph.association_between(seed, neighbor) else {
                    continue;
                };
                if association.confidence > self.config.expansion_confidence {
                    included.insert(neighbor.clone());
                    expanded.push((neighbor.clone(), seed_score * association.confidence));
                }
            }
        }

        expanded.sort_by(|a, b| b.1.total_cmp(&a.1));
        expanded
    }

    /// Search concept pairs with all three strategies, each strategy
    /// granted an even share of the path budget. An empty result from
    /// one pair or strategy just moves on to the next; the combined set
    /// is then filtered so any two returned paths stay diverse.
    pub(crate) fn collect_paths(
        &self,
        graph: &KnowledgeGraph,
        query: &str,
        concepts: &[(ConceptId, f32)],
    ) -> Vec<ReasoningPath> {
        let strategies = [
            SearchStrategy::BestFirst,
            SearchStrategy::Breadth,
            SearchStrategy::Bidirectional,
        ];
        let per_strategy = self.config.num_paths.div_ceil(strategies.len());
        let mut paths = Vec::new();

        'strategies: for strategy in strategies {
            let mut collected = 0usize;
            for (i, (start, _)) in concepts.iter().enumerate() {
                for (target, _) in concepts.iter().skip(i + 1) {
                    let found =
                        self.pathfinder.find_paths(graph, query, start, target, strategy);
                    collected += found.len();
                    paths.extend(found);
                    if collected >= per_strategy {
                        continue 'strategies;
                    }
                }
            }
        }

        // Per-pair diversity does not survive concatenation; filter the
        // combined set again
        self.pathfinder.select_diverse(paths, self.config.num_paths)
    }

    /// Confidence scale for the query's shape: long queries dilute word
    /// overlap, short definitional ones are easy, comparison and
    /// causation are hard.
    pub(crate) fn complexity_factor(&self, query: &str, intent: QueryIntent) -> f32 {
        let words = tokenize(query).len();
        let mut factor = if words <= self.config.long_query_words {
            1.0
        } else {
            (self.config.long_query_words as f32 / words as f32).max(0.5)
        };
        match intent {
            QueryIntent::Definition if words <= self.config.long_query_words => {
                factor *= self.config.definitional_boost;
            }
            QueryIntent::Causal | QueryIntent::Comparative => {
                factor *= self.config.analytic_penalty;
            }
            _ => {}
        }
        factor
    }

    pub(crate) fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub(crate) fn pathfinder(&self) -> &PathFinder {
        &self.pathfinder
    }

    pub(crate) fn aggregator(&self) -> &MultiPathAggregator {
        &self.aggregator
    }
}

/// Keyword-based intent classification: what the query is seeking
pub(crate) fn classify_intent(query: &str) -> QueryIntent {
    let lower = query.to_lowercase();
    if lower.starts_with("what is ")
        || lower.starts_with("what are ")
        || lower.contains("define")
        || lower.contains("meaning of")
    {
        QueryIntent::Definition
    } else if lower.contains("why") || lower.contains("cause") || lower.contains("because") {
        QueryIntent::Causal
    } else if lower.starts_with("how ")
        || lower.contains("process")
        || lower.contains("steps")
    {
        QueryIntent::Process
    } else if lower.contains("example") || lower.contains("such as") {
        QueryIntent::Examples
    } else if lower.contains("compare")
        || lower.contains("versus")
        || lower.contains(" vs ")
        || lower.contains("difference")
    {
        QueryIntent::Comparative
    } else if ["what", "who", "when", "where", "which", "is ", "are ", "does "]
        .iter()
        .any(|prefix| lower.starts_with(prefix))
        || lower.ends_with('?')
    {
        QueryIntent::Factual
    } else {
        QueryIntent::Exploratory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognigraph_common::config::GraphConfig;
    use cognigraph_common::model::AssociationType;

    fn processor() -> QueryProcessor {
        QueryProcessor::new(
            QueryConfig::default(),
            PathFinderConfig::default(),
            AggregatorConfig::default(),
        )
    }

    #[test]
    fn test_empty_graph_yields_zero_confidence() {
        let graph = KnowledgeGraph::new(GraphConfig::default());
        let response = processor().process(&graph, "What is the meaning of life?");

        assert_eq!(response.confidence, 0.0);
        assert!(response.answer.contains("No relevant concepts"));
        assert!(response.paths.is_empty());
    }

    #[test]
    fn test_single_concept_direct_answer() {
        let mut graph = KnowledgeGraph::new(GraphConfig::default());
        graph.learn_concept("gravity pulls objects down", None, None);

        let response = processor().process(&graph, "gravity");
        assert_eq!(response.answer, "gravity pulls objects down");
        assert!(response.confidence > 0.0);
        assert_eq!(response.supporting_paths, 0);
    }

    #[test]
    fn test_two_hop_causal_chain_answered() {
        let mut graph = KnowledgeGraph::new(GraphConfig::default());
        let (rain, _) = graph.learn_concept("rain", None, None);
        let (wet, _) = graph.learn_concept("wet roads", None, None);
        let (crash, _) = graph.learn_concept("accidents", None, None);
        graph.add_association(&rain, &wet, AssociationType::Causal, 0.9);
        graph.add_association(&wet, &crash, AssociationType::Causal, 0.9);

        let response = processor().process(&graph, "rain wet roads");
        assert!(response.confidence > 0.0);
        assert!(!response.paths.is_empty());
    }

    #[test]
    fn test_expansion_pulls_in_strong_neighbors() {
        let mut graph = KnowledgeGraph::new(GraphConfig::default());
        let (sky, _) = graph.learn_concept("sky", None, None);
        let (blue, _) = graph.learn_concept("blue", None, None);
        graph.add_association(&sky, &blue, AssociationType::Semantic, 0.9);

        // "blue" shares no word with the query; only expansion reaches it
        let response = processor().process(&graph, "sky");
        assert!(response.confidence > 0.0);
        assert!(response.answer.contains("blue") || response.answer.contains("sky"));
    }

    #[test]
    fn test_intent_classification() {
        assert_eq!(classify_intent("What is gravity?"), QueryIntent::Definition);
        assert_eq!(classify_intent("Why does ice float?"), QueryIntent::Causal);
        assert_eq!(classify_intent("How does rain form?"), QueryIntent::Process);
        assert_eq!(
            classify_intent("Give an example of a mammal"),
            QueryIntent::Examples
        );
        assert_eq!(
            classify_intent("Compare cats and dogs"),
            QueryIntent::Comparative
        );
        assert_eq!(
            classify_intent("What color is the sky?"),
            QueryIntent::Factual
        );
        assert_eq!(classify_intent("tell me about oceans"), QueryIntent::Exploratory);
    }

    #[test]
    fn test_long_query_penalized() {
        let p = processor();
        let short = p.complexity_factor("short query", QueryIntent::Factual);
        let long = p.complexity_factor(
            "this is an extremely long and rambling query with very many words that dilute overlap",
            QueryIntent::Factual,
        );
        assert!((short - 1.0).abs() < f32::EPSILON);
        assert!(long < 1.0);
        assert!(long >= 0.5);
    }

    #[test]
    fn test_intent_scales_complexity() {
        let p = processor();
        let definition = p.complexity_factor("what is rain", QueryIntent::Definition);
        let causal = p.complexity_factor("why does it rain", QueryIntent::Causal);
        let comparative =
            p.complexity_factor("rain versus snow", QueryIntent::Comparative);
        let factual = p.complexity_factor("does it rain", QueryIntent::Factual);

        assert!(definition > factual);
        assert!(causal < factual);
        assert!(comparative < factual);
    }

    #[test]
    fn test_combined_paths_stay_diverse() {
        let mut graph = KnowledgeGraph::new(GraphConfig::default());
        let ids: Vec<_> = ["alpha", "xray", "yankee", "zulu", "echo"]
            .iter()
            .map(|w| graph.learn_concept(w, None, None).0)
            .collect();
        for pair in ids.windows(2) {
            graph.add_association(&pair[0], &pair[1], AssociationType::Causal, 0.9);
        }

        // Three relevant concepts on one chain; per-pair searches share
        // long suffixes, which the combined filter must reject
        let response = processor().process(&graph, "alpha xray echo");
        let overlap_limit = PathFinderConfig::default().max_diversity_overlap;
        for (i, p) in response.paths.iter().enumerate() {
            for q in &response.paths[i + 1..] {
                assert!(
                    crate::reasoning::jaccard(&p.step_keys(), &q.step_keys())
                        <= overlap_limit
                );
            }
        }
    }

    #[test]
    fn test_no_concept_response_carries_explanation() {
        let graph = KnowledgeGraph::new(GraphConfig::default());
        let response = processor().process(&graph, "completely unknown topic");
        assert!(!response.explanation.is_empty());
        assert_eq!(response.confidence, 0.0);
    }
}
