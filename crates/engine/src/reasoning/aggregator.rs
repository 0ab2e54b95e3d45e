//! Multi-path consensus aggregation
//!
//! Candidate answers from independent reasoning paths are normalized to
//! word sets and clustered by overlap. Each cluster is scored by path
//! confidence, its share of all paths, a consensus boost, an outlier
//! penalty, and a bonus for reaching the same answer through distinct
//! relation sequences. The strongest cluster wins; runners-up are kept
//! as alternatives.

use cognigraph_common::config::AggregatorConfig;
use cognigraph_common::model::ReasoningPath;
use cognigraph_common::text::tokenize;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use super::jaccard;

/// A runner-up answer
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Alternative {
    pub answer: String,
    pub confidence: f32,
    pub supporting_paths: usize,
}

/// The aggregated outcome of a multi-path search
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConsensusResult {
    pub answer: String,
    pub confidence: f32,
    /// Fraction of all paths backing the winning answer
    pub consensus_strength: f32,
    pub supporting_paths: usize,
    pub total_paths: usize,
    pub alternatives: Vec<Alternative>,
    /// Human-readable rationale for the confidence score
    pub explanation: String,
}

impl ConsensusResult {
    /// The zero-confidence result for a search that produced no paths
    pub fn no_paths() -> Self {
        Self {
            answer: "No reasoning path found.".to_string(),
            confidence: 0.0,
            consensus_strength: 0.0,
            supporting_paths: 0,
            total_paths: 0,
            alternatives: Vec::new(),
            explanation: "No reasoning paths were found between the relevant concepts."
                .to_string(),
        }
    }
}

struct Cluster {
    representative: HashSet<String>,
    paths: Vec<usize>,
}

/// Scoring breakdown for one cluster, kept for the explanation
struct ClusterScore {
    weight: f32,
    share: f32,
    boosted: bool,
    penalized: bool,
    distinct_routes: usize,
}

pub struct MultiPathAggregator {
    config: AggregatorConfig,
}

impl MultiPathAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    /// Aggregate paths into a single consensus answer. An empty input is
    /// a normal outcome and yields the zero-confidence result.
    pub fn aggregate(&self, paths: &[ReasoningPath]) -> ConsensusResult {
        if paths.is_empty() {
            return ConsensusResult::no_paths();
        }

        let clusters = self.cluster(paths);
        let mut scored: Vec<(ClusterScore, &Cluster)> = clusters
            .iter()
            .map(|c| (self.consensus_weight(c, paths, clusters.len()), c))
            .collect();
        scored.sort_by(|a, b| b.0.weight.total_cmp(&a.0.weight));

        let (winner_score, winner) = &scored[0];
        let answer = self.cluster_answer(winner, paths);
        let explanation = explain(winner_score, winner.paths.len(), paths.len(), clusters.len());

        let alternatives = scored
            .iter()
            .skip(1)
            .take(self.config.max_alternatives)
            .map(|(score, cluster)| Alternative {
                answer: self.cluster_answer(cluster, paths),
                confidence: score.weight.clamp(0.0, 1.0),
                supporting_paths: cluster.paths.len(),
            })
            .collect();

        debug!(
            clusters = clusters.len(),
            paths = paths.len(),
            confidence = winner_score.weight,
            "Aggregated consensus"
        );

        ConsensusResult {
            answer,
            confidence: winner_score.weight.clamp(0.0, 1.0),
            consensus_strength: winner_score.share,
            supporting_paths: winner.paths.len(),
            total_paths: paths.len(),
            alternatives,
            explanation,
        }
    }

    /// Greedy clustering by normalized-answer overlap against each
    /// cluster's representative set.
    fn cluster(&self, paths: &[ReasoningPath]) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for (i, path) in paths.iter().enumerate() {
            let words: HashSet<String> = tokenize(&path.answer).into_iter().collect();
            match clusters
                .iter_mut()
                .find(|c| jaccard(&c.representative, &words) > self.config.cluster_overlap)
            {
                Some(cluster) => cluster.paths.push(i),
                None => clusters.push(Cluster {
                    representative: words,
                    paths: vec![i],
                }),
            }
        }

        clusters
    }

    /// consensus_weight = confidence * path_share * boost * outlier
    /// penalty * diversity bonus
    fn consensus_weight(
        &self,
        cluster: &Cluster,
        paths: &[ReasoningPath],
        cluster_count: usize,
    ) -> ClusterScore {
        let members: Vec<&ReasoningPath> = cluster.paths.iter().map(|&i| &paths[i]).collect();

        let confidence = members
            .iter()
            .map(|p| p.confidence)
            .fold(0.0f32, f32::max);
        let path_share = members.len() as f32 / paths.len() as f32;

        // A single path never constitutes a consensus, whatever its share
        let boosted =
            path_share >= self.config.consensus_threshold && members.len() >= 2;
        let boost = if boosted { self.config.consensus_boost } else { 1.0 };

        let penalized = members.len() == 1 && cluster_count > 1;
        let outlier = if penalized { self.config.outlier_penalty } else { 1.0 };

        // Same answer via different relation sequences argues for it
        let distinct_sequences: HashSet<Vec<String>> =
            members.iter().map(|p| p.relation_sequence()).collect();
        let diversity_fraction =
            (distinct_sequences.len().saturating_sub(1)) as f32 / members.len() as f32;
        let diversity = 1.0 + self.config.max_diversity_bonus * diversity_fraction.min(1.0);

        ClusterScore {
            weight: confidence * path_share * boost * outlier * diversity,
            share: path_share,
            boosted,
            penalized,
            distinct_routes: distinct_sequences.len(),
        }
    }

    /// The cluster's answer is the one on its most confident path
    fn cluster_answer(&self, cluster: &Cluster, paths: &[ReasoningPath]) -> String {
        cluster
            .paths
            .iter()
            .map(|&i| &paths[i])
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|p| p.answer.clone())
            .unwrap_or_default()
    }
}

/// Rationale for the winning cluster's score
fn explain(score: &ClusterScore, supporting: usize, total: usize, clusters: usize) -> String {
    let mut parts = vec![format!(
        "{} of {} paths agree across {} answer clusters",
        supporting, total, clusters
    )];
    if score.boosted {
        parts.push("majority consensus boost applied".to_string());
    }
    if score.penalized {
        parts.push("outlier penalty applied".to_string());
    }
    if score.distinct_routes > 1 {
        parts.push(format!(
            "{} distinct relation routes reach this answer",
            score.distinct_routes
        ));
    }
    format!("{}.", parts.join("; "))
}
