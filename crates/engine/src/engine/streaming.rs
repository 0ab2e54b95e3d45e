//! Streaming query mode
//!
//! Emits progressive answer chunks over a channel while the query is
//! processed: a preliminary guess from the most relevant concept, a
//! refinement after every pair search that discovers paths, the
//! consensus answer, and a final completion marker. `paths_found` never
//! decreases across chunks and only the last chunk sets `is_final`.

use cognigraph_common::model::ReasoningPath;
use cognigraph_common::text::tokenize;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use super::ReasoningEngine;
use crate::reasoning::{classify_intent, SearchStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStage {
    Initial,
    Refining,
    Consensus,
    Complete,
}

/// One progressive update during a streamed query
#[derive(Debug, Clone, Serialize)]
pub struct StreamChunk {
    pub stage: StreamStage,
    pub answer: String,
    pub confidence: f32,
    pub paths_found: usize,
    pub is_final: bool,
}

fn chunk(stage: StreamStage, answer: String, confidence: f32, paths_found: usize) -> StreamChunk {
    StreamChunk {
        stage,
        answer,
        confidence,
        paths_found,
        is_final: stage == StreamStage::Complete,
    }
}

impl ReasoningEngine {
    /// Process a query while streaming intermediate chunks: path
    /// discovery is interleaved with delivery, so a `Refining` chunk
    /// follows every pair search that found paths. Dropping the
    /// receiver stops the search at the next yield. The streamed
    /// pipeline is read-only: it neither reinforces concepts nor
    /// populates the query cache.
    pub fn stream_query(self: &Arc<Self>, query: &str) -> ReceiverStream<StreamChunk> {
        let (tx, rx) = mpsc::channel(8);
        let engine = Arc::clone(self);
        let query = query.to_string();

        tokio::spawn(async move {
            let preliminary = engine.preliminary_answer(&query).await;
            let opening = chunk(
                StreamStage::Initial,
                preliminary.unwrap_or_else(|| "Gathering relevant concepts".to_string()),
                0.0,
                0,
            );
            if tx.send(opening).await.is_err() {
                return;
            }

            let processor = &engine.processor;
            let graph = engine.graph.read().await;
            let intent = classify_intent(&query);
            let complexity = processor.complexity_factor(&query, intent);

            let scored = processor.relevant_concepts(&graph, &query);
            if scored.is_empty() {
                let _ = tx
                    .send(chunk(
                        StreamStage::Complete,
                        "No relevant concepts found.".to_string(),
                        0.0,
                        0,
                    ))
                    .await;
                return;
            }

            let concepts = processor.expand_context(&graph, scored);
            if concepts.len() < 2 {
                let (id, score) = &concepts[0];
                let answer = graph
                    .get_concept(id)
                    .map(|c| c.content.clone())
                    .unwrap_or_default();
                let _ = tx
                    .send(chunk(
                        StreamStage::Complete,
                        answer,
                        (score * complexity).clamp(0.0, 1.0),
                        0,
                    ))
                    .await;
                return;
            }

            let strategies = [
                SearchStrategy::BestFirst,
                SearchStrategy::Breadth,
                SearchStrategy::Bidirectional,
            ];
            let per_strategy = processor.config().num_paths.div_ceil(strategies.len());
            let mut discovered: Vec<ReasoningPath> = Vec::new();

            'strategies: for strategy in strategies {
                let mut collected = 0usize;
                for (i, (start, _)) in concepts.iter().enumerate() {
                    for (target, _) in concepts.iter().skip(i + 1) {
                        let found = processor
                            .pathfinder()
                            .find_paths(&graph, &query, start, target, strategy);
                        if !found.is_empty() {
                            collected += found.len();
                            discovered.extend(found);
                            let best = discovered
                                .iter()
                                .max_by(|a, b| a.confidence.total_cmp(&b.confidence));
                            if let Some(best) = best {
                                let refinement = chunk(
                                    StreamStage::Refining,
                                    best.answer.clone(),
                                    best.confidence,
                                    discovered.len(),
                                );
                                // Receiver gone; stop searching
                                if tx.send(refinement).await.is_err() {
                                    return;
                                }
                            }
                        }
                        if collected >= per_strategy {
                            continue 'strategies;
                        }
                    }
                }
            }

            let paths_found = discovered.len();
            let paths = processor
                .pathfinder()
                .select_diverse(discovered, processor.config().num_paths);
            let consensus = processor.aggregator().aggregate(&paths);
            let confidence = (consensus.confidence * complexity).clamp(0.0, 1.0);

            if tx
                .send(chunk(
                    StreamStage::Consensus,
                    consensus.answer.clone(),
                    confidence,
                    paths_found,
                ))
                .await
                .is_err()
            {
                return;
            }

            debug!(query = %query, paths_found, "Streamed query complete");
            let _ = tx
                .send(chunk(
                    StreamStage::Complete,
                    consensus.answer,
                    confidence,
                    paths_found,
                ))
                .await;
        });

        ReceiverStream::new(rx)
    }

    /// Content of the concept with the strongest word overlap with the
    /// query, if any.
    async fn preliminary_answer(&self, query: &str) -> Option<String> {
        let graph = self.graph.read().await;
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for word in tokenize(query) {
            if let Some(ids) = graph.concepts_for_word(&word) {
                for id in ids {
                    if let Some(concept) = graph.get_concept(id) {
                        *counts.entry(concept.content.as_str()).or_insert(0) += 1;
                    }
                }
            }
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(content, _)| content.to_string())
    }
}
