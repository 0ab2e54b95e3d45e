//! Parallel extraction over worker tasks
//!
//! Batches at or above the configured threshold fan out across tokio
//! tasks. Workers run the pure analysis step only; findings are merged
//! into the graph on the calling task, so the graph never crosses a
//! thread boundary. Any worker failure falls back to the sequential
//! path for the whole batch.

use cognigraph_common::config::ExtractionConfig;
use cognigraph_common::model::ConceptId;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AssociationExtractor, ExtractionReport, Finding};
use crate::graph::KnowledgeGraph;

/// One unit of extraction work: raw content, the host concept it was
/// learned as, and whether the deep co-occurrence pass applies
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub content: String,
    pub host: Option<ConceptId>,
    pub deep: bool,
}

pub struct ParallelExtractor {
    extractor: Arc<AssociationExtractor>,
    threshold: usize,
    workers: usize,
}

impl ParallelExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        let workers = if config.workers > 0 {
            config.workers
        } else {
            num_cpus::get().saturating_sub(1).max(1)
        };
        let threshold = config.parallel_threshold.max(1);
        Self {
            extractor: Arc::new(AssociationExtractor::new(config)),
            threshold,
            workers,
        }
    }

    /// The underlying sequential extractor, for single-item learning
    pub fn extractor(&self) -> &AssociationExtractor {
        &self.extractor
    }

    /// Extract a batch. Small batches stay on the calling task; large
    /// ones fan out, then merge single-threaded. Output is identical to
    /// the sequential path regardless of which route ran.
    pub async fn extract_batch(
        &self,
        graph: &mut KnowledgeGraph,
        items: &[BatchItem],
    ) -> ExtractionReport {
        if items.len() < self.threshold {
            return self.extract_sequential(graph, items);
        }

        match self.analyze_parallel(items).await {
            Some(analyzed) => {
                debug!(
                    items = items.len(),
                    workers = self.workers,
                    "Merging parallel extraction findings"
                );
                let mut report = ExtractionReport::default();
                for (host, findings) in &analyzed {
                    let partial = self.extractor.apply(graph, host.as_deref(), findings);
                    report.concepts_created += partial.concepts_created;
                    report.associations_created += partial.associations_created;
                    report.associations_reinforced += partial.associations_reinforced;
                }
                report
            }
            None => {
                warn!("Worker task failed; retrying batch sequentially");
                self.extract_sequential(graph, items)
            }
        }
    }

    fn extract_sequential(
        &self,
        graph: &mut KnowledgeGraph,
        items: &[BatchItem],
    ) -> ExtractionReport {
        let mut report = ExtractionReport::default();
        for item in items {
            let partial =
                self.extractor
                    .extract(graph, item.host.as_deref(), &item.content, item.deep);
            report.concepts_created += partial.concepts_created;
            report.associations_created += partial.associations_created;
            report.associations_reinforced += partial.associations_reinforced;
        }
        report
    }

    /// Fan the analysis out across worker tasks. Returns None if any
    /// worker was cancelled or panicked.
    async fn analyze_parallel(
        &self,
        items: &[BatchItem],
    ) -> Option<Vec<(Option<ConceptId>, Vec<Finding>)>> {
        let chunk_size = items.len().div_ceil(self.workers).max(1);
        let handles: Vec<_> = items
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let extractor = Arc::clone(&self.extractor);
                tokio::spawn(async move {
                    chunk
                        .into_iter()
                        .map(|item| {
                            let findings = extractor.analyze(&item.content, item.deep);
                            (item.host, findings)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut analyzed = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(partial) => analyzed.extend(partial),
                Err(error) => {
                    warn!(%error, "Extraction worker task did not complete");
                    return None;
                }
            }
        }
        Some(analyzed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognigraph_common::config::GraphConfig;

    fn items(n: usize) -> Vec<BatchItem> {
        (0..n)
            .map(|i| BatchItem {
                content: format!("event{} causes outcome{}.", i, i),
                host: None,
                deep: false,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_small_batch_stays_sequential() {
        let ex = ParallelExtractor::new(ExtractionConfig::default());
        let mut graph = KnowledgeGraph::new(GraphConfig::default());

        let report = ex.extract_batch(&mut graph, &items(3)).await;
        assert_eq!(report.concepts_created, 6);
        assert_eq!(report.associations_created, 3);
    }

    #[tokio::test]
    async fn test_large_batch_fans_out() {
        let config = ExtractionConfig {
            parallel_threshold: 10,
            workers: 4,
            ..ExtractionConfig::default()
        };
        let ex = ParallelExtractor::new(config);
        let mut graph = KnowledgeGraph::new(GraphConfig::default());

        let report = ex.extract_batch(&mut graph, &items(40)).await;
        assert_eq!(report.concepts_created, 80);
        assert_eq!(report.associations_created, 40);
        assert_eq!(graph.stats().association_count, 40);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential_output() {
        let batch = items(30);

        let parallel_cfg = ExtractionConfig {
            parallel_threshold: 1,
            workers: 3,
            ..ExtractionConfig::default()
        };
        let sequential_cfg = ExtractionConfig {
            parallel_threshold: usize::MAX,
            ..ExtractionConfig::default()
        };

        let mut parallel_graph = KnowledgeGraph::new(GraphConfig::default());
        let mut sequential_graph = KnowledgeGraph::new(GraphConfig::default());

        ParallelExtractor::new(parallel_cfg)
            .extract_batch(&mut parallel_graph, &batch)
            .await;
        ParallelExtractor::new(sequential_cfg)
            .extract_batch(&mut sequential_graph, &batch)
            .await;

        assert_eq!(parallel_graph.stats(), sequential_graph.stats());
    }

    #[tokio::test]
    async fn test_duplicate_items_reinforce() {
        let config = ExtractionConfig {
            parallel_threshold: 2,
            workers: 2,
            ..ExtractionConfig::default()
        };
        let ex = ParallelExtractor::new(config);
        let mut graph = KnowledgeGraph::new(GraphConfig::default());

        let batch: Vec<BatchItem> = (0..20)
            .map(|_| BatchItem {
                content: "heat causes expansion.".to_string(),
                host: None,
                deep: false,
            })
            .collect();

        let report = ex.extract_batch(&mut graph, &batch).await;
        assert_eq!(report.concepts_created, 2);
        assert_eq!(report.associations_created, 1);
        assert_eq!(report.associations_reinforced, 19);
    }
}
