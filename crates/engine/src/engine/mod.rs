//! Engine façade
//!
//! `ReasoningEngine` wires the graph, vector index, extraction pipeline,
//! query processor, cache, and collaborators together behind one async
//! surface. Lock order is graph, then index, then cache; no method holds
//! more than one lock at a time.
//!
//! Provides:
//! - `learn` / `learn_batch`: idempotent knowledge ingestion
//! - `ask`: cached multi-path reasoning queries
//! - `search_concepts`: fused lexical + semantic concept lookup
//! - `decay_and_prune`, `save_to_file` / `load_from_file`, `stats`

mod streaming;

pub use streaming::{StreamChunk, StreamStage};

use cognigraph_common::config::EngineConfig;
use cognigraph_common::errors::{EngineError, Result};
use cognigraph_common::model::{concept_id, Association, ConceptId, KnowledgeBaseFile};
use cognigraph_common::storage::StorageBackend;
use cognigraph_common::text::{tokenize, TextAnalyzer};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::cache::{CacheStats, QueryCache};
use crate::contradiction::{Contradiction, ContradictionResolver};
use crate::extraction::{AdaptiveLearner, BatchItem, ExtractionReport, ParallelExtractor};
use crate::graph::{KnowledgeGraph, PruneReport};
use crate::index::VectorIndex;
use crate::reasoning::{QueryProcessor, QueryResponse};

/// Reciprocal-rank-fusion constant for `search_concepts`
const RRF_K: f32 = 60.0;

/// Result of learning one piece of content
#[derive(Debug, Clone)]
pub struct LearnOutcome {
    pub concept_id: ConceptId,
    pub created: bool,
    pub extraction: ExtractionReport,
    pub contradictions: Vec<Contradiction>,
}

/// Result of a batch learn; per-item failures do not abort the batch
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLearnReport {
    pub learned: usize,
    pub failed: usize,
    pub extraction: ExtractionReport,
}

/// One hit from `search_concepts`
#[derive(Debug, Clone, Serialize)]
pub struct ConceptHit {
    pub id: ConceptId,
    pub content: String,
    pub score: f32,
}

/// Engine-wide statistics snapshot
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub concepts: usize,
    pub associations: usize,
    pub indexed: usize,
    pub cache: CacheStats,
}

pub struct ReasoningEngine {
    config: EngineConfig,
    storage: Arc<dyn StorageBackend>,
    analyzer: Arc<dyn TextAnalyzer>,
    graph: RwLock<KnowledgeGraph>,
    index: RwLock<VectorIndex>,
    cache: Mutex<QueryCache>,
    processor: QueryProcessor,
    extractor: ParallelExtractor,
    learner: AdaptiveLearner,
    resolver: ContradictionResolver,
}

impl ReasoningEngine {
    /// Build an engine. Fails fast on invalid configuration or an
    /// analyzer whose embedding dimension disagrees with the index.
    pub fn new(
        config: EngineConfig,
        storage: Arc<dyn StorageBackend>,
        analyzer: Arc<dyn TextAnalyzer>,
    ) -> Result<Self> {
        config.validate()?;
        if analyzer.embedding_dimension() != config.index.dimension {
            return Err(EngineError::DimensionMismatch {
                expected: config.index.dimension,
                actual: analyzer.embedding_dimension(),
            });
        }

        let index = VectorIndex::new(config.index.clone())?;
        let cache = QueryCache::new(config.cache.max_size, config.cache_ttl());

        Ok(Self {
            processor: QueryProcessor::new(
                config.query.clone(),
                config.pathfinder.clone(),
                config.aggregator.clone(),
            ),
            extractor: ParallelExtractor::new(config.extraction.clone()),
            learner: AdaptiveLearner::new(config.extraction.clone()),
            resolver: ContradictionResolver::new(),
            graph: RwLock::new(KnowledgeGraph::new(config.graph.clone())),
            index: RwLock::new(index),
            cache: Mutex::new(cache),
            storage,
            analyzer,
            config,
        })
    }

    /// Rehydrate graph and index from the storage backend. Returns the
    /// number of concepts loaded.
    ///
    /// Storage holds explicitly learned statements and the associations
    /// created while learning them, not the word concepts extracted
    /// from inside statements. Bootstrapping therefore restores a
    /// sparser graph than `load_from_file`; use the knowledge-base
    /// snapshot when full fidelity matters.
    pub async fn bootstrap(&self) -> Result<usize> {
        let ids = self.storage.get_all_concept_ids().await?;

        let mut concepts = Vec::new();
        let mut embeddings = Vec::new();
        for id in &ids {
            let Some(concept) = self.storage.get_concept(id).await? else {
                continue;
            };
            if let Some(embedding) = self.storage.get_embedding(id).await? {
                embeddings.push((concept.id.clone(), embedding));
            }
            concepts.push(concept);
        }

        let mut associations = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for id in &ids {
            for neighbor in self.storage.get_neighbors(id).await? {
                for (a, b) in [(id.as_str(), neighbor.as_str()), (neighbor.as_str(), id.as_str())]
                {
                    if let Some(assoc) = self.storage.get_association(a, b).await? {
                        if seen.insert(assoc.key()) {
                            associations.push(assoc);
                        }
                    }
                }
            }
        }

        let loaded = concepts.len();
        {
            let mut graph = self.graph.write().await;
            for concept in concepts {
                graph.insert_concept(concept);
            }
            for association in associations {
                graph.insert_association(association);
            }
        }
        {
            let mut index = self.index.write().await;
            for (id, embedding) in embeddings {
                index.insert(&id, embedding)?;
            }
        }

        info!(concepts = loaded, "Bootstrapped engine from storage");
        Ok(loaded)
    }

    /// Learn one piece of content: create or reinforce the concept,
    /// extract associations, index the embedding, persist, and
    /// invalidate affected cached answers.
    pub async fn learn(
        &self,
        content: &str,
        source: Option<&str>,
        category: Option<&str>,
    ) -> Result<LearnOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return Err(EngineError::Validation {
                message: "cannot learn empty content".to_string(),
            });
        }

        let embedding = self.analyzer.get_embedding(content).await?;

        let (outcome, concept, host_associations) = {
            let mut graph = self.graph.write().await;
            let (id, created) = graph.learn_concept(content, source, category);

            let strength = graph.get_concept(&id).map(|c| c.strength).unwrap_or(1.0);
            let plan = self.learner.plan(strength);
            graph.boost_strength(&id, plan.extra_reinforcement);

            let extraction = self.extractor.extractor().extract(
                &mut graph,
                Some(&id),
                content,
                plan.deep_extraction,
            );

            let concept = graph.get_concept(&id).cloned().ok_or_else(|| {
                EngineError::Internal {
                    message: format!("learned concept {} missing from graph", id),
                }
            })?;
            let contradictions = self.resolver.detect_for(&graph, &concept);

            let host_associations: Vec<Association> = graph
                .associations()
                .filter(|a| a.source_id == id || a.target_id == id)
                .cloned()
                .collect();

            (
                LearnOutcome {
                    concept_id: id,
                    created,
                    extraction,
                    contradictions,
                },
                concept,
                host_associations,
            )
        };

        if let Some(embedding) = embedding.clone() {
            self.index.write().await.insert(&outcome.concept_id, embedding)?;
        }

        self.storage.add_concept(concept, embedding).await?;
        for association in host_associations {
            self.storage.add_association(association).await?;
        }

        let words: HashSet<String> = tokenize(content).into_iter().collect();
        self.cache.lock().await.invalidate_intersecting(&words);

        if !outcome.contradictions.is_empty() {
            warn!(
                concept = %outcome.concept_id,
                count = outcome.contradictions.len(),
                "Learned content contradicts existing knowledge"
            );
        }
        Ok(outcome)
    }

    /// Learn many items. Extraction runs through the parallel pipeline;
    /// per-item storage failures are counted and skipped, never fatal
    /// for the batch.
    pub async fn learn_batch(&self, contents: &[String]) -> Result<BatchLearnReport> {
        let mut report = BatchLearnReport::default();
        let embeddings = match self.analyzer.embed_batch(contents).await {
            Ok(embeddings) => embeddings,
            Err(error) => {
                warn!(%error, "Batch embedding failed; learning without vectors");
                vec![None; contents.len()]
            }
        };

        let mut items: Vec<BatchItem> = Vec::with_capacity(contents.len());
        let mut hosts: Vec<Option<ConceptId>> = Vec::with_capacity(contents.len());
        let mut words: HashSet<String> = HashSet::new();

        {
            let mut graph = self.graph.write().await;
            for content in contents {
                let content = content.trim();
                if content.is_empty() {
                    report.failed += 1;
                    hosts.push(None);
                    continue;
                }
                let (id, _) = graph.learn_concept(content, None, None);
                let strength = graph.get_concept(&id).map(|c| c.strength).unwrap_or(1.0);
                let plan = self.learner.plan(strength);
                graph.boost_strength(&id, plan.extra_reinforcement);
                items.push(BatchItem {
                    content: content.to_string(),
                    host: Some(id.clone()),
                    deep: plan.deep_extraction,
                });
                hosts.push(Some(id));
                words.extend(tokenize(content));
                report.learned += 1;
            }

            report.extraction = self.extractor.extract_batch(&mut graph, &items).await;
        }

        for (i, host) in hosts.iter().enumerate() {
            let Some(id) = host else { continue };
            let concept = { self.graph.read().await.get_concept(id).cloned() };
            let Some(concept) = concept else { continue };
            let embedding = embeddings.get(i).cloned().flatten();

            if let Some(embedding) = embedding.clone() {
                if let Err(error) = self.index.write().await.insert(id, embedding) {
                    warn!(%error, concept = %id, "Failed to index embedding");
                }
            }
            if let Err(error) = self.storage.add_concept(concept, embedding).await {
                warn!(%error, concept = %id, "Failed to persist concept");
                report.failed += 1;
            }
        }

        self.cache.lock().await.invalidate_intersecting(&words);
        info!(
            learned = report.learned,
            failed = report.failed,
            "Batch learn complete"
        );
        Ok(report)
    }

    /// Answer a query, consulting the cache first. Concepts used on
    /// returned paths are reinforced.
    pub async fn ask(&self, query: &str) -> Result<QueryResponse> {
        if let Some(hit) = self.cache.lock().await.get(query) {
            return Ok(hit);
        }

        let response = {
            let graph = self.graph.read().await;
            self.processor.process(&graph, query)
        };

        if !response.paths.is_empty() {
            let mut graph = self.graph.write().await;
            let mut reinforced: HashSet<ConceptId> = HashSet::new();
            for path in &response.paths {
                for step in &path.steps {
                    for content in [&step.source_concept, &step.target_concept] {
                        let id = concept_id(content);
                        if reinforced.insert(id.clone()) {
                            graph.record_access(&id);
                        }
                    }
                }
            }
        }

        self.cache.lock().await.insert(query, response.clone());
        Ok(response)
    }

    /// Fused concept search: lexical word-overlap ranking and semantic
    /// nearest-neighbor ranking combined by reciprocal rank fusion.
    pub async fn search_concepts(&self, query: &str, limit: usize) -> Result<Vec<ConceptHit>> {
        let fetch = limit.max(1) * 2;

        let lexical: Vec<ConceptId> = {
            let graph = self.graph.read().await;
            let query_words = tokenize(query);
            let mut counts: HashMap<ConceptId, usize> = HashMap::new();
            for word in &query_words {
                if let Some(ids) = graph.concepts_for_word(word) {
                    for id in ids {
                        *counts.entry(id.clone()).or_insert(0) += 1;
                    }
                }
            }
            let mut ranked: Vec<(ConceptId, usize)> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            ranked.into_iter().take(fetch).map(|(id, _)| id).collect()
        };

        let semantic: Vec<(ConceptId, f32)> = match self.analyzer.get_embedding(query).await? {
            Some(embedding) => self.index.read().await.search(&embedding, fetch, None)?,
            None => Vec::new(),
        };

        let mut fused: HashMap<ConceptId, f32> = HashMap::new();
        for (rank, id) in lexical.iter().enumerate() {
            *fused.entry(id.clone()).or_insert(0.0) += 1.0 / (RRF_K + rank as f32 + 1.0);
        }
        for (rank, (id, _)) in semantic.iter().enumerate() {
            *fused.entry(id.clone()).or_insert(0.0) += 1.0 / (RRF_K + rank as f32 + 1.0);
        }

        let mut ranked: Vec<(ConceptId, f32)> = fused.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);

        let graph = self.graph.read().await;
        Ok(ranked
            .into_iter()
            .filter_map(|(id, score)| {
                let content = graph.get_concept(&id)?.content.clone();
                Some(ConceptHit { id, content, score })
            })
            .collect())
    }

    /// Run a decay/prune maintenance pass. Removals force an index
    /// rebuild and a full cache flush; otherwise the index is compacted
    /// only when its deleted fraction warrants it.
    pub async fn decay_and_prune(&self) -> Result<PruneReport> {
        let report = self.graph.write().await.decay_and_prune();

        if report.removed_any() {
            self.rebuild_index().await?;
            self.cache.lock().await.clear();
        } else {
            let mut index = self.index.write().await;
            if index.needs_compaction() {
                index.rebuild()?;
            }
        }

        Ok(report)
    }

    /// Snapshot the knowledge base to a JSON file
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = self.graph.read().await.to_kb_file();
        let bytes = serde_json::to_vec_pretty(&file)?;
        tokio::fs::write(path.as_ref(), bytes)
            .await
            .map_err(|e| EngineError::Storage {
                message: format!("writing knowledge base: {}", e),
            })?;
        self.storage.save().await?;
        info!(path = %path.as_ref().display(), "Saved knowledge base");
        Ok(())
    }

    /// Replace the in-memory knowledge base with a saved snapshot.
    /// Returns the number of concepts loaded.
    pub async fn load_from_file(&self, path: impl AsRef<Path>) -> Result<usize> {
        let bytes = tokio::fs::read(path.as_ref())
            .await
            .map_err(|e| EngineError::Storage {
                message: format!("reading knowledge base: {}", e),
            })?;
        let file: KnowledgeBaseFile = serde_json::from_slice(&bytes)?;

        let graph = KnowledgeGraph::from_kb_file(self.config.graph.clone(), file);
        let loaded = graph.stats().concept_count;
        *self.graph.write().await = graph;

        self.rebuild_index().await?;
        self.cache.lock().await.clear();
        info!(concepts = loaded, "Loaded knowledge base");
        Ok(loaded)
    }

    /// Statistics snapshot across graph, index, and cache
    pub async fn stats(&self) -> EngineStats {
        let graph_stats = self.graph.read().await.stats();
        let indexed = self.index.read().await.len();
        let cache = self.cache.lock().await.stats();
        EngineStats {
            concepts: graph_stats.concept_count,
            associations: graph_stats.association_count,
            indexed,
            cache,
        }
    }

    /// Rebuild the vector index from the current graph. Embeddings come
    /// from storage when present, falling back to re-embedding.
    async fn rebuild_index(&self) -> Result<()> {
        let concepts: Vec<(ConceptId, String)> = {
            let graph = self.graph.read().await;
            graph
                .concepts()
                .map(|c| (c.id.clone(), c.content.clone()))
                .collect()
        };

        let mut fresh = VectorIndex::new(self.config.index.clone())?;
        for (id, content) in concepts {
            let embedding = match self.storage.get_embedding(&id).await? {
                Some(embedding) => Some(embedding),
                None => self.analyzer.get_embedding(&content).await?,
            };
            if let Some(embedding) = embedding {
                fresh.insert(&id, embedding)?;
            }
        }

        let indexed = fresh.len();
        *self.index.write().await = fresh;
        info!(indexed, "Rebuilt vector index");
        Ok(())
    }
}
