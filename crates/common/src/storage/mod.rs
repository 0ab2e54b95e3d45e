//! Storage backend abstraction
//!
//! Provides a unified interface over durable concept/association storage:
//! - `StorageBackend`: the read/write contract the engine depends on
//! - `MemoryStore`: embedded in-process binding
//! - `RetryingStore`: decorator adding exponential backoff around every call
//!
//! Concrete deployments may bind a remote store behind the same trait; the
//! engine only sees this contract.

use crate::config::StorageConfig;
use crate::errors::{EngineError, Result};
use crate::model::{association_key, Association, Concept, ConceptId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

/// Read/write contract for durable concept and association storage
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store or overwrite a concept, optionally with its embedding
    async fn add_concept(&self, concept: Concept, embedding: Option<Vec<f32>>) -> Result<()>;

    /// Fetch a concept by id
    async fn get_concept(&self, id: &str) -> Result<Option<Concept>>;

    /// Store or overwrite an association
    async fn add_association(&self, association: Association) -> Result<()>;

    /// Fetch an association by its (source, target) key
    async fn get_association(&self, source_id: &str, target_id: &str)
        -> Result<Option<Association>>;

    /// Ids adjacent to the given concept (bidirectional)
    async fn get_neighbors(&self, id: &str) -> Result<Vec<ConceptId>>;

    /// All stored concept ids
    async fn get_all_concept_ids(&self) -> Result<Vec<ConceptId>>;

    /// Stored embedding for a concept, if any
    async fn get_embedding(&self, id: &str) -> Result<Option<Vec<f32>>>;

    /// Lexical lookup: concepts whose content contains the query words
    async fn search_by_text(&self, query: &str, limit: usize) -> Result<Vec<Concept>>;

    /// Semantic lookup over stored embeddings
    async fn semantic_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(ConceptId, f32)>>;

    /// Flush pending writes
    async fn save(&self) -> Result<()>;
}

#[derive(Default)]
struct MemoryStoreInner {
    concepts: HashMap<ConceptId, Concept>,
    embeddings: HashMap<ConceptId, Vec<f32>>,
    associations: HashMap<String, Association>,
    neighbors: HashMap<ConceptId, HashSet<ConceptId>>,
}

/// Embedded in-memory storage binding
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn add_concept(&self, concept: Concept, embedding: Option<Vec<f32>>) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(embedding) = embedding {
            inner.embeddings.insert(concept.id.clone(), embedding);
        }
        inner.concepts.insert(concept.id.clone(), concept);
        Ok(())
    }

    async fn get_concept(&self, id: &str) -> Result<Option<Concept>> {
        Ok(self.inner.read().await.concepts.get(id).cloned())
    }

    async fn add_association(&self, association: Association) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .neighbors
            .entry(association.source_id.clone())
            .or_default()
            .insert(association.target_id.clone());
        inner
            .neighbors
            .entry(association.target_id.clone())
            .or_default()
            .insert(association.source_id.clone());
        inner.associations.insert(association.key(), association);
        Ok(())
    }

    async fn get_association(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<Association>> {
        let key = association_key(source_id, target_id);
        Ok(self.inner.read().await.associations.get(&key).cloned())
    }

    async fn get_neighbors(&self, id: &str) -> Result<Vec<ConceptId>> {
        Ok(self
            .inner
            .read()
            .await
            .neighbors
            .get(id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_all_concept_ids(&self) -> Result<Vec<ConceptId>> {
        Ok(self.inner.read().await.concepts.keys().cloned().collect())
    }

    async fn get_embedding(&self, id: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.inner.read().await.embeddings.get(id).cloned())
    }

    async fn search_by_text(&self, query: &str, limit: usize) -> Result<Vec<Concept>> {
        let query_lower = query.to_lowercase();
        let words: Vec<&str> = query_lower.split_whitespace().collect();
        let inner = self.inner.read().await;

        let mut matches: Vec<(&Concept, usize)> = inner
            .concepts
            .values()
            .filter_map(|c| {
                let content = c.content.to_lowercase();
                let hits = words.iter().filter(|w| content.contains(**w)).count();
                (hits > 0).then_some((c, hits))
            })
            .collect();

        matches.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(matches.into_iter().take(limit).map(|(c, _)| c.clone()).collect())
    }

    async fn semantic_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(ConceptId, f32)>> {
        let inner = self.inner.read().await;
        let mut scored: Vec<(ConceptId, f32)> = inner
            .embeddings
            .iter()
            .map(|(id, e)| (id.clone(), cosine_similarity(embedding, e)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn save(&self) -> Result<()> {
        // Nothing to flush for the embedded binding
        Ok(())
    }
}

/// Decorator adding retry-with-backoff around every storage call.
/// Exhaustion fails only the originating call.
pub struct RetryingStore<S> {
    inner: S,
    config: StorageConfig,
}

impl<S: StorageBackend> RetryingStore<S> {
    pub fn new(inner: S, config: StorageConfig) -> Self {
        Self { inner, config }
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, call: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                // Exponential backoff
                let delay =
                    Duration::from_millis(self.config.backoff_base_ms * (2_u64.pow(attempt - 1)));
                tokio::time::sleep(delay).await;
            }

            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!(
                        op,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Storage call failed, retrying"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(EngineError::RetriesExhausted {
            attempts: max_attempts,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown storage failure".to_string()),
        })
    }
}

#[async_trait]
impl<S: StorageBackend> StorageBackend for RetryingStore<S> {
    async fn add_concept(&self, concept: Concept, embedding: Option<Vec<f32>>) -> Result<()> {
        self.with_retry("add_concept", || {
            self.inner.add_concept(concept.clone(), embedding.clone())
        })
        .await
    }

    async fn get_concept(&self, id: &str) -> Result<Option<Concept>> {
        self.with_retry("get_concept", || self.inner.get_concept(id)).await
    }

    async fn add_association(&self, association: Association) -> Result<()> {
        self.with_retry("add_association", || {
            self.inner.add_association(association.clone())
        })
        .await
    }

    async fn get_association(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> Result<Option<Association>> {
        self.with_retry("get_association", || {
            self.inner.get_association(source_id, target_id)
        })
        .await
    }

    async fn get_neighbors(&self, id: &str) -> Result<Vec<ConceptId>> {
        self.with_retry("get_neighbors", || self.inner.get_neighbors(id)).await
    }

    async fn get_all_concept_ids(&self) -> Result<Vec<ConceptId>> {
        self.with_retry("get_all_concept_ids", || self.inner.get_all_concept_ids())
            .await
    }

    async fn get_embedding(&self, id: &str) -> Result<Option<Vec<f32>>> {
        self.with_retry("get_embedding", || self.inner.get_embedding(id)).await
    }

    async fn search_by_text(&self, query: &str, limit: usize) -> Result<Vec<Concept>> {
        self.with_retry("search_by_text", || self.inner.search_by_text(query, limit))
            .await
    }

    async fn semantic_search(
        &self,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<(ConceptId, f32)>> {
        self.with_retry("semantic_search", || {
            self.inner.semantic_search(embedding, limit)
        })
        .await
    }

    async fn save(&self) -> Result<()> {
        self.with_retry("save", || self.inner.save()).await
    }
}
