//! Query result cache
//!
//! LRU with optional TTL, keyed by the normalized query. Each entry
//! remembers the word set of its query so that learning new content can
//! invalidate exactly the cached answers it might change, instead of
//! flushing everything.

use cognigraph_common::model::normalize_content;
use cognigraph_common::text::tokenize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::reasoning::QueryResponse;

/// Hit/miss counters and current size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct Entry {
    response: QueryResponse,
    inserted: Instant,
    words: HashSet<String>,
}

pub struct QueryCache {
    max_size: usize,
    ttl: Option<Duration>,
    entries: HashMap<String, Entry>,
    /// LRU order, front = least recently used
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl QueryCache {
    /// `max_size` must be non-zero; config validation enforces that
    /// upstream.
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Self {
        Self {
            max_size: max_size.max(1),
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a cached answer, refreshing its LRU position. Expired
    /// entries are dropped on access.
    pub fn get(&mut self, query: &str) -> Option<QueryResponse> {
        let key = normalize_content(query);

        if let Some(ttl) = self.ttl {
            if let Some(entry) = self.entries.get(&key) {
                if entry.inserted.elapsed() >= ttl {
                    self.remove(&key);
                }
            }
        }

        match self.entries.get(&key) {
            Some(entry) => {
                self.hits += 1;
                let response = entry.response.clone();
                self.touch(&key);
                Some(response)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Cache an answer, evicting the least recently used entry at
    /// capacity.
    pub fn insert(&mut self, query: &str, response: QueryResponse) {
        let key = normalize_content(query);
        let words = tokenize(query).into_iter().collect();

        if self.entries.contains_key(&key) {
            self.touch(&key);
        } else {
            if self.entries.len() >= self.max_size {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            self.order.push_back(key.clone());
        }

        self.entries.insert(
            key,
            Entry {
                response,
                inserted: Instant::now(),
                words,
            },
        );
    }

    /// Drop every cached answer whose query shares a word with the
    /// given set. Returns the number of entries removed.
    pub fn invalidate_intersecting(&mut self, words: &HashSet<String>) -> usize {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.words.is_disjoint(words))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            self.remove(key);
        }
        if !stale.is_empty() {
            debug!(invalidated = stale.len(), "Invalidated cached answers");
        }
        stale.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(key.to_string());
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::QueryIntent;

    fn response(answer: &str) -> QueryResponse {
        QueryResponse {
            query: "q".to_string(),
            answer: answer.to_string(),
            confidence: 0.9,
            intent: QueryIntent::Factual,
            supporting_paths: 1,
            paths: Vec::new(),
            alternatives: Vec::new(),
            explanation: "cached fixture".to_string(),
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_hit_and_miss() {
        let mut cache = QueryCache::new(10, None);
        assert!(cache.get("what is rust").is_none());

        cache.insert("what is rust", response("a language"));
        let hit = cache.get("what is rust").unwrap();
        assert_eq!(hit.answer, "a language");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_key_normalization() {
        let mut cache = QueryCache::new(10, None);
        cache.insert("  What IS rust?  ", response("a language"));
        assert!(cache.get("what is rust?").is_some());
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut cache = QueryCache::new(2, None);
        cache.insert("first query", response("1"));
        cache.insert("second query", response("2"));

        // Touch the first so the second becomes LRU
        cache.get("first query");
        cache.insert("third query", response("3"));

        assert!(cache.get("first query").is_some());
        assert!(cache.get("second query").is_none());
        assert!(cache.get("third query").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let mut cache = QueryCache::new(10, Some(Duration::ZERO));
        cache.insert("ephemeral", response("gone"));
        assert!(cache.get("ephemeral").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_selective_invalidation() {
        let mut cache = QueryCache::new(10, None);
        cache.insert("what color is the sky", response("blue"));
        cache.insert("how do plants grow", response("sunlight"));

        let learned: HashSet<String> = tokenize("the sky darkens at night").into_iter().collect();
        let removed = cache.invalidate_intersecting(&learned);

        assert_eq!(removed, 1);
        assert!(cache.get("what color is the sky").is_none());
        assert!(cache.get("how do plants grow").is_some());
    }

    #[test]
    fn test_disjoint_words_leave_cache_alone() {
        let mut cache = QueryCache::new(10, None);
        cache.insert("what color is the sky", response("blue"));

        let learned: HashSet<String> = tokenize("volcanoes erupt magma").into_iter().collect();
        assert_eq!(cache.invalidate_intersecting(&learned), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reinsert_updates_value() {
        let mut cache = QueryCache::new(10, None);
        cache.insert("stable query", response("old"));
        cache.insert("stable query", response("new"));
        assert_eq!(cache.get("stable query").unwrap().answer, "new");
        assert_eq!(cache.len(), 1);
    }
}
