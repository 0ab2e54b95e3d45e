//! Configuration management for the Cognigraph engine
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with COGNIGRAPH__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! All tuning constants (per-hop decay, proximity weights, consensus
//! thresholds) live here rather than at call sites, so deployments can
//! adjust them without a rebuild.

use crate::errors::{EngineError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Knowledge graph tuning
    #[serde(default)]
    pub graph: GraphConfig,

    /// Path finder tuning
    #[serde(default)]
    pub pathfinder: PathFinderConfig,

    /// Multi-path aggregator tuning
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Query processor tuning
    #[serde(default)]
    pub query: QueryConfig,

    /// Extraction pipeline tuning
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Vector index tuning
    #[serde(default)]
    pub index: IndexConfig,

    /// Result cache tuning
    #[serde(default)]
    pub cache: CacheConfig,

    /// Storage adapter tuning
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// Multiplicative strength boost per access
    #[serde(default = "default_access_boost")]
    pub access_boost: f32,

    /// Upper bound on concept strength
    #[serde(default = "default_max_strength")]
    pub max_strength: f32,

    /// Multiplicative weight boost on association reinforcement
    #[serde(default = "default_weight_boost")]
    pub weight_boost: f32,

    /// Upper bound on association weight
    #[serde(default = "default_max_weight")]
    pub max_weight: f32,

    /// Additive confidence growth on association reinforcement
    #[serde(default = "default_confidence_growth")]
    pub confidence_growth: f32,

    /// Inactivity window before strength decay applies, in seconds
    #[serde(default = "default_decay_after")]
    pub decay_after_secs: u64,

    /// Exponential decay factor applied per decay pass
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f32,

    /// Strength below which an inactive, unreferenced concept is prunable
    #[serde(default = "default_prune_strength")]
    pub prune_strength: f32,

    /// Association confidence below which stale links are pruned
    #[serde(default = "default_prune_confidence")]
    pub prune_confidence: f32,

    /// Last-use age after which a low-confidence association is stale, in seconds
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathFinderConfig {
    /// Maximum search depth in hops
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Minimum propagated confidence before a branch is abandoned
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Confidence decay applied per hop
    #[serde(default = "default_hop_decay")]
    pub hop_decay: f32,

    /// Proximity heuristic value at the target itself
    #[serde(default = "default_target_proximity")]
    pub target_proximity: f32,

    /// Proximity heuristic value for a direct neighbor of the target
    #[serde(default = "default_neighbor_proximity")]
    pub neighbor_proximity: f32,

    /// Proximity contribution per shared neighbor with the target
    #[serde(default = "default_shared_neighbor_step")]
    pub shared_neighbor_step: f32,

    /// Cap on the shared-neighbor proximity contribution
    #[serde(default = "default_shared_neighbor_cap")]
    pub shared_neighbor_cap: f32,

    /// Maximum paths collected per (start, target) pair
    #[serde(default = "default_paths_per_pair")]
    pub max_paths_per_pair: usize,

    /// Step-set Jaccard overlap above which a candidate path is rejected
    #[serde(default = "default_diversity_overlap")]
    pub max_diversity_overlap: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// Normalized-answer Jaccard overlap above which paths share a cluster
    #[serde(default = "default_cluster_overlap")]
    pub cluster_overlap: f32,

    /// Path share a cluster needs before the consensus boost applies
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f32,

    /// Multiplier applied to clusters that clear the consensus threshold
    #[serde(default = "default_consensus_boost")]
    pub consensus_boost: f32,

    /// Multiplier applied to singleton clusters when others exist
    #[serde(default = "default_outlier_penalty")]
    pub outlier_penalty: f32,

    /// Maximum diversity bonus for distinct relation-type sequences
    #[serde(default = "default_max_diversity_bonus")]
    pub max_diversity_bonus: f32,

    /// Number of runner-up clusters surfaced as alternatives
    #[serde(default = "default_max_alternatives")]
    pub max_alternatives: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Default number of reasoning paths requested per query
    #[serde(default = "default_num_paths")]
    pub num_paths: usize,

    /// Maximum concepts kept after relevance scoring
    #[serde(default = "default_max_concepts")]
    pub max_concepts: usize,

    /// Association confidence required for context expansion
    #[serde(default = "default_expansion_confidence")]
    pub expansion_confidence: f32,

    /// Number of top-scored seeds expanded into neighbors
    #[serde(default = "default_expansion_seeds")]
    pub expansion_seeds: usize,

    /// Total concept cap after context expansion
    #[serde(default = "default_expansion_cap")]
    pub expansion_cap: usize,

    /// Word count above which a query is penalized as complex
    #[serde(default = "default_long_query_words")]
    pub long_query_words: usize,

    /// Confidence boost for short definitional queries
    #[serde(default = "default_definitional_boost")]
    pub definitional_boost: f32,

    /// Confidence penalty for comparison and causation queries
    #[serde(default = "default_analytic_penalty")]
    pub analytic_penalty: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    /// Batch size at which extraction fans out to worker tasks
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Worker task count (0 = cpu_count - 1)
    #[serde(default)]
    pub workers: usize,

    /// Strength below which a concept is "difficult" and gets the
    /// co-occurrence pass
    #[serde(default = "default_difficult_strength")]
    pub difficult_strength: f32,

    /// Confidence assigned to pattern-extracted associations
    #[serde(default = "default_pattern_confidence")]
    pub pattern_confidence: f32,

    /// Confidence assigned to co-occurrence associations
    #[serde(default = "default_cooccurrence_confidence")]
    pub cooccurrence_confidence: f32,

    /// Sliding window size for co-occurrence extraction, in words
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Per-window cap on pairs linked from each side
    #[serde(default = "default_window_pair_cap")]
    pub window_pair_cap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Embedding dimension; must match the text analyzer's output
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum neighbors per node per layer
    #[serde(default = "default_hnsw_m")]
    pub m: usize,

    /// Candidate list size during construction
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Candidate list size during search
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,

    /// Deleted fraction at which needs_compaction() reports true
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: f32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Maximum cached query results before LRU eviction
    #[serde(default = "default_cache_size")]
    pub max_size: usize,

    /// Entry time-to-live in seconds (None = no expiry)
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Maximum retries around each storage call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (doubles per attempt)
    #[serde(default = "default_backoff_ms")]
    pub backoff_base_ms: u64,
}

// Default value functions
fn default_access_boost() -> f32 { 1.02 }
fn default_max_strength() -> f32 { 10.0 }
fn default_weight_boost() -> f32 { 1.1 }
fn default_max_weight() -> f32 { 5.0 }
fn default_confidence_growth() -> f32 { 0.05 }
fn default_decay_after() -> u64 { 86_400 * 7 }
fn default_decay_factor() -> f32 { 0.9 }
fn default_prune_strength() -> f32 { 0.5 }
fn default_prune_confidence() -> f32 { 0.2 }
fn default_stale_after() -> u64 { 86_400 * 30 }
fn default_max_depth() -> usize { 6 }
fn default_min_confidence() -> f32 { 0.1 }
fn default_hop_decay() -> f32 { 0.85 }
fn default_target_proximity() -> f32 { 1.0 }
fn default_neighbor_proximity() -> f32 { 0.5 }
fn default_shared_neighbor_step() -> f32 { 0.1 }
fn default_shared_neighbor_cap() -> f32 { 0.4 }
fn default_paths_per_pair() -> usize { 3 }
fn default_diversity_overlap() -> f32 { 0.7 }
fn default_cluster_overlap() -> f32 { 0.8 }
fn default_consensus_threshold() -> f32 { 0.5 }
fn default_consensus_boost() -> f32 { 1.2 }
fn default_outlier_penalty() -> f32 { 0.7 }
fn default_max_diversity_bonus() -> f32 { 0.2 }
fn default_max_alternatives() -> usize { 4 }
fn default_num_paths() -> usize { 6 }
fn default_max_concepts() -> usize { 10 }
fn default_expansion_confidence() -> f32 { 0.6 }
fn default_expansion_seeds() -> usize { 3 }
fn default_expansion_cap() -> usize { 15 }
fn default_long_query_words() -> usize { 10 }
fn default_definitional_boost() -> f32 { 1.1 }
fn default_analytic_penalty() -> f32 { 0.9 }
fn default_parallel_threshold() -> usize { 20 }
fn default_difficult_strength() -> f32 { 4.0 }
fn default_pattern_confidence() -> f32 { 0.8 }
fn default_cooccurrence_confidence() -> f32 { 0.5 }
fn default_window_size() -> usize { 3 }
fn default_window_pair_cap() -> usize { 3 }
fn default_dimension() -> usize { 256 }
fn default_hnsw_m() -> usize { 16 }
fn default_ef_construction() -> usize { 200 }
fn default_ef_search() -> usize { 64 }
fn default_compaction_threshold() -> f32 { 0.5 }
fn default_cache_size() -> usize { 1000 }
fn default_max_retries() -> u32 { 3 }
fn default_backoff_ms() -> u64 { 100 }

impl EngineConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g. COGNIGRAPH__PATHFINDER__MAX_DEPTH=8
            .add_source(
                Environment::with_prefix("COGNIGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EngineError::Configuration {
                message: e.to_string(),
            })?;

        let cfg: EngineConfig =
            config
                .try_deserialize()
                .map_err(|e| EngineError::Configuration {
                    message: e.to_string(),
                })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .build()
            .map_err(|e| EngineError::Configuration {
                message: e.to_string(),
            })?;

        let cfg: EngineConfig =
            config
                .try_deserialize()
                .map_err(|e| EngineError::Configuration {
                    message: e.to_string(),
                })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate bounds; fails fast at construction, never recovered
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size == 0 {
            return Err(EngineError::Configuration {
                message: "cache.max_size must be non-zero".into(),
            });
        }
        if self.index.dimension == 0 {
            return Err(EngineError::Configuration {
                message: "index.dimension must be non-zero".into(),
            });
        }
        if self.index.m < 2 {
            return Err(EngineError::Configuration {
                message: "index.m must be at least 2".into(),
            });
        }
        for (name, value) in [
            ("pathfinder.min_confidence", self.pathfinder.min_confidence),
            ("pathfinder.hop_decay", self.pathfinder.hop_decay),
            ("pathfinder.max_diversity_overlap", self.pathfinder.max_diversity_overlap),
            ("aggregator.cluster_overlap", self.aggregator.cluster_overlap),
            ("aggregator.consensus_threshold", self.aggregator.consensus_threshold),
            ("aggregator.outlier_penalty", self.aggregator.outlier_penalty),
            ("query.expansion_confidence", self.query.expansion_confidence),
            ("query.analytic_penalty", self.query.analytic_penalty),
            ("extraction.pattern_confidence", self.extraction.pattern_confidence),
            ("extraction.cooccurrence_confidence", self.extraction.cooccurrence_confidence),
            ("index.compaction_threshold", self.index.compaction_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Configuration {
                    message: format!("{} must be within [0, 1], got {}", name, value),
                });
            }
        }
        if self.pathfinder.max_depth == 0 {
            return Err(EngineError::Configuration {
                message: "pathfinder.max_depth must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Cache TTL as a Duration, if configured
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache.ttl_secs.map(Duration::from_secs)
    }

    /// Worker count for parallel extraction
    pub fn extraction_workers(&self) -> usize {
        if self.extraction.workers > 0 {
            self.extraction.workers
        } else {
            num_cpus::get().saturating_sub(1).max(1)
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            access_boost: default_access_boost(),
            max_strength: default_max_strength(),
            weight_boost: default_weight_boost(),
            max_weight: default_max_weight(),
            confidence_growth: default_confidence_growth(),
            decay_after_secs: default_decay_after(),
            decay_factor: default_decay_factor(),
            prune_strength: default_prune_strength(),
            prune_confidence: default_prune_confidence(),
            stale_after_secs: default_stale_after(),
        }
    }
}

impl Default for PathFinderConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            min_confidence: default_min_confidence(),
            hop_decay: default_hop_decay(),
            target_proximity: default_target_proximity(),
            neighbor_proximity: default_neighbor_proximity(),
            shared_neighbor_step: default_shared_neighbor_step(),
            shared_neighbor_cap: default_shared_neighbor_cap(),
            max_paths_per_pair: default_paths_per_pair(),
            max_diversity_overlap: default_diversity_overlap(),
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cluster_overlap: default_cluster_overlap(),
            consensus_threshold: default_consensus_threshold(),
            consensus_boost: default_consensus_boost(),
            outlier_penalty: default_outlier_penalty(),
            max_diversity_bonus: default_max_diversity_bonus(),
            max_alternatives: default_max_alternatives(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            num_paths: default_num_paths(),
            max_concepts: default_max_concepts(),
            expansion_confidence: default_expansion_confidence(),
            expansion_seeds: default_expansion_seeds(),
            expansion_cap: default_expansion_cap(),
            long_query_words: default_long_query_words(),
            definitional_boost: default_definitional_boost(),
            analytic_penalty: default_analytic_penalty(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: default_parallel_threshold(),
            workers: 0,
            difficult_strength: default_difficult_strength(),
            pattern_confidence: default_pattern_confidence(),
            cooccurrence_confidence: default_cooccurrence_confidence(),
            window_size: default_window_size(),
            window_pair_cap: default_window_pair_cap(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            m: default_hnsw_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            compaction_threshold: default_compaction_threshold(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_size(),
            ttl_secs: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_ms(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            pathfinder: PathFinderConfig::default(),
            aggregator: AggregatorConfig::default(),
            query: QueryConfig::default(),
            extraction: ExtractionConfig::default(),
            index: IndexConfig::default(),
            cache: CacheConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
