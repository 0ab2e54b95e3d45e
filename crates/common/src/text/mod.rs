//! Text analysis abstraction
//!
//! Provides a unified interface over the external NLP collaborator:
//! - Word extraction (tokenization)
//! - Embedding generation, single and batch
//!
//! `HashingAnalyzer` is the embedded binding: deterministic
//! hashed-projection embeddings with no model dependency. Identical text
//! always maps to identical vectors, which the engine's idempotent
//! learning relies on.

use crate::errors::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Split text into lowercase alphanumeric tokens of length > 1.
/// Shared by the analyzer and by the graph's lexical word index so both
/// sides of a word-overlap comparison agree on token boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(|w| w.to_string())
        .collect()
}

/// Trait for tokenization and embedding generation
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    /// Extract normalized content words from text
    fn extract_words(&self, text: &str) -> Vec<String>;

    /// Generate an embedding for a single text
    async fn get_embedding(&self, text: &str) -> Result<Option<Vec<f32>>>;

    /// Generate embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>>;

    /// Get the embedding dimension
    fn embedding_dimension(&self) -> usize;
}

/// Deterministic hashed-projection analyzer
pub struct HashingAnalyzer {
    dimension: usize,
    stop_words: HashSet<String>,
}

impl HashingAnalyzer {
    /// Create an analyzer producing vectors of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            stop_words: load_stop_words(),
        }
    }

    /// Project a single word onto a handful of signed dimensions derived
    /// from its hash.
    fn project_word(&self, word: &str, vector: &mut [f32]) {
        let mut hasher = Sha256::new();
        hasher.update(word.as_bytes());
        let digest = hasher.finalize();

        // Each 8-byte window of the digest yields one (index, sign) pair
        for chunk in digest.chunks_exact(8).take(4) {
            let value = u64::from_le_bytes(chunk.try_into().expect("8-byte chunk"));
            let index = (value % self.dimension as u64) as usize;
            let sign = if value & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
    }
}

impl Default for HashingAnalyzer {
    fn default() -> Self {
        Self::new(crate::DEFAULT_EMBEDDING_DIMENSION)
    }
}

#[async_trait]
impl TextAnalyzer for HashingAnalyzer {
    fn extract_words(&self, text: &str) -> Vec<String> {
        tokenize(text)
            .into_iter()
            .filter(|w| !self.stop_words.contains(w))
            .collect()
    }

    async fn get_embedding(&self, text: &str) -> Result<Option<Vec<f32>>> {
        let words = self.extract_words(text);
        if words.is_empty() {
            return Ok(None);
        }

        let mut vector = vec![0.0f32; self.dimension];
        for word in &words {
            self.project_word(word, &mut vector);
        }

        // L2-normalize so cosine distances are well behaved
        let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        Ok(Some(vector))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.get_embedding(text).await?);
        }
        Ok(embeddings)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }
}

fn load_stop_words() -> HashSet<String> {
    [
        "a", "an", "the", "is", "are", "was", "were", "be", "been", "in", "on", "at", "to",
        "for", "of", "with", "by", "from", "and", "or", "but", "not", "this", "that", "these",
        "those", "it", "its", "as", "do", "does", "did", "has", "have", "had", "can", "could",
        "will", "would", "should", "may", "might", "what", "which", "who", "whom", "how",
        "when", "where", "why",
    ]
    .into_iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_deterministic() {
        let analyzer = HashingAnalyzer::new(64);
        let a = analyzer.get_embedding("the sky is blue").await.unwrap().unwrap();
        let b = analyzer.get_embedding("the sky is blue").await.unwrap().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_empty_text_has_no_embedding() {
        let analyzer = HashingAnalyzer::new(64);
        assert!(analyzer.get_embedding("").await.unwrap().is_none());
        assert!(analyzer.get_embedding("the a of").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shared_words_increase_similarity() {
        let analyzer = HashingAnalyzer::new(256);
        let sky = analyzer.get_embedding("the sky is blue").await.unwrap().unwrap();
        let sky2 = analyzer.get_embedding("blue sky today").await.unwrap().unwrap();
        let other = analyzer.get_embedding("databases store rows").await.unwrap().unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&sky, &sky2) > dot(&sky, &other));
    }

    #[test]
    fn test_word_extraction_filters_stop_words() {
        let analyzer = HashingAnalyzer::new(64);
        let words = analyzer.extract_words("What is the color of the sky?");
        assert_eq!(words, vec!["color", "sky"]);
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let analyzer = HashingAnalyzer::new(64);
        let texts = vec!["alpha beta".to_string(), "gamma delta".to_string()];
        let batch = analyzer.embed_batch(&texts).await.unwrap();
        let single = analyzer.get_embedding("alpha beta").await.unwrap();
        assert_eq!(batch[0], single);
    }
}
