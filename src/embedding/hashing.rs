//! Local deterministic embeddings via hashed trigonometric projection.
//!
//! Each token is hashed with XxHash64 and spread across every dimension as a
//! sinusoid whose frequency and phase come from the two halves of the hash.
//! The sum over tokens is L2-normalized. There is no semantic understanding
//! here, only lexical overlap, but the output is stable across runs and
//! machines, which makes it suitable for offline use and tests.

use super::{l2_normalize, Embedder};
use crate::error::Result;
use async_trait::async_trait;
use std::f64::consts::TAU;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Hash-projection embedder.
pub struct HashEmbedder {
    dimensions: usize,
    model: String,
}

impl HashEmbedder {
    /// Create a new hash embedder producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            model: format!("hash-{}", dimensions),
        }
    }

    /// Compute the embedding synchronously.
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0f64; self.dimensions];

        for token in tokenize(text) {
            let hash = token_hash(&token);
            let frequency = (hash & 0xFFFF_FFFF) as f64 / u32::MAX as f64 * TAU;
            let phase = (hash >> 32) as f64 / u32::MAX as f64 * TAU;

            for (i, slot) in acc.iter_mut().enumerate() {
                *slot += (frequency * (i + 1) as f64 + phase).sin();
            }
        }

        let mut vector: Vec<f32> = acc.into_iter().map(|x| x as f32).collect();
        l2_normalize(&mut vector);
        vector
    }
}

/// Lowercased alphanumeric runs. Text made only of symbols falls back to
/// whitespace tokens, and whitespace-only text becomes a single raw token, so
/// any non-empty input gets a non-zero vector.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();

    let words: Vec<String> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();

    if !words.is_empty() {
        return words;
    }

    let pieces: Vec<String> = lowered.split_whitespace().map(str::to_string).collect();
    if pieces.is_empty() && !text.is_empty() {
        return vec![text.to_string()];
    }
    pieces
}

fn token_hash(token: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(token.as_bytes());
    hasher.finish()
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::cosine_similarity;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(256);
        let a = embedder.embed_sync("The quick brown fox");
        let b = embedder.embed_sync("The quick brown fox");
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
    }

    #[test]
    fn test_normalized() {
        let embedder = HashEmbedder::new(256);
        for text in ["hello", "a much longer sentence with many words in it", "!!!", "x", " ", "\n\t"] {
            let v = embedder.embed_sync(text);
            assert!((norm(&v) - 1.0).abs() < 1e-2, "norm of {:?} was {}", text, norm(&v));
        }
    }

    #[test]
    fn test_whitespace_only_texts_differ() {
        let embedder = HashEmbedder::new(64);
        assert_ne!(embedder.embed_sync(" "), embedder.embed_sync("\n\t"));
        assert_eq!(embedder.embed_sync(" "), embedder.embed_sync(" "));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(32);
        let v = embedder.embed_sync("");
        assert_eq!(v.len(), 32);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_distinct_texts_differ() {
        let embedder = HashEmbedder::new(128);
        let a = embedder.embed_sync("python programming");
        let b = embedder.embed_sync("rust programming");
        assert_ne!(a, b);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(embedder.embed_sync("Hello, World!"), embedder.embed_sync("hello world"));
    }

    #[test]
    fn test_lexical_overlap_scores_higher() {
        let embedder = HashEmbedder::new(256);
        let query = embedder.embed_sync("vector database indexing");
        let related = embedder.embed_sync("indexing a vector database for search");
        let unrelated = embedder.embed_sync("baking sourdough bread at home");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let embedder = HashEmbedder::new(64);
        let texts = vec!["first".to_string(), "second".to_string(), "third".to_string()];
        let batch = embedder.embed_batch(&texts).await.unwrap();

        assert_eq!(batch.len(), 3);
        for (text, vector) in texts.iter().zip(&batch) {
            assert_eq!(vector, &embedder.embed(text).await.unwrap());
        }
    }
}
