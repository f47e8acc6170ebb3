//! Embedding generation for semantic search and retrieval.
//!
//! Two interchangeable backends sit behind the [`Embedder`] trait: the OpenAI
//! embeddings API and a local deterministic hash projection. The backend is
//! picked by configuration and shared by ingestion and querying.

mod hashing;
mod openai;

pub use hashing::HashEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Identifier of the model producing the vectors.
    fn model_name(&self) -> &str;
}

/// Create the embedder selected by the settings.
pub fn create_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let dimensions = settings.dimensions as usize;
    let embedder: Arc<dyn Embedder> = match settings.provider {
        EmbeddingProvider::OpenAI => Arc::new(OpenAIEmbedder::with_config(&settings.model, dimensions)?),
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(dimensions)),
    };
    Ok(embedder)
}

/// Scale a vector to unit L2 norm.
///
/// A zero vector stays zero: the divisor falls back to 1.0.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    let divisor = if norm > 0.0 { norm } else { 1.0 };
    for x in vector.iter_mut() {
        *x /= divisor;
    }
}
