//! Vector index abstraction for Docent.
//!
//! Chunks are partitioned by document: every document owns an isolated set of
//! `(id, vector, payload)` entries and every search is filtered to exactly one
//! document. Scoring is a linear cosine scan over that partition.
//!
//! # Concurrency
//!
//! Implementations are shared behind `Arc<dyn VectorIndex>`. `upsert` and
//! `delete` on the same document are mutually exclusive and replace the
//! partition atomically: a concurrent `search` sees either the previous full
//! set or the new full set. Searches never block on writes to other documents
//! for longer than a snapshot swap.

mod memory;
mod sqlite;

pub use memory::MemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;

use crate::config::{Settings, VectorStoreProvider};
use crate::embedding::Embedder;
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Maximum number of characters of chunk text kept in the index.
pub const MAX_STORED_TEXT_CHARS: usize = 1000;

/// A chunk stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id, `"{document_id}_{index}"`.
    pub id: String,
    /// Document this chunk belongs to.
    pub document_id: String,
    /// Zero-based position of the chunk in its document.
    pub index: usize,
    /// Chunk text, truncated to [`MAX_STORED_TEXT_CHARS`].
    pub text: String,
    /// Embedding vector.
    pub vector: Vec<f32>,
}

impl Chunk {
    /// Create a chunk, deriving its id and truncating its text.
    pub fn new(document_id: &str, index: usize, text: &str, vector: Vec<f32>) -> Self {
        Self {
            id: chunk_id(document_id, index),
            document_id: document_id.to_string(),
            index,
            text: truncate_chars(text, MAX_STORED_TEXT_CHARS),
            vector,
        }
    }

    /// Human-readable citation label, e.g. "Chunk 3".
    pub fn label(&self) -> String {
        format!("Chunk {}", self.index)
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Stored chunk text.
    pub text: String,
    /// Cosine similarity to the query (higher is better).
    pub score: f32,
    /// Position of the chunk in its document.
    pub chunk_index: usize,
}

/// Summary information about an indexed document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Document ID.
    pub document_id: String,
    /// Number of indexed chunks.
    pub chunk_count: usize,
    /// When the document was last (re)indexed.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector index implementations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Replace all entries of a document with the given chunks.
    ///
    /// Requires one vector per chunk, each of the index dimension. Returns the
    /// assigned chunk ids in chunk order.
    async fn upsert(
        &self,
        document_id: &str,
        chunks: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<String>>;

    /// Rank a document's chunks by cosine similarity to the query.
    ///
    /// Returns at most `top_k` results, highest score first, ties broken by
    /// chunk index. Unknown documents yield an empty result.
    async fn search(
        &self,
        query_vector: &[f32],
        document_id: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Remove every entry of a document. Unknown documents are a no-op.
    async fn delete(&self, document_id: &str) -> Result<()>;

    /// Number of chunks stored for a document.
    async fn chunk_count(&self, document_id: &str) -> Result<usize>;

    /// All chunks of a document in index order.
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// List all indexed documents, most recently indexed first.
    async fn list_documents(&self) -> Result<Vec<IndexedDocument>>;

    /// Dimension every stored and query vector must have.
    fn dimensions(&self) -> usize;
}

/// Create the vector index selected by the settings.
///
/// The embedder's model and dimension are bound to persistent indexes so that
/// vectors from different models never meet in one index.
pub fn create_index(settings: &Settings, embedder: &dyn Embedder) -> Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match settings.vector_store.provider {
        VectorStoreProvider::Memory => {
            info!("Using in-memory vector index");
            Arc::new(MemoryVectorIndex::new(embedder.dimensions()))
        }
        VectorStoreProvider::Sqlite => Arc::new(SqliteVectorIndex::open(
            &settings.sqlite_path(),
            embedder.model_name(),
            embedder.dimensions(),
        )?),
    };
    Ok(index)
}

/// Build the stable chunk id for a document position.
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{}_{}", document_id, index)
}

/// Recover the chunk ordinal from a chunk id.
///
/// Document ids may themselves contain underscores, so the split happens at
/// the last one.
pub fn parse_chunk_index(chunk_id: &str) -> Option<usize> {
    let (_, index) = chunk_id.rsplit_once('_')?;
    index.parse().ok()
}

/// Compute cosine similarity between two vectors of equal length.
///
/// A zero-norm vector uses 1.0 as its norm, so its similarity with anything is
/// the raw dot product, which is 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = floored_norm(a);
    let norm_b = floored_norm(b);

    dot_product / (norm_a * norm_b)
}

fn floored_norm(v: &[f32]) -> f32 {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        1.0
    } else {
        norm
    }
}

/// Check an upsert request and build the chunks it describes.
pub(crate) fn build_chunks(
    document_id: &str,
    chunks: &[String],
    vectors: &[Vec<f32>],
    dimensions: usize,
) -> Result<Vec<Chunk>> {
    if chunks.len() != vectors.len() {
        return Err(DocentError::Validation(format!(
            "Got {} chunks but {} vectors for document {}",
            chunks.len(),
            vectors.len(),
            document_id
        )));
    }

    for vector in vectors {
        check_dimension(dimensions, vector)?;
    }

    Ok(chunks
        .iter()
        .zip(vectors)
        .enumerate()
        .map(|(index, (text, vector))| Chunk::new(document_id, index, text, vector.clone()))
        .collect())
}

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(DocentError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Score chunks against a query and keep the best `top_k`.
pub(crate) fn rank(query_vector: &[f32], chunks: &[Chunk], top_k: usize) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = chunks
        .iter()
        .map(|chunk| SearchResult {
            text: chunk.text.clone(),
            score: cosine_similarity(query_vector, &chunk.vector),
            chunk_index: chunk.index,
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    results.truncate(top_k);
    results
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_is_scale_invariant() {
        let v = vec![0.3, -1.2, 2.5];
        let scaled: Vec<f32> = v.iter().map(|x| x * 7.0).collect();
        assert!((cosine_similarity(&v, &scaled) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let zero = vec![0.0, 0.0];
        let v = vec![0.6, 0.8];
        assert_eq!(cosine_similarity(&zero, &v), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_chunk_id_contract() {
        assert_eq!(chunk_id("doc-1", 0), "doc-1_0");
        assert_eq!(parse_chunk_index("doc-1_12"), Some(12));
        assert_eq!(parse_chunk_index("my_doc_3"), Some(3));
        assert_eq!(parse_chunk_index("nounderscore"), None);
        assert_eq!(parse_chunk_index("doc_x"), None);
    }

    #[test]
    fn test_chunk_text_truncated_on_char_boundary() {
        let text = "é".repeat(1500);
        let chunk = Chunk::new("doc", 0, &text, vec![]);
        assert_eq!(chunk.text.chars().count(), MAX_STORED_TEXT_CHARS);
        assert_eq!(chunk.label(), "Chunk 0");
    }

    #[test]
    fn test_build_chunks_rejects_count_mismatch() {
        let result = build_chunks("doc", &["a".to_string()], &[], 2);
        assert!(matches!(result, Err(DocentError::Validation(_))));
    }

    #[test]
    fn test_build_chunks_rejects_wrong_dimension() {
        let result = build_chunks("doc", &["a".to_string()], &[vec![1.0, 0.0, 0.0]], 2);
        assert!(matches!(
            result,
            Err(DocentError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_rank_breaks_ties_by_chunk_index() {
        let chunks = vec![
            Chunk::new("doc", 0, "a", vec![0.0, 1.0]),
            Chunk::new("doc", 1, "b", vec![1.0, 0.0]),
            Chunk::new("doc", 2, "c", vec![1.0, 0.0]),
        ];
        let results = rank(&[1.0, 0.0], &chunks, 10);
        let order: Vec<usize> = results.iter().map(|r| r.chunk_index).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }
}
