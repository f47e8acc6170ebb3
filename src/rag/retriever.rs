//! Query-time retrieval: embed the question and search one document.

use crate::embedding::Embedder;
use crate::error::{DocentError, Result};
use crate::vector_store::{SearchResult, VectorIndex};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Retrieves ranked chunks for a question.
///
/// The embedder must be the one the document was indexed with; construction
/// fails if its dimension differs from the index.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// Create a new retriever.
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if index.dimensions() != embedder.dimensions() {
            return Err(DocentError::Config(format!(
                "Embedder {} produces {} dimensions but the index stores {}",
                embedder.model_name(),
                embedder.dimensions(),
                index.dimensions()
            )));
        }
        Ok(Self { index, embedder })
    }

    /// Find the `top_k` chunks of a document most similar to the question.
    ///
    /// Unknown or empty documents yield no results.
    #[instrument(skip(self, question))]
    pub async fn retrieve(&self, question: &str, document_id: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(question).await?;
        let results = self.index.search(&query_vector, document_id, top_k).await?;

        debug!("Retrieved {} chunks", results.len());
        Ok(results)
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }
}

/// Chunk texts, in rank order, for use as model context.
pub fn context_texts(results: &[SearchResult]) -> Vec<String> {
    results.iter().map(|r| r.text.clone()).collect()
}

/// Citation labels such as "Chunk 3", in rank order.
pub fn source_labels(results: &[SearchResult]) -> Vec<String> {
    results.iter().map(|r| format!("Chunk {}", r.chunk_index)).collect()
}
