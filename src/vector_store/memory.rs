//! In-memory vector index implementation.
//!
//! Each document maps to an immutable snapshot of its chunks. Writers build the
//! replacement snapshot before taking the lock and only swap the pointer while
//! holding it, so the write lock is held for a map insert and nothing else.
//! Readers clone the snapshot pointer and score without any lock held.

use super::{build_chunks, check_dimension, rank, Chunk, IndexedDocument, SearchResult, VectorIndex};
use crate::error::{DocentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};

struct Partition {
    chunks: Arc<[Chunk]>,
    indexed_at: DateTime<Utc>,
}

/// In-memory vector index.
pub struct MemoryVectorIndex {
    dimensions: usize,
    partitions: RwLock<HashMap<String, Partition>>,
}

impl MemoryVectorIndex {
    /// Create an empty index for vectors of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            partitions: RwLock::new(HashMap::new()),
        }
    }

    fn snapshot(&self, document_id: &str) -> Result<Option<Arc<[Chunk]>>> {
        let partitions = self
            .partitions
            .read()
            .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        Ok(partitions.get(document_id).map(|p| Arc::clone(&p.chunks)))
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    #[instrument(skip(self, chunks, vectors), fields(count = chunks.len()))]
    async fn upsert(
        &self,
        document_id: &str,
        chunks: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<String>> {
        let built = build_chunks(document_id, chunks, vectors, self.dimensions)?;
        let ids: Vec<String> = built.iter().map(|c| c.id.clone()).collect();

        let partition = Partition {
            chunks: Arc::from(built),
            indexed_at: Utc::now(),
        };

        let mut partitions = self
            .partitions
            .write()
            .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        if ids.is_empty() {
            partitions.remove(document_id);
        } else {
            partitions.insert(document_id.to_string(), partition);
        }
        drop(partitions);

        debug!("Indexed {} chunks for document {}", ids.len(), document_id);
        Ok(ids)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        document_id: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        check_dimension(self.dimensions, query_vector)?;

        let Some(chunks) = self.snapshot(document_id)? else {
            return Ok(Vec::new());
        };

        Ok(rank(query_vector, &chunks, top_k))
    }

    #[instrument(skip(self))]
    async fn delete(&self, document_id: &str) -> Result<()> {
        let mut partitions = self
            .partitions
            .write()
            .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        if partitions.remove(document_id).is_some() {
            debug!("Deleted document {}", document_id);
        }
        Ok(())
    }

    async fn chunk_count(&self, document_id: &str) -> Result<usize> {
        Ok(self.snapshot(document_id)?.map_or(0, |chunks| chunks.len()))
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .snapshot(document_id)?
            .map(|chunks| chunks.to_vec())
            .unwrap_or_default())
    }

    async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        let partitions = self
            .partitions
            .read()
            .map_err(|e| DocentError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let mut documents: Vec<IndexedDocument> = partitions
            .iter()
            .map(|(document_id, partition)| IndexedDocument {
                document_id: document_id.clone(),
                chunk_count: partition.chunks.len(),
                indexed_at: partition.indexed_at,
            })
            .collect();

        documents.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        Ok(documents)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
