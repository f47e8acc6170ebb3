//! Ingestion pipeline.
//!
//! Coordinates chunking, embedding and indexing of extracted document text or
//! transcript segments. Extraction itself (PDF parsing, transcription) happens
//! upstream.

use crate::chunking::{segment_chunks, TextChunker};
use crate::embedding::Embedder;
use crate::error::{DocentError, Result};
use crate::llm::LanguageModel;
use crate::transcript::{validate_sequence, TimestampedSegment};
use crate::vector_store::VectorIndex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Result of ingesting a document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    /// Ids of the indexed chunks, in document order.
    pub chunk_ids: Vec<String>,
    /// Document summary, when a summarizer is attached.
    pub summary: Option<String>,
}

impl IngestReport {
    pub fn chunks_indexed(&self) -> usize {
        self.chunk_ids.len()
    }
}

/// Chunks, embeds and indexes documents.
pub struct Ingestor {
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    summarizer: Option<Arc<dyn LanguageModel>>,
}

impl Ingestor {
    /// Create an ingestor. Fails if the embedder and index disagree on dimension.
    pub fn new(chunker: TextChunker, embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Result<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(DocentError::Config(format!(
                "Embedder {} produces {} dimensions but the index stores {}",
                embedder.model_name(),
                embedder.dimensions(),
                index.dimensions()
            )));
        }

        Ok(Self {
            chunker,
            embedder,
            index,
            summarizer: None,
        })
    }

    /// Summarize documents with the given model while ingesting.
    pub fn with_summarizer(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.summarizer = Some(model);
        self
    }

    /// Generate a fresh document id.
    pub fn new_document_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Ingest extracted document text.
    #[instrument(skip(self, text), fields(chars = text.len()))]
    pub async fn ingest_text(&self, document_id: &str, text: &str) -> Result<IngestReport> {
        let chunks = self.chunker.chunk(text);
        info!("Split document {} into {} chunks", document_id, chunks.len());

        let mut report = self.ingest_chunks(document_id, &chunks).await?;
        report.summary = self.summarize(text).await?;
        Ok(report)
    }

    /// Ingest a transcript.
    ///
    /// Each non-blank segment yields one chunk, and a segment longer than the
    /// chunk size yields several. Chunk indexes are therefore not segment
    /// indexes; link answers back to media with the segments themselves.
    #[instrument(skip(self, segments), fields(segments = segments.len()))]
    pub async fn ingest_segments(&self, document_id: &str, segments: &[TimestampedSegment]) -> Result<IngestReport> {
        validate_sequence(segments)?;

        let chunks = segment_chunks(segments, &self.chunker);
        let mut report = self.ingest_chunks(document_id, &chunks).await?;

        let full_text = segments
            .iter()
            .map(|s| s.text.trim())
            .collect::<Vec<_>>()
            .join(" ");
        report.summary = self.summarize(&full_text).await?;
        Ok(report)
    }

    /// Embed and index pre-chunked text, replacing the document's entries.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn ingest_chunks(&self, document_id: &str, chunks: &[String]) -> Result<IngestReport> {
        if document_id.trim().is_empty() {
            return Err(DocentError::Validation("document id must not be empty".to_string()));
        }

        let vectors = self.embedder.embed_batch(chunks).await?;
        let chunk_ids = self.index.upsert(document_id, chunks, &vectors).await?;
        info!("Indexed {} chunks for document {}", chunk_ids.len(), document_id);

        Ok(IngestReport {
            document_id: document_id.to_string(),
            chunk_ids,
            summary: None,
        })
    }

    /// Remove a document from the index.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        self.index.delete(document_id).await
    }

    async fn summarize(&self, text: &str) -> Result<Option<String>> {
        match &self.summarizer {
            Some(model) if !text.trim().is_empty() => Ok(Some(model.summarize(text).await?)),
            _ => Ok(None),
        }
    }
}
