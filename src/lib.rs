//! Docent - ask questions about your documents
//!
//! A local-first retrieval engine for retrieval-augmented question answering
//! over documents, audio and video.
//!
//! # Overview
//!
//! Docent allows you to:
//! - Chunk and index extracted document text or transcript segments
//! - Search a single document semantically
//! - Ask questions and get answers with chunk citations
//! - Link answers back to the media timestamps they came from
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `chunking` - Overlapping character-bounded text chunks
//! - `embedding` - Embedding generation (OpenAI or local hash projection)
//! - `vector_store` - Per-document vector index (in-memory or SQLite)
//! - `transcript` - Timestamped segments and answer-to-timestamp matching
//! - `llm` - Answer generation (OpenAI or offline extractive)
//! - `rag` - Retrieval and the question answering engine
//! - `ingest` - Ingestion pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use docent::chunking::TextChunker;
//! use docent::embedding::HashEmbedder;
//! use docent::ingest::Ingestor;
//! use docent::llm::ExtractiveModel;
//! use docent::rag::{ChatRequest, RagEngine, Retriever};
//! use docent::vector_store::MemoryVectorIndex;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let embedder = Arc::new(HashEmbedder::new(256));
//!     let index = Arc::new(MemoryVectorIndex::new(256));
//!
//!     let ingestor = Ingestor::new(TextChunker::new(1000, 200)?, embedder.clone(), index.clone())?;
//!     ingestor.ingest_text("notes", "Docent splits text into chunks.").await?;
//!
//!     let engine = RagEngine::new(Retriever::new(index, embedder)?, Arc::new(ExtractiveModel::new()));
//!     let answer = engine.ask(&ChatRequest::new("notes", "What does Docent split?")).await?;
//!     println!("{} ({:?})", answer.answer, answer.sources);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod llm;
pub mod openai;
pub mod rag;
pub mod transcript;
pub mod vector_store;

pub use error::{DocentError, Result};
