//! CLI module for Docent.

pub mod commands;
mod output;

pub use output::Output;

use crate::chunking::TextChunker;
use crate::config::{Prompts, Settings};
use crate::embedding::{create_embedder, Embedder};
use crate::ingest::Ingestor;
use crate::llm::{create_model, LanguageModel};
use crate::rag::{RagEngine, Retriever};
use crate::transcript::TimestampMatcher;
use crate::vector_store::{create_index, VectorIndex};
use clap::{Parser, Subcommand};
use std::sync::Arc;

/// Docent - ask questions about your documents
///
/// A local-first retrieval engine: ingest extracted text or transcripts, then
/// ask questions answered from the most relevant chunks, with sources and
/// media timestamps.
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, embed and index a document
    Ingest {
        /// Plain text file, or a JSON array of transcript segments with --segments
        file: String,

        /// Document ID (a new UUID if omitted; an existing ID is replaced)
        #[arg(long)]
        id: Option<String>,

        /// Treat the file as transcript segments ({start_time, end_time, text})
        #[arg(long)]
        segments: bool,

        /// Also generate a summary of the document
        #[arg(long)]
        summarize: bool,
    },

    /// Ask a question about a document
    Ask {
        /// Document ID
        document_id: String,

        /// The question to ask
        question: String,

        /// Transcript segments JSON file, for timestamp citations
        #[arg(long)]
        segments: Option<String>,

        /// Number of context chunks to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,
    },

    /// Search a document for relevant chunks
    Search {
        /// Document ID
        document_id: String,

        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Remove a document from the index
    Delete {
        /// Document ID
        document_id: String,
    },

    /// List indexed documents
    List,

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}

/// The engine's collaborators, wired from configuration.
///
/// Ingestion and querying share one embedder and one index.
pub struct Components {
    pub settings: Settings,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub model: Arc<dyn LanguageModel>,
}

impl Components {
    /// Build all components selected by the settings.
    pub fn from_settings(settings: Settings) -> crate::Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder = create_embedder(&settings.embedding)?;
        let index = create_index(&settings, embedder.as_ref())?;
        let model = create_model(&settings, prompts)?;

        Ok(Self {
            settings,
            embedder,
            index,
            model,
        })
    }

    pub fn retriever(&self) -> crate::Result<Retriever> {
        Retriever::new(Arc::clone(&self.index), Arc::clone(&self.embedder))
    }

    pub fn engine(&self) -> crate::Result<RagEngine> {
        Ok(RagEngine::new(self.retriever()?, Arc::clone(&self.model))
            .with_top_k(self.settings.rag.top_k)
            .with_matcher(self.matcher()))
    }

    pub fn ingestor(&self, summarize: bool) -> crate::Result<Ingestor> {
        let chunker = TextChunker::from_settings(&self.settings.chunking)?;
        let ingestor = Ingestor::new(chunker, Arc::clone(&self.embedder), Arc::clone(&self.index))?;
        Ok(if summarize {
            ingestor.with_summarizer(Arc::clone(&self.model))
        } else {
            ingestor
        })
    }

    pub fn matcher(&self) -> TimestampMatcher {
        TimestampMatcher::from_settings(&self.settings.timestamps)
    }
}
