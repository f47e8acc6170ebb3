//! Ingest command implementation.

use super::read_segments;
use crate::cli::{Components, Output};
use crate::config::Settings;
use crate::ingest::Ingestor;
use anyhow::{Context, Result};

/// Run the ingest command.
pub async fn run_ingest(
    file: &str,
    id: Option<String>,
    segments: bool,
    summarize: bool,
    settings: Settings,
) -> Result<()> {
    let components = Components::from_settings(settings)?;
    let ingestor = components.ingestor(summarize)?;
    let document_id = id.unwrap_or_else(Ingestor::new_document_id);

    let spinner = Output::spinner("Chunking, embedding and indexing...");

    let result = if segments {
        let segments = read_segments(file)?;
        ingestor.ingest_segments(&document_id, &segments).await
    } else {
        let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
        ingestor.ingest_text(&document_id, &text).await
    };

    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            if report.chunk_ids.is_empty() {
                Output::warning(&format!("{} contains no text; nothing was indexed.", file));
            } else {
                Output::success(&format!("Indexed {} chunks", report.chunks_indexed()));
            }
            Output::kv("Document ID", &report.document_id);

            if let Some(summary) = &report.summary {
                Output::header("Summary");
                println!("\n{}", summary);
            }
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
