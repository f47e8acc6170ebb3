//! Search command implementation.

use crate::cli::{Components, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(document_id: &str, query: &str, top_k: usize, settings: Settings) -> Result<()> {
    let components = Components::from_settings(settings)?;
    let retriever = components.retriever()?;

    let spinner = Output::spinner("Searching...");

    let results = retriever.retrieve(query, document_id, top_k).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) => {
            if results.is_empty() {
                Output::warning(&format!("No chunks indexed for document {}.", document_id));
            } else {
                Output::success(&format!("Found {} results", results.len()));

                for result in &results {
                    Output::search_result(&format!("Chunk {}", result.chunk_index), result.score, &result.text);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
