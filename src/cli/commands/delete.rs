//! Delete command implementation.

use crate::cli::{Components, Output};
use crate::config::Settings;
use crate::vector_store::VectorIndex;
use anyhow::Result;

/// Run the delete command.
pub async fn run_delete(document_id: &str, settings: Settings) -> Result<()> {
    let components = Components::from_settings(settings)?;

    let chunks = components.index.chunk_count(document_id).await?;
    if chunks == 0 {
        Output::warning(&format!("Document {} is not indexed.", document_id));
        return Ok(());
    }

    components.ingestor(false)?.delete(document_id).await?;
    Output::success(&format!("Deleted {} ({} chunks)", document_id, chunks));

    Ok(())
}
