//! CLI command implementations.

mod ask;
mod config;
mod delete;
mod ingest;
mod list;
mod search;
mod serve;

pub use ask::run_ask;
pub use config::run_config;
pub use delete::run_delete;
pub use ingest::run_ingest;
pub use list::run_list;
pub use search::run_search;
pub use serve::run_serve;

use crate::transcript::TimestampedSegment;
use anyhow::Context;

/// Read a JSON array of transcript segments.
pub(crate) fn read_segments(path: &str) -> anyhow::Result<Vec<TimestampedSegment>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let segments = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of segments", path))?;
    Ok(segments)
}
