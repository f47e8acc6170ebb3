//! Ask command implementation.

use super::read_segments;
use crate::cli::{Components, Output};
use crate::config::Settings;
use crate::rag::{ChatRequest, StreamEvent};
use anyhow::Result;
use futures::StreamExt;
use std::io::Write;

/// Run the ask command.
pub async fn run_ask(
    document_id: &str,
    question: &str,
    segments: Option<String>,
    top_k: Option<usize>,
    stream: bool,
    settings: Settings,
) -> Result<()> {
    let components = Components::from_settings(settings)?;
    let engine = components.engine()?;

    let mut request = ChatRequest::new(document_id, question);
    request.top_k = top_k;
    if let Some(path) = segments {
        request.segments = Some(read_segments(&path)?);
    }

    if stream {
        println!();
        let mut events = engine.stream(&request);
        while let Some(event) = events.next().await {
            match event {
                StreamEvent::Token(token) => {
                    print!("{}", token);
                    std::io::stdout().flush()?;
                }
                StreamEvent::Error(message) => {
                    println!();
                    Output::error(&format!("Failed to generate answer: {}", message));
                    return Err(anyhow::anyhow!(message));
                }
                StreamEvent::Done => println!("\n"),
            }
        }
        return Ok(());
    }

    let spinner = Output::spinner("Searching document...");

    match engine.ask(&request).await {
        Ok(response) => {
            spinner.finish_and_clear();

            println!("\n{}\n", response.answer);

            if !response.sources.is_empty() {
                Output::header("Sources");
                for source in &response.sources {
                    Output::list_item(source);
                }
            }

            if let Some(timestamps) = response.timestamps.filter(|t| !t.is_empty()) {
                Output::header("Timestamps");
                for segment in &timestamps {
                    Output::segment(segment);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
