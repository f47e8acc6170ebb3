//! Answer generation over retrieved context.
//!
//! The language model is a collaborator of the retrieval core: it receives the
//! question, the ranked context chunks, optional transcript segments and the
//! recent conversation, and returns answer text.

mod extractive;
mod openai;

pub use extractive::ExtractiveModel;
pub use openai::OpenAIModel;

use crate::config::{LlmProvider, Prompts, Settings};
use crate::error::Result;
use crate::transcript::TimestampedSegment;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Who sent a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message of earlier conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a model needs to answer one question.
#[derive(Debug, Clone, Default)]
pub struct AnswerRequest {
    pub question: String,
    /// Retrieved chunk texts, best match first.
    pub context: Vec<String>,
    /// Transcript segments of the document, empty for text documents.
    pub segments: Vec<TimestampedSegment>,
    pub history: Vec<ChatMessage>,
}

/// Ordered answer tokens.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Trait for answer generation backends.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a complete answer.
    async fn answer(&self, request: &AnswerRequest) -> Result<String>;

    /// Generate an answer token by token.
    async fn stream_answer(&self, request: &AnswerRequest) -> Result<TokenStream>;

    /// Summarize document text.
    async fn summarize(&self, text: &str) -> Result<String>;

    /// Model identifier, for logs.
    fn name(&self) -> &str;
}

/// Create the language model selected by the settings.
pub fn create_model(settings: &Settings, prompts: Prompts) -> Result<Arc<dyn LanguageModel>> {
    let model: Arc<dyn LanguageModel> = match settings.llm.provider {
        LlmProvider::OpenAI => Arc::new(OpenAIModel::new(&settings.llm, prompts)?),
        LlmProvider::Extractive => {
            info!("Using offline extractive answers");
            Arc::new(ExtractiveModel::new())
        }
    };
    Ok(model)
}

/// Render segments as `[start s - end s]: text` lines.
pub fn format_segments(segments: &[TimestampedSegment]) -> String {
    segments
        .iter()
        .map(|s| format!("[{:.1}s - {:.1}s]: {}", s.start_time, s.end_time, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep the last `limit` messages.
pub fn recent_history(history: &[ChatMessage], limit: usize) -> &[ChatMessage] {
    &history[history.len().saturating_sub(limit)..]
}
