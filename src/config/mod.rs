//! Configuration module for Docent.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts, SummaryPrompts};
pub use settings::{
    ChunkingSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings, LlmProvider,
    LlmSettings, PromptSettings, RagSettings, Settings, TimestampSettings, VectorStoreProvider,
    VectorStoreSettings,
};
