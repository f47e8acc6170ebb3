//! RAG (Retrieval-Augmented Generation) for question answering with sources.
//!
//! The [`Retriever`] turns a question into ranked chunks of one document; the
//! [`RagEngine`] feeds them to a language model and cites the chunks and
//! transcript segments the answer was built from.

mod engine;
mod retriever;

pub use engine::{ChatAnswer, ChatRequest, RagEngine, StreamEvent, NO_CONTEXT_ANSWER};
pub use retriever::{context_texts, source_labels, Retriever};
