//! Question answering over one document, with sources and timestamps.

use super::retriever::{context_texts, source_labels, Retriever};
use crate::error::Result;
use crate::llm::{AnswerRequest, ChatMessage, LanguageModel, TokenStream};
use crate::transcript::{TimestampMatcher, TimestampedSegment};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Answer given when retrieval finds nothing for the document.
pub const NO_CONTEXT_ANSWER: &str = "I couldn't find any relevant information in this document for that question.";

/// A question about one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatRequest {
    pub document_id: String,
    pub question: String,
    pub conversation_history: Vec<ChatMessage>,
    /// Transcript of an audio or video document.
    pub segments: Option<Vec<TimestampedSegment>>,
    /// Overrides the configured number of context chunks.
    pub top_k: Option<usize>,
}

impl ChatRequest {
    pub fn new(document_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            question: question.into(),
            ..Default::default()
        }
    }

    fn transcript(&self) -> &[TimestampedSegment] {
        self.segments.as_deref().unwrap_or(&[])
    }
}

/// Answer with the chunks it was based on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    /// Citation labels of the context chunks, best match first.
    pub sources: Vec<String>,
    /// Transcript segments the answer refers to; `None` for text documents.
    pub timestamps: Option<Vec<TimestampedSegment>>,
}

/// One item of a streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token(String),
    Error(String),
    Done,
}

impl StreamEvent {
    /// Payload of the server-sent event carrying this item.
    pub fn sse_data(&self) -> String {
        match self {
            StreamEvent::Token(content) => serde_json::json!({ "content": content }).to_string(),
            StreamEvent::Error(message) => serde_json::json!({ "error": message }).to_string(),
            StreamEvent::Done => "[DONE]".to_string(),
        }
    }
}

/// RAG engine for question answering.
pub struct RagEngine {
    retriever: Retriever,
    model: Arc<dyn LanguageModel>,
    matcher: TimestampMatcher,
    top_k: usize,
}

impl RagEngine {
    /// Create a new RAG engine.
    pub fn new(retriever: Retriever, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            retriever,
            model,
            matcher: TimestampMatcher::default(),
            top_k: 5,
        }
    }

    /// Set the default number of context chunks.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the timestamp matcher.
    pub fn with_matcher(mut self, matcher: TimestampMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer a question about a document.
    #[instrument(skip(self, request), fields(document_id = %request.document_id))]
    pub async fn ask(&self, request: &ChatRequest) -> Result<ChatAnswer> {
        info!("Processing question: {}", request.question);

        let top_k = request.top_k.unwrap_or(self.top_k);
        let results = self
            .retriever
            .retrieve(&request.question, &request.document_id, top_k)
            .await?;

        if results.is_empty() {
            return Ok(ChatAnswer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
                timestamps: None,
            });
        }

        let answer_request = AnswerRequest {
            question: request.question.clone(),
            context: context_texts(&results),
            segments: request.transcript().to_vec(),
            history: request.conversation_history.clone(),
        };

        let answer = self.model.answer(&answer_request).await?;

        let timestamps = match request.transcript() {
            [] => None,
            segments => Some(self.matcher.find_matches(&answer, segments)),
        };

        Ok(ChatAnswer {
            answer,
            sources: source_labels(&results),
            timestamps,
        })
    }

    /// Stream an answer token by token.
    ///
    /// Yields tokens in order, at most one error (after which no more tokens
    /// follow), and always ends with exactly one [`StreamEvent::Done`].
    pub fn stream(&self, request: &ChatRequest) -> BoxStream<'static, StreamEvent> {
        let retriever = self.retriever.clone();
        let model = Arc::clone(&self.model);
        let request = request.clone();
        let top_k = request.top_k.unwrap_or(self.top_k);

        let started = start_stream(retriever, model, request, top_k);

        let tokens = stream::once(started).flat_map(|started: Result<TokenStream>| match started {
            Ok(tokens) => tokens,
            Err(e) => stream::iter(vec![Err(e)]).boxed(),
        });

        tokens
            .scan(false, |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                let event = match item {
                    Ok(token) => StreamEvent::Token(token),
                    Err(e) => {
                        warn!("Answer stream failed: {}", e);
                        *failed = true;
                        StreamEvent::Error(e.to_string())
                    }
                };
                future::ready(Some(event))
            })
            .chain(stream::once(future::ready(StreamEvent::Done)))
            .boxed()
    }
}

async fn start_stream(
    retriever: Retriever,
    model: Arc<dyn LanguageModel>,
    request: ChatRequest,
    top_k: usize,
) -> Result<TokenStream> {
    let results = retriever
        .retrieve(&request.question, &request.document_id, top_k)
        .await?;

    if results.is_empty() {
        return Ok(stream::iter(vec![Ok(NO_CONTEXT_ANSWER.to_string())]).boxed());
    }

    let answer_request = AnswerRequest {
        question: request.question.clone(),
        context: context_texts(&results),
        segments: request.transcript().to_vec(),
        history: request.conversation_history.clone(),
    };
    model.stream_answer(&answer_request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Embedder, HashEmbedder};
    use crate::error::DocentError;
    use crate::llm::ExtractiveModel;
    use crate::vector_store::{MemoryVectorIndex, VectorIndex};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn engine_with(model: Arc<dyn LanguageModel>, chunks: &[&str]) -> RagEngine {
        let embedder = Arc::new(HashEmbedder::new(128));
        let index = Arc::new(MemoryVectorIndex::new(128));

        let texts: Vec<String> = chunks.iter().map(|s| s.to_string()).collect();
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        index.upsert("doc", &texts, &vectors).await.unwrap();

        RagEngine::new(Retriever::new(index, embedder).unwrap(), model)
    }

    /// Counts calls and fails mid-stream.
    #[derive(Default)]
    struct FlakyModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for FlakyModel {
        async fn answer(&self, _request: &AnswerRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Python programming answer".to_string())
        }

        async fn stream_answer(&self, _request: &AnswerRequest) -> Result<TokenStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(stream::iter(vec![
                Ok("one ".to_string()),
                Err(DocentError::Upstream("connection reset".to_string())),
                Ok("two".to_string()),
            ])
            .boxed())
        }

        async fn summarize(&self, _text: &str) -> Result<String> {
            Ok(String::new())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_ask_returns_sources() {
        let engine = engine_with(
            Arc::new(ExtractiveModel::new()),
            &["Rust has no garbage collector.", "Bread needs flour."],
        )
        .await;

        let answer = engine
            .ask(&ChatRequest::new("doc", "Does Rust have a garbage collector?"))
            .await
            .unwrap();

        assert_eq!(answer.answer, "Rust has no garbage collector.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0], "Chunk 0");
        assert!(answer.timestamps.is_none());
    }

    #[tokio::test]
    async fn test_empty_retrieval_skips_the_model() {
        let model = Arc::new(FlakyModel::default());
        let engine = engine_with(model.clone(), &["something"]).await;

        let answer = engine.ask(&ChatRequest::new("unknown", "anything?")).await.unwrap();
        assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
        assert!(answer.sources.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ask_matches_timestamps() {
        let model = Arc::new(FlakyModel::default());
        let engine = engine_with(model, &["Python programming basics"]).await;

        let mut request = ChatRequest::new("doc", "what is taught?");
        request.segments = Some(vec![
            TimestampedSegment::new(0.0, 5.0, "Python programming language"),
            TimestampedSegment::new(5.0, 10.0, "Short"),
        ]);

        let answer = engine.ask(&request).await.unwrap();
        let timestamps = answer.timestamps.unwrap();
        assert_eq!(timestamps.len(), 1);
        assert_eq!(timestamps[0].start_time, 0.0);
    }

    #[tokio::test]
    async fn test_stream_ends_with_single_done() {
        let engine = engine_with(Arc::new(ExtractiveModel::new()), &["Tokio is an async runtime."]).await;

        let events: Vec<StreamEvent> = engine
            .stream(&ChatRequest::new("doc", "What is Tokio?"))
            .collect()
            .await;

        assert_eq!(events.last(), Some(&StreamEvent::Done));
        assert_eq!(events.iter().filter(|e| **e == StreamEvent::Done).count(), 1);

        let text: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Tokio is an async runtime.");
    }

    #[tokio::test]
    async fn test_stream_stops_after_error() {
        let engine = engine_with(Arc::new(FlakyModel::default()), &["anything at all"]).await;

        let events: Vec<StreamEvent> = engine
            .stream(&ChatRequest::new("doc", "anything"))
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::Token("one ".to_string()));
        assert!(matches!(&events[1], StreamEvent::Error(msg) if msg.contains("connection reset")));
        assert_eq!(events[2], StreamEvent::Done);
    }

    #[tokio::test]
    async fn test_stream_for_unknown_document() {
        let engine = engine_with(Arc::new(ExtractiveModel::new()), &["x"]).await;
        let events: Vec<StreamEvent> = engine.stream(&ChatRequest::new("nope", "q")).collect().await;
        assert_eq!(
            events,
            vec![StreamEvent::Token(NO_CONTEXT_ANSWER.to_string()), StreamEvent::Done]
        );
    }

    #[test]
    fn test_sse_data() {
        assert_eq!(StreamEvent::Token("hi".to_string()).sse_data(), r#"{"content":"hi"}"#);
        assert_eq!(StreamEvent::Error("bad".to_string()).sse_data(), r#"{"error":"bad"}"#);
        assert_eq!(StreamEvent::Done.sse_data(), "[DONE]");
    }
}
