//! OpenAI chat completions backend.

use super::{format_segments, recent_history, AnswerRequest, LanguageModel, Role, TokenStream};
use crate::config::{LlmSettings, Prompts};
use crate::error::{DocentError, Result};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// OpenAI-based language model.
pub struct OpenAIModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
    summary_max_tokens: u32,
    summary_input_chars: usize,
    history_messages: usize,
    prompts: Prompts,
}

impl OpenAIModel {
    /// Create a model from the LLM settings.
    pub fn new(settings: &LlmSettings, prompts: Prompts) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(Duration::from_secs(settings.timeout_seconds))?,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            summary_max_tokens: settings.summary_max_tokens,
            summary_input_chars: settings.summary_input_chars,
            history_messages: settings.history_messages,
            prompts,
        })
    }

    fn user_prompt(&self, request: &AnswerRequest) -> String {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), request.question.clone());
        vars.insert("context".to_string(), request.context.join("\n\n"));

        let mut prompt = self.prompts.render_with_custom(&self.prompts.answer.user, &vars);
        if !request.segments.is_empty() {
            prompt.push_str("\n\nTimestamped Transcript:\n");
            prompt.push_str(&format_segments(&request.segments));
        }
        prompt
    }

    fn build_messages(&self, system: &str, request: &AnswerRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![system_message(system)?];

        for message in recent_history(&request.history, self.history_messages) {
            let message: ChatCompletionRequestMessage = match message.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(request_error)?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(message.content.clone())
                    .build()
                    .map_err(request_error)?
                    .into(),
            };
            messages.push(message);
        }

        messages.push(user_message(self.user_prompt(request))?);
        Ok(messages)
    }

    async fn complete(&self, messages: Vec<ChatCompletionRequestMessage>, max_tokens: u32) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(max_tokens)
            .build()
            .map_err(request_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| DocentError::Upstream(format!("Failed to generate response: {}", e)))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| DocentError::Upstream("Empty response from LLM".to_string()))
    }
}

fn request_error(e: async_openai::error::OpenAIError) -> DocentError {
    DocentError::Upstream(format!("Failed to build request: {}", e))
}

fn system_message(content: &str) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestSystemMessageArgs::default()
        .content(content.to_string())
        .build()
        .map_err(request_error)?
        .into())
}

fn user_message(content: String) -> Result<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(content)
        .build()
        .map_err(request_error)?
        .into())
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    #[instrument(skip(self, request), fields(context = request.context.len()))]
    async fn answer(&self, request: &AnswerRequest) -> Result<String> {
        let messages = self.build_messages(&self.prompts.answer.system, request)?;
        let answer = self.complete(messages, self.max_tokens).await?;
        debug!("Generated answer of {} characters", answer.len());
        Ok(answer)
    }

    #[instrument(skip(self, request), fields(context = request.context.len()))]
    async fn stream_answer(&self, request: &AnswerRequest) -> Result<TokenStream> {
        let messages = self.build_messages(&self.prompts.answer.stream_system, request)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(self.max_tokens)
            .build()
            .map_err(request_error)?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| DocentError::Upstream(format!("Failed to start stream: {}", e)))?;

        let tokens = stream.filter_map(|item| async move {
            match item {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(DocentError::Upstream(format!("Stream error: {}", e)))),
            }
        });

        Ok(tokens.boxed())
    }

    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn summarize(&self, text: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert(
            "text".to_string(),
            truncate_chars(text, self.summary_input_chars).to_string(),
        );
        let prompt = self.prompts.render_with_custom(&self.prompts.summary.user, &vars);

        let messages = vec![system_message(&self.prompts.summary.system)?, user_message(prompt)?];
        let summary = self.complete(messages, self.summary_max_tokens).await?;
        info!("Generated summary");
        Ok(summary)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
