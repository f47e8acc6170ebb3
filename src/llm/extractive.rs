//! Offline answers assembled from the retrieved context itself.
//!
//! Sentences of the context are scored by how many distinct question terms
//! they contain, and the best few are returned in the order they appear in the
//! context. Deterministic and network-free.

use super::{AnswerRequest, LanguageModel, TokenStream};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;

const NO_INFORMATION: &str = "I don't have enough information in the provided context to answer that.";
const MAX_SENTENCES: usize = 3;
const SUMMARY_MAX_CHARS: usize = 500;

/// Extractive language model.
#[derive(Debug, Default)]
pub struct ExtractiveModel;

impl ExtractiveModel {
    pub fn new() -> Self {
        Self
    }

    fn compose(&self, request: &AnswerRequest) -> String {
        let sentences: Vec<&str> = request
            .context
            .iter()
            .flat_map(|chunk| split_sentences(chunk))
            .collect();
        if sentences.is_empty() {
            return NO_INFORMATION.to_string();
        }

        let question = terms(&request.question);
        let mut scored: Vec<(usize, usize)> = sentences
            .iter()
            .enumerate()
            .map(|(position, sentence)| (position, terms(sentence).intersection(&question).count()))
            .filter(|(_, overlap)| *overlap > 0)
            .collect();

        if scored.is_empty() {
            // Nothing overlaps; the best-ranked context is still the best guess.
            return sentences[0].to_string();
        }

        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(MAX_SENTENCES);
        scored.sort_by_key(|(position, _)| *position);

        scored
            .iter()
            .map(|(position, _)| sentences[*position])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Lowercased alphanumeric words longer than two characters.
fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl LanguageModel for ExtractiveModel {
    async fn answer(&self, request: &AnswerRequest) -> Result<String> {
        Ok(self.compose(request))
    }

    async fn stream_answer(&self, request: &AnswerRequest) -> Result<TokenStream> {
        let answer = self.compose(request);
        let tokens: Vec<Result<String>> = answer
            .split_inclusive(' ')
            .map(|token| Ok(token.to_string()))
            .collect();
        Ok(stream::iter(tokens).boxed())
    }

    async fn summarize(&self, text: &str) -> Result<String> {
        let mut summary = String::new();
        for sentence in split_sentences(text) {
            let separator = usize::from(!summary.is_empty());
            let needed = separator + sentence.chars().count();
            if summary.chars().count() + needed > SUMMARY_MAX_CHARS {
                break;
            }
            if !summary.is_empty() {
                summary.push(' ');
            }
            summary.push_str(sentence);
        }

        if summary.is_empty() {
            summary = text.trim().chars().take(SUMMARY_MAX_CHARS).collect();
        }
        Ok(summary)
    }

    fn name(&self) -> &str {
        "extractive"
    }
}
