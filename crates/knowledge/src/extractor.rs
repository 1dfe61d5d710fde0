//! Model-backed attribute extraction.
//!
//! The extractor reads a user question and reports which people, categories
//! and roles it mentions. Its output feeds [`kbfilter_filter::build_filter`].

use crate::prompts::{self, PromptLibrary};
use async_trait::async_trait;
use kbfilter_core::{AppError, AppResult};
use kbfilter_filter::{parse_extractor_output, ExtractedAttributeSet};
use kbfilter_llm::{LlmClient, LlmRequest};
use serde_json::{json, Value};
use std::sync::Arc;

/// Turns free text into extracted attribute records.
#[async_trait]
pub trait AttributeExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> AppResult<ExtractedAttributeSet>;
}

/// [`AttributeExtractor`] that prompts an LLM for JSON.
pub struct LlmExtractor {
    client: Arc<dyn LlmClient>,
    model: String,
    prompts: Arc<PromptLibrary>,
    categories: Vec<String>,
}

impl LlmExtractor {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            client,
            model: model.into(),
            prompts,
            categories: Vec::new(),
        }
    }

    /// Hint the model with the categories the documents actually use.
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }
}

#[async_trait]
impl AttributeExtractor for LlmExtractor {
    async fn extract(&self, text: &str) -> AppResult<ExtractedAttributeSet> {
        let prompt = self.prompts.render(
            prompts::EXTRACT,
            &json!({"query": text, "categories": self.categories}),
        )?;

        let request = LlmRequest::new(prompt, &self.model)
            .with_temperature(0.0)
            .with_max_tokens(512)
            .json();

        tracing::debug!(provider = self.client.provider_name(), model = %self.model, "Extracting attributes");
        let response = self.client.complete(&request).await?;

        let value = parse_model_json(&response.content)?;
        let attributes = parse_extractor_output(&value)?;

        tracing::info!(records = attributes.len(), "Extracted attributes from question");
        Ok(attributes)
    }
}

/// Parse a JSON document out of a model reply, tolerating Markdown code
/// fences and chatter around the payload.
pub(crate) fn parse_model_json(content: &str) -> AppResult<Value> {
    let trimmed = strip_code_fence(content.trim());

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(AppError::Llm(format!(
        "Model reply is not valid JSON: {}",
        preview(trimmed)
    )))
}

fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    // Drop the language tag line; a one-line fence has none to drop
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
