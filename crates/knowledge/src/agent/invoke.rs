//! Retrieval agent invocation.

use super::definition::AgentDefinition;
use crate::prompts::{self, PromptLibrary};
use crate::types::{RetrieveOptions, RetrievedChunk};
use async_trait::async_trait;
use kbfilter_core::{AppError, AppResult};
use kbfilter_filter::FilterExpression;
use kbfilter_llm::{LlmClient, LlmRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Maximum snippet length for citations, in characters.
const MAX_SNIPPET_CHARS: usize = 150;

/// Answer returned by a retrieval agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnswer {
    pub answer: String,

    /// Documents the answer was grounded on, best first
    pub citations: Vec<Citation>,

    /// Filter the retrieval ran with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpression>,
}

impl AgentAnswer {
    /// Fixed answer when retrieval finds nothing.
    pub fn no_information(query: &str, filter: Option<FilterExpression>) -> Self {
        Self {
            answer: format!(
                "I could not find information about \"{}\" in the available documents.",
                query
            ),
            citations: Vec::new(),
            filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub snippet: String,
    pub score: f32,
}

/// Answers a query using retrieval restricted by an optional filter.
#[async_trait]
pub trait RetrievalAgent: Send + Sync {
    async fn invoke(&self, query: &str, filter: Option<&FilterExpression>) -> AppResult<AgentAnswer>;
}

/// [`RetrievalAgent`] over the local knowledge bases named in a definition.
pub struct KnowledgeAgent {
    workspace: PathBuf,
    definition: AgentDefinition,
    client: Arc<dyn LlmClient>,
    model: String,
    prompts: Arc<PromptLibrary>,
    top_k: Option<u32>,
}

impl KnowledgeAgent {
    /// `model` is used unless the definition names a foundation model.
    pub fn new(
        workspace: impl Into<PathBuf>,
        definition: AgentDefinition,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompts: Arc<PromptLibrary>,
    ) -> Self {
        let model = definition
            .foundation_model
            .clone()
            .unwrap_or_else(|| model.into());

        Self {
            workspace: workspace.into(),
            definition,
            client,
            model,
            prompts,
            top_k: None,
        }
    }

    /// Override every base's `numberOfResults`.
    pub fn with_top_k(mut self, top_k: Option<u32>) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// Runs the SQLite lookups on the blocking pool.
    async fn retrieve_all(&self, query: &str, filter: Option<&FilterExpression>) -> AppResult<Vec<RetrievedChunk>> {
        let workspace = self.workspace.clone();
        let requests: Vec<RetrieveOptions> = self
            .definition
            .knowledge_bases
            .iter()
            .map(|binding| RetrieveOptions {
                base_name: binding.knowledge_base_id.clone(),
                query: query.to_string(),
                top_k: Some(self.top_k.unwrap_or(binding.number_of_results)),
                filter: filter.cloned(),
            })
            .collect();

        tokio::task::spawn_blocking(move || retrieve_bases(&workspace, &requests))
            .await
            .map_err(|e| AppError::Knowledge(format!("Retrieval task failed: {}", e)))?
    }
}

fn retrieve_bases(workspace: &Path, requests: &[RetrieveOptions]) -> AppResult<Vec<RetrievedChunk>> {
    let mut chunks = Vec::new();
    for options in requests {
        chunks.extend(crate::retrieve(workspace, options)?);
    }

    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(chunks)
}

#[async_trait]
impl RetrievalAgent for KnowledgeAgent {
    async fn invoke(&self, query: &str, filter: Option<&FilterExpression>) -> AppResult<AgentAnswer> {
        tracing::info!(
            agent = %self.definition.agent_name,
            filtered = filter.is_some(),
            "Invoking retrieval agent"
        );

        let chunks = self.retrieve_all(query, filter).await?;
        if chunks.is_empty() {
            tracing::info!("No matching documents, skipping model call");
            return Ok(AgentAnswer::no_information(query, filter.cloned()));
        }

        let documents: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| {
                json!({
                    "index": i + 1,
                    "source": c.source_path,
                    "text": c.chunk.text,
                })
            })
            .collect();
        let prompt = self.prompts.render(
            prompts::ANSWER,
            &json!({"query": query, "documents": documents}),
        )?;

        let request = LlmRequest::new(prompt, &self.model)
            .with_system(&self.definition.instruction)
            .with_temperature(0.3)
            .with_max_tokens(1000);

        let response = self.client.complete(&request).await?;
        tracing::debug!(
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "Agent answered"
        );

        Ok(AgentAnswer {
            answer: response.content.trim().to_string(),
            citations: citations(&chunks),
            filter: filter.cloned(),
        })
    }
}

/// One citation per source, keeping its best-scoring chunk.
fn citations(chunks: &[RetrievedChunk]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|c| seen.insert(c.source_path.as_str()))
        .map(|c| Citation {
            source: c.source_path.clone(),
            snippet: snippet(&c.chunk.text),
            score: c.score,
        })
        .collect()
}

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}
