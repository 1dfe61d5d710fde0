//! Ask command handler.
//!
//! Resolves a metadata filter by the selected method and answers through the
//! retrieval agent.

use super::{model_context, print_json};
use clap::{ArgGroup, Args};
use kbfilter_core::{config::AppConfig, AppError, AppResult};
use kbfilter_filter::{FilterExpression, FilterKeys};
use kbfilter_knowledge::{
    AgentDefinition, FilterMethod, FilteredRetrieval, ImplicitFilterGenerator, KnowledgeAgent,
    LlmExtractor,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Ask a question, optionally restricted by a metadata filter
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("method").args(["filter", "filter_file", "extract", "implicit"])))]
pub struct AskCommand {
    /// Knowledge base name
    pub base: String,

    /// The question
    pub query: String,

    /// Explicit filter as JSON, e.g. '{"equals":{"key":"category","value":"finance"}}'
    #[arg(long)]
    pub filter: Option<String>,

    /// Read the explicit filter from a JSON file
    #[arg(long)]
    pub filter_file: Option<PathBuf>,

    /// Extract people, categories and roles from the question and filter on them
    #[arg(long)]
    pub extract: bool,

    /// Let the model write the filter from the agent's metadata attributes
    #[arg(long)]
    pub implicit: bool,

    /// Agent definition file (default: a plain agent over BASE)
    #[arg(long)]
    pub agent: Option<PathBuf>,

    /// Number of chunks to retrieve per knowledge base
    #[arg(short = 'k', long)]
    pub top_k: Option<u32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command for base '{}'", self.base);

        let method = self.method()?;
        let keys = FilterKeys::from(&config.filter);
        let definition = self.definition(&keys)?;

        let (client, prompts) = model_context(config)?;
        let schema = definition.metadata_schema();

        let agent = KnowledgeAgent::new(
            config.workspace.clone(),
            definition,
            client.clone(),
            config.model.clone(),
            prompts.clone(),
        )
        .with_top_k(self.top_k);

        let mut pipeline = FilteredRetrieval::new(Arc::new(agent), keys);
        match method {
            FilterMethod::Extracted => {
                let categories =
                    kbfilter_knowledge::metadata_values(&config.workspace, &self.base, &config.filter.category_key)?;
                let extractor = LlmExtractor::new(client, config.model.clone(), prompts)
                    .with_categories(categories);
                pipeline = pipeline.with_extractor(Arc::new(extractor));
            }
            FilterMethod::Implicit => {
                pipeline = pipeline.with_generator(ImplicitFilterGenerator::new(
                    client,
                    config.model.clone(),
                    prompts,
                    schema,
                ));
            }
            FilterMethod::None | FilterMethod::Explicit(_) => {}
        }

        let result = pipeline.answer(&self.query, &method).await?;

        if self.json {
            return print_json(&serde_json::to_value(&result)?);
        }

        println!("Answer:");
        println!("{}", result.answer.answer);
        println!();

        match &result.answer.filter {
            Some(filter) => println!("Filter ({}): {}", result.method, filter),
            None => println!("Filter ({}): none", result.method),
        }

        if result.answer.citations.is_empty() {
            println!("Sources: (no sources available)");
        } else {
            println!("Sources:");
            for citation in &result.answer.citations {
                println!("- {} ({:.2})", citation.source, citation.score);
            }
        }

        Ok(())
    }

    fn method(&self) -> AppResult<FilterMethod> {
        if let Some(json) = &self.filter {
            return Ok(FilterMethod::Explicit(FilterExpression::parse(json)?));
        }

        if let Some(path) = &self.filter_file {
            let json = std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read filter file {:?}: {}", path, e))
            })?;
            return Ok(FilterMethod::Explicit(FilterExpression::parse(&json)?));
        }

        Ok(if self.extract {
            FilterMethod::Extracted
        } else if self.implicit {
            FilterMethod::Implicit
        } else {
            FilterMethod::None
        })
    }

    fn definition(&self, keys: &FilterKeys) -> AppResult<AgentDefinition> {
        let Some(path) = &self.agent else {
            return Ok(AgentDefinition::default_for(&self.base, keys));
        };

        let definition = AgentDefinition::load(path)?;
        if !definition
            .knowledge_bases
            .iter()
            .any(|kb| kb.knowledge_base_id == self.base)
        {
            return Err(AppError::Config(format!(
                "Agent '{}' is not bound to knowledge base '{}'",
                definition.agent_name, self.base
            )));
        }
        Ok(definition)
    }
}
