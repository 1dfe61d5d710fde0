//! Command handlers for the kbfilter CLI.

pub mod agent;
pub mod ask;
pub mod extract;
pub mod ingest;
pub mod stats;

pub use agent::AgentCommand;
pub use ask::AskCommand;
pub use extract::ExtractCommand;
pub use ingest::IngestCommand;
pub use stats::{CleanCommand, StatsCommand};

use kbfilter_core::{config::AppConfig, AppResult};
use kbfilter_knowledge::PromptLibrary;
use kbfilter_llm::{client_from_config, LlmClient};
use serde_json::Value;
use std::sync::Arc;

/// Client for the configured provider plus the workspace prompt library.
pub(crate) fn model_context(config: &AppConfig) -> AppResult<(Arc<dyn LlmClient>, Arc<PromptLibrary>)> {
    let client = client_from_config(config)?;
    let prompts = Arc::new(PromptLibrary::load(&config.workspace)?);
    Ok((client, prompts))
}

pub(crate) fn print_json(value: &Value) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
