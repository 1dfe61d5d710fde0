//! Extract command handler.

use super::{model_context, print_json};
use clap::Args;
use kbfilter_core::{config::AppConfig, AppResult};
use kbfilter_filter::{build_candidate_filters, build_filter, FilterKeys};
use kbfilter_knowledge::{AttributeExtractor, LlmExtractor};
use serde_json::json;

/// Extract attributes from text and show the filter built from them
#[derive(Args, Debug)]
pub struct ExtractCommand {
    /// Text to extract from
    pub text: String,

    /// Knowledge base whose categories are offered to the model
    #[arg(long)]
    pub base: Option<String>,

    /// Also show one candidate filter per extracted record
    #[arg(long)]
    pub candidates: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ExtractCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let (client, prompts) = model_context(config)?;

        let mut extractor = LlmExtractor::new(client, config.model.clone(), prompts);
        if let Some(base) = &self.base {
            extractor = extractor.with_categories(kbfilter_knowledge::metadata_values(
                &config.workspace,
                base,
                &config.filter.category_key,
            )?);
        }

        let keys = FilterKeys::from(&config.filter);
        let attributes = extractor.extract(&self.text).await?;
        let filter = build_filter(Some(&attributes), &keys);
        let candidates = self
            .candidates
            .then(|| build_candidate_filters(&attributes, &keys));

        if self.json {
            let mut output = json!({
                "attributes": attributes,
                "filter": filter,
            });
            if let Some(candidates) = &candidates {
                output["candidates"] = json!(candidates);
            }
            return print_json(&output);
        }

        println!("Attributes:");
        if attributes.is_empty() {
            println!("  (none)");
        }
        for record in attributes.iter() {
            println!("  {}", serde_json::to_string(record)?);
        }

        match &filter {
            Some(filter) => println!("Filter: {}", filter),
            None => println!("Filter: null"),
        }

        if let Some(candidates) = candidates {
            println!("Candidates:");
            for candidate in candidates {
                println!("  {}", candidate);
            }
        }

        Ok(())
    }
}
