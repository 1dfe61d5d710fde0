//! Ingest command handler.

use super::print_json;
use clap::Args;
use kbfilter_core::{config::AppConfig, AppResult};
use kbfilter_knowledge::IngestOptions;
use std::path::PathBuf;

/// Ingest documents and their metadata sidecars
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Knowledge base name
    pub base: String,

    /// Files or directories to ingest
    #[arg(long, required = true)]
    pub path: Vec<PathBuf>,

    /// Only ingest paths containing one of these substrings
    #[arg(long)]
    pub include: Vec<String>,

    /// Skip paths containing any of these substrings
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Reset base before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for base '{}'", self.base);

        let options = IngestOptions {
            base_name: self.base.clone(),
            paths: self
                .path
                .iter()
                .map(|p| if p.is_absolute() { p.clone() } else { config.workspace.join(p) })
                .collect(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            reset: self.reset,
        };

        let stats = kbfilter_knowledge::ingest(&config.workspace, &options)?;

        if self.json {
            let mut output = serde_json::to_value(&stats)?;
            output["base"] = serde_json::json!(self.base);
            print_json(&output)?;
        } else {
            println!(
                "Ingested {} sources ({} chunks, {} bytes, {} skipped) in {:.2}s",
                stats.sources_count,
                stats.chunks_count,
                stats.bytes_processed,
                stats.skipped_count,
                stats.duration_secs
            );
        }

        Ok(())
    }
}
