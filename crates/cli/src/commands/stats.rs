//! Stats and clean command handlers.

use super::print_json;
use clap::Args;
use kbfilter_core::{config::AppConfig, AppResult};

/// Show knowledge base statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Knowledge base name
    pub base: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command for base '{}'", self.base);

        let stats = kbfilter_knowledge::stats(&config.workspace, &self.base)?;

        if self.json {
            print_json(&serde_json::to_value(&stats)?)?;
        } else {
            println!("Knowledge base: {}", stats.base_name);
            println!("  Sources: {}", stats.sources_count);
            println!("  Chunks: {}", stats.chunks_count);
            println!("  DB size: {} bytes", stats.db_size_bytes);
            if let Some(last_ingest) = stats.last_ingest_at {
                println!("  Last ingest: {}", last_ingest);
            }
        }

        Ok(())
    }
}

/// Remove all documents from a knowledge base
#[derive(Args, Debug)]
pub struct CleanCommand {
    /// Knowledge base name
    pub base: String,
}

impl CleanCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clean command for base '{}'", self.base);

        kbfilter_knowledge::clean(&config.workspace, &self.base)?;
        println!("Knowledge base '{}' cleaned", self.base);

        Ok(())
    }
}
