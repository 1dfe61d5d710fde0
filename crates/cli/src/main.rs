//! kbfilter CLI
//!
//! Metadata-filtered retrieval over local knowledge bases: ingest documents
//! with metadata sidecars, then ask questions with an explicit, extracted or
//! implicit filter.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AgentCommand, AskCommand, CleanCommand, ExtractCommand, IngestCommand, StatsCommand};
use kbfilter_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Metadata-filtered retrieval over local knowledge bases
#[derive(Parser, Debug)]
#[command(name = "kbfilter")]
#[command(about = "Metadata-filtered retrieval over local knowledge bases", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "KBFILTER_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file (default: <workspace>/.kbfilter/config.yaml)
    #[arg(short, long, global = true, env = "KBFILTER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, mock)
    #[arg(short, long, global = true, env = "KBFILTER_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "KBFILTER_MODEL")]
    model: Option<String>,

    /// Provider endpoint URL
    #[arg(long, global = true, env = "KBFILTER_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest documents and their metadata into a knowledge base
    Ingest(IngestCommand),

    /// Ask a question, optionally restricted by a metadata filter
    Ask(AskCommand),

    /// Extract attributes from text and show the filter built from them
    Extract(ExtractCommand),

    /// Inspect agent definition files
    Agent(AgentCommand),

    /// Show knowledge base statistics
    Stats(StatsCommand),

    /// Remove all documents from a knowledge base
    Clean(CleanCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())?;
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.endpoint,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("kbfilter starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;
    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Ask(_) => "ask",
        Commands::Extract(_) => "extract",
        Commands::Agent(_) => "agent",
        Commands::Stats(_) => "stats",
        Commands::Clean(_) => "clean",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config),
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Extract(cmd) => cmd.execute(&config).await,
        Commands::Agent(cmd) => cmd.execute(),
        Commands::Stats(cmd) => cmd.execute(&config),
        Commands::Clean(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
