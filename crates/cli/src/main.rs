//! Docent CLI
//!
//! Main entry point for the docent command-line tool.
//! Builds and queries the context index for a knowledge document.

mod commands;

use clap::{Parser, Subcommand};
use commands::{BuildCommand, ContextCommand, StatsCommand};
use docent_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Docent - context retrieval over a knowledge document
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(about = "Context retrieval over a knowledge document", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCENT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCENT_CONFIG")]
    config: Option<PathBuf>,

    /// Knowledge document (relative paths resolve against the workspace)
    #[arg(short, long, global = true, env = "DOCENT_DOCUMENT")]
    document: Option<PathBuf>,

    /// Similarity backend (auto, exact, dense, lexical)
    #[arg(short, long, global = true, env = "DOCENT_BACKEND")]
    backend: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build (or reuse) the index for the knowledge document
    Build(BuildCommand),

    /// Print the context for a query
    Context(ContextCommand),

    /// Show index status
    Stats(StatsCommand),
}

fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment
    let config = AppConfig::load()?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.document,
        cli.backend,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.validate()?;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Docent CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Document: {:?}", config.document_path());
    tracing::debug!("Backend: {}", config.backend);

    config.ensure_docent_dir()?;

    let command_name = match &cli.command {
        Commands::Build(_) => "build",
        Commands::Context(_) => "context",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Build(cmd) => cmd.execute(&config),
        Commands::Context(cmd) => cmd.execute(&config),
        Commands::Stats(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
