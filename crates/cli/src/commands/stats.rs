//! Stats command handler.
//!
//! Reports the persisted index without building one.

use super::{open_engine, print_json};
use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::EngineState;

/// Show index status
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let engine = open_engine(config)?;
        engine.load();
        let status = engine.status();

        if self.json {
            return print_json(&status);
        }

        println!("Index: {}", status.index_path.display());
        if status.state == EngineState::Unbuilt {
            println!("  State: unbuilt (run 'docent build')");
            println!("  Backend: {}", status.backend);
            return Ok(());
        }

        println!("  State: ready");
        println!("  Backend: {}", status.backend);
        println!("  Model: {}", status.model_identifier);
        println!("  Chunks: {}", status.chunk_count);
        if let Some(built_at) = status.built_at {
            println!("  Built: {}", built_at.to_rfc3339());
        }

        Ok(())
    }
}
