//! Build command handler.
//!
//! Builds (or reuses) the persisted index for the knowledge document.

use super::{open_engine, print_json, read_document};
use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::IndexSource;

/// Build the index from the knowledge document
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Rebuild even if the persisted index is current
    #[arg(short, long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BuildCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing build command");

        let document = read_document(config)?;
        let engine = open_engine(config)?;

        let source = if self.force {
            engine.rebuild(&document)?;
            IndexSource::Built
        } else {
            engine.load_or_build(&document)?
        };

        let status = engine.status();

        if self.json {
            let output = serde_json::json!({
                "source": source,
                "backend": status.backend,
                "modelIdentifier": status.model_identifier,
                "chunkCount": status.chunk_count,
                "builtAt": status.built_at,
                "indexPath": status.index_path,
            });
            print_json(&output)?;
        } else {
            let verb = match source {
                IndexSource::Built => "Built",
                IndexSource::Loaded => "Loaded current",
            };
            println!(
                "{} index: {} chunks ({} backend, model {})",
                verb, status.chunk_count, status.backend, status.model_identifier
            );
            println!("  Index: {}", status.index_path.display());
        }

        Ok(())
    }
}
