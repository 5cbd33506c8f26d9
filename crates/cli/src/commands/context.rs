//! Context command handler.
//!
//! Retrieves the context string for a query.

use super::{open_engine, print_json, read_document};
use clap::Args;
use docent_core::{config::AppConfig, AppResult};
use docent_knowledge::compose_context;

/// Retrieve context for a query
#[derive(Args, Debug)]
pub struct ContextCommand {
    /// Query text
    pub query: String,

    /// Number of chunks to consider (default: top_k from retrieval.yaml)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ContextCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing context command");

        let engine = open_engine(config)?;
        if !engine.load() {
            tracing::info!("No usable index on disk, building from the document");
            engine.build(&read_document(config)?)?;
        }

        let k = self.top_k.unwrap_or_else(|| engine.top_k());
        let relevant = engine.retrieve(&self.query, k)?;
        let context = compose_context(&relevant);

        if self.json {
            let output = serde_json::json!({
                "query": self.query,
                "k": k,
                "backend": engine.backend().kind(),
                "context": context,
                "chunks": relevant,
            });
            print_json(&output)?;
        } else {
            println!("{}", context);
        }

        Ok(())
    }
}
