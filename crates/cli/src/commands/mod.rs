//! Command handlers for the Docent CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod build;
pub mod context;
pub mod stats;

// Re-export command types for convenience
pub use build::BuildCommand;
pub use context::ContextCommand;
pub use stats::StatsCommand;

use docent_core::{config::AppConfig, AppError, AppResult};
use docent_knowledge::{BackendPreference, RetrievalEngine};

/// Open the retrieval engine for the configured workspace and backend.
pub(crate) fn open_engine(config: &AppConfig) -> AppResult<RetrievalEngine> {
    let preference: BackendPreference = config.backend.parse()?;
    RetrievalEngine::open(&config.workspace, preference)
}

/// Read the configured knowledge document.
pub(crate) fn read_document(config: &AppConfig) -> AppResult<String> {
    let path = config.document_path();
    if !path.is_file() {
        return Err(AppError::Config(format!(
            "Knowledge document not found: {}",
            path.display()
        )));
    }

    let document = std::fs::read_to_string(&path).map_err(|e| {
        AppError::Config(format!("Failed to read document {}: {}", path.display(), e))
    })?;

    tracing::debug!("Read {} bytes from {}", document.len(), path.display());
    Ok(document)
}

/// Print a value as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
