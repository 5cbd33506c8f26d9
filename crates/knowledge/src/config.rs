//! Retrieval configuration management.

use crate::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embeddings::EmbeddingConfig;
use crate::types::BackendKind;
use docent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Minimum score (exclusive) a chunk needs to reach the context string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceThresholds {
    /// Cosine / inner-product cutoff for the vector backends
    #[serde(default = "default_vector_threshold")]
    pub vector: f32,

    /// Jaccard cutoff for the lexical backend
    #[serde(default = "default_lexical_threshold")]
    pub lexical: f32,
}

fn default_vector_threshold() -> f32 {
    0.3
}

fn default_lexical_threshold() -> f32 {
    0.1
}

impl Default for RelevanceThresholds {
    fn default() -> Self {
        Self {
            vector: default_vector_threshold(),
            lexical: default_lexical_threshold(),
        }
    }
}

impl RelevanceThresholds {
    pub fn for_backend(&self, kind: BackendKind) -> f32 {
        if kind.uses_vectors() {
            self.vector
        } else {
            self.lexical
        }
    }
}

/// Settings for chunking, ranking, persistence and embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Accepted for compatibility; chunks never overlap
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks requested per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub thresholds: RelevanceThresholds,

    /// Blob file name inside `.docent/`
    #[serde(default = "default_index_file")]
    pub index_file: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_top_k() -> usize {
    3
}

fn default_index_file() -> String {
    "index.bin".to_string()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            thresholds: RelevanceThresholds::default(),
            index_file: default_index_file(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunk_size must be positive".to_string()));
        }

        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be positive".to_string()));
        }

        if self.index_file.trim().is_empty() {
            return Err(AppError::Config("index_file must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Load retrieval configuration.
///
/// Reads `.docent/retrieval.yaml` if it exists, otherwise returns defaults.
pub fn load_config(workspace: &Path) -> AppResult<RetrievalConfig> {
    let config_path = get_config_path(workspace);

    if !config_path.exists() {
        tracing::debug!("Using default retrieval config (no config file found)");
        return Ok(RetrievalConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
    })?;

    let config: RetrievalConfig = serde_yaml::from_str(&content).map_err(|e| {
        AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
    })?;

    config.validate()?;

    tracing::debug!("Loaded retrieval config from {:?}", config_path);
    Ok(config)
}

/// Save retrieval configuration.
pub fn save_config(workspace: &Path, config: &RetrievalConfig) -> AppResult<()> {
    let config_path = get_config_path(workspace);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!("Saved retrieval config to {:?}", config_path);
    Ok(())
}

/// Get the path to the retrieval config file.
pub fn get_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".docent").join("retrieval.yaml")
}

/// Get the index blob path.
pub fn get_index_path(workspace: &Path, config: &RetrievalConfig) -> PathBuf {
    workspace.join(".docent").join(&config.index_file)
}
