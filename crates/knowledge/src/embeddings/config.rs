//! Embedding configuration types.

use serde::{Deserialize, Serialize};

/// Embedding settings for the vector backends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions (0 lets the Ollama provider detect it)
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Provider endpoint override (Ollama base URL)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per embedding request before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}
