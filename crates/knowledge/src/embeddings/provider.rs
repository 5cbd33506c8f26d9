//! Embedding provider trait and factory.

use crate::embeddings::config::EmbeddingConfig;
use docent_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
///
/// Calls are blocking; the retrieval engine is synchronous end to end.
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()])?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// Fails with [`AppError::BackendUnavailable`] when the provider is unknown
/// or cannot be reached.
pub fn create_provider(config: &EmbeddingConfig) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "trigram" => {
            let provider = super::providers::trigram::TrigramProvider::new(config.dimensions)?;
            Ok(Arc::new(provider))
        }

        "ollama" => {
            let provider = super::providers::ollama::OllamaProvider::new(config)?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::BackendUnavailable(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let config = EmbeddingConfig::default();

        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "sentence-transformers".to_string(),
            ..Default::default()
        };

        let result = create_provider(&config);
        assert!(matches!(result, Err(AppError::BackendUnavailable(_))));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[test]
    fn test_provider_embed_single() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();

        let embedding = provider.embed("test text").unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
