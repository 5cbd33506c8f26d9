//! Ollama Embedding Provider
//!
//! Provides semantic embeddings via Ollama's local API using models such as
//! `all-minilm` or `nomic-embed-text`.
//!
//! # Features
//! - Neural semantic embeddings from a locally running model
//! - Dimension detection when the configured dimension is 0
//! - Automatic retry with exponential backoff
//!
//! The provider probes the service when it is constructed, so an unreachable
//! Ollama surfaces as [`AppError::BackendUnavailable`] before any index is built.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use docent_core::{AppError, AppResult};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Ollama API endpoint for embeddings
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const EMBEDDING_ENDPOINT: &str = "/api/embeddings";

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Upper bound on a single retry delay
const MAX_BACKOFF_MS: u64 = 10_000;

/// Exponential delay before retry number `attempt`, capped at [`MAX_BACKOFF_MS`].
fn backoff_ms(attempt: u32) -> u64 {
    2_u64
        .checked_pow(attempt)
        .and_then(|factor| INITIAL_BACKOFF_MS.checked_mul(factor))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS))
}

/// Ollama embedding provider using the local HTTP API
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// HTTP client for API requests
    client: Client,
    /// Ollama API base URL
    base_url: String,
    /// Model name (e.g., "all-minilm")
    model: String,
    /// Embedding dimensions, detected on connect when configured as 0
    dimensions: usize,
    /// Attempts per request
    max_retries: u32,
}

/// Request payload for Ollama embeddings API
#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Response from Ollama embeddings API
#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Error response from Ollama API
#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaProvider {
    /// Create a provider and verify that Ollama answers with the expected dimensions.
    ///
    /// # Errors
    /// * `AppError::BackendUnavailable` - If Ollama is not reachable or the model is invalid
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::BackendUnavailable(format!("Failed to create HTTP client for Ollama: {}", e))
            })?;

        let base_url = config
            .endpoint
            .clone()
            .or_else(|| std::env::var("OLLAMA_URL").ok())
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        let mut provider = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            max_retries: config.max_retries.max(1),
        };

        provider.verify_connection()?;

        Ok(provider)
    }

    /// Verify Ollama connection and model availability
    #[instrument(skip(self), fields(model = %self.model))]
    fn verify_connection(&mut self) -> AppResult<()> {
        debug!("Verifying Ollama connection at {}", self.base_url);

        let embedding = self.embed_with_retries("test connection").map_err(|e| {
            AppError::BackendUnavailable(format!(
                "Ollama not available at {} ({}). Ensure Ollama is running and model '{}' is installed. Run: ollama pull {}",
                self.base_url, e, self.model, self.model
            ))
        })?;

        if self.dimensions == 0 {
            self.dimensions = embedding.len();
        } else if embedding.len() != self.dimensions {
            return Err(AppError::BackendUnavailable(format!(
                "Ollama model '{}' returned {} dimensions, expected {}",
                self.model,
                embedding.len(),
                self.dimensions
            )));
        }

        debug!(
            "Ollama connection verified, model '{}' ready ({} dimensions)",
            self.model, self.dimensions
        );
        Ok(())
    }

    /// Embed single text with retry logic
    #[instrument(skip(self, text), fields(text_len = text.len(), model = %self.model))]
    fn embed_with_retries(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut attempt = 0;

        loop {
            match self.embed_single(text) {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(e);
                    }

                    let delay_ms = backoff_ms(attempt);
                    warn!(
                        "Embedding failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, self.max_retries, delay_ms, e
                    );
                    std::thread::sleep(Duration::from_millis(delay_ms));
                }
            }
        }
    }

    /// Embed single text (no retries)
    fn embed_single(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}{}", self.base_url, EMBEDDING_ENDPOINT);

        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .map_err(|e| AppError::Embedding(format!("Failed to send request to Ollama: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());

            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error)
                .unwrap_or(error_text);

            return Err(AppError::Embedding(format!(
                "Ollama API error ({}): {}",
                status, message
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .map_err(|e| AppError::Embedding(format!("Failed to parse Ollama response: {}", e)))?;

        if self.dimensions != 0 && body.embedding.len() != self.dimensions {
            return Err(AppError::Embedding(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                body.embedding.len(),
                self.dimensions
            )));
        }

        Ok(body.embedding)
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "ollama", model = %self.model))]
    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        debug!("Embedding batch of {} texts", texts.len());

        // The embeddings endpoint takes one prompt per request
        texts
            .iter()
            .map(|text| self.embed_with_retries(text))
            .collect()
    }
}
