//! Embedding providers for the vector backends.
//!
//! Provides provider-agnostic, blocking embedding generation.

pub mod config;
pub mod provider;
pub mod providers;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
