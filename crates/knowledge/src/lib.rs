//! Context retrieval for a single knowledge document.
//!
//! The document is chunked on sentence boundaries, indexed by one of three
//! similarity backends, persisted as a single blob, and queried for a
//! context string that is either the relevant chunks or a fixed
//! "no information" sentinel.

pub mod backend;
pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod parser;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use backend::{select_backend, BackendPreference, SimilarityBackend};
pub use chunker::Chunker;
pub use config::{RelevanceThresholds, RetrievalConfig};
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use engine::{
    compose_context, EngineState, EngineStatus, IndexSource, RetrievalEngine, NO_INFORMATION,
};
pub use store::IndexSnapshot;
pub use types::{BackendKind, Chunk, Index, Representation, ScoredChunk};
