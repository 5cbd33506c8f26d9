//! Dense-fallback backend: raw embeddings, cosine similarity at query time.

use super::{
    check_snapshot, embed_cleaned, embed_query, ensure_kind, restamp, top_k, vector_model_identifier,
    SimilarityBackend,
};
use crate::embeddings::EmbeddingProvider;
use crate::store::IndexSnapshot;
use crate::types::{BackendKind, Chunk, Index, Representation, ScoredChunk};
use docent_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::instrument;

/// Keeps unnormalized vectors and scores every chunk on each query.
#[derive(Debug)]
pub struct DenseFallbackBackend {
    provider: Arc<dyn EmbeddingProvider>,
    model_identifier: String,
}

impl DenseFallbackBackend {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        let model_identifier = vector_model_identifier(provider.as_ref());
        Self {
            provider,
            model_identifier,
        }
    }
}

impl SimilarityBackend for DenseFallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::DenseFallback
    }

    fn model_identifier(&self) -> &str {
        &self.model_identifier
    }

    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    fn build(&self, chunks: Vec<Chunk>) -> AppResult<Index> {
        let vectors = embed_cleaned(
            self.provider.as_ref(),
            chunks.iter().map(|c| c.text.as_str()),
        )?;

        Index::new(
            chunks,
            Representation::Dense(vectors),
            BackendKind::DenseFallback,
            self.model_identifier.clone(),
        )
    }

    fn restore(&self, snapshot: IndexSnapshot) -> AppResult<Index> {
        check_snapshot(self, &snapshot)?;

        let IndexSnapshot {
            chunks,
            vectors,
            built_at,
            document_digest,
            ..
        } = snapshot;

        let vectors = vectors.ok_or_else(|| {
            AppError::Persistence("Dense-fallback index is missing its vectors".to_string())
        })?;

        let expected = self.provider.dimensions();
        if let Some(dim) = vectors.first().map(Vec::len) {
            if vectors.iter().any(|v| v.len() != dim) || (expected != 0 && dim != expected) {
                return Err(AppError::Persistence(format!(
                    "Stored vectors do not match the provider's {} dimensions",
                    expected
                )));
            }
        }

        let index = Index::new(
            Chunk::sequence(chunks),
            Representation::Dense(vectors),
            BackendKind::DenseFallback,
            self.model_identifier.clone(),
        )?;

        Ok(restamp(index, built_at, document_digest))
    }

    #[instrument(skip(self, index, query), fields(query_len = query.len()))]
    fn rank(&self, index: &Index, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>> {
        ensure_kind(index, BackendKind::DenseFallback)?;
        let Representation::Dense(vectors) = index.representation() else {
            return Err(AppError::Knowledge(
                "Dense-fallback index has no vector representation".to_string(),
            ));
        };

        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = embed_query(self.provider.as_ref(), query)?;

        let scores: Vec<(usize, f32)> = vectors
            .iter()
            .enumerate()
            .map(|(ordinal, vector)| (ordinal, cosine_similarity(&query_vector, vector)))
            .collect();

        Ok(top_k(index.chunks(), scores, k))
    }
}

/// Cosine similarity between two vectors; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ExactVectorBackend;
    use crate::embeddings::providers::TrigramProvider;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 0.0).abs() < 0.001);

        let a = vec![1.0, 1.0, 0.0];
        let b = vec![2.0, 2.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_dense_matches_exact_ordering() {
        let provider = Arc::new(TrigramProvider::new(256).unwrap());
        let dense = DenseFallbackBackend::new(provider.clone());
        let exact = ExactVectorBackend::new(provider).unwrap();

        let texts = vec![
            "Tokio schedules asynchronous tasks.".to_string(),
            "Serde derives serializers for structs.".to_string(),
            "Clap parses command line arguments.".to_string(),
            "Tracing records structured events.".to_string(),
        ];

        let dense_index = dense.build(Chunk::sequence(texts.clone())).unwrap();
        let exact_index = exact.build(Chunk::sequence(texts)).unwrap();

        for query in ["command line parsing", "structured tracing events", "serde structs"] {
            let a: Vec<usize> = dense
                .rank(&dense_index, query, 4)
                .unwrap()
                .iter()
                .map(|s| s.chunk.ordinal)
                .collect();
            let b: Vec<usize> = exact
                .rank(&exact_index, query, 4)
                .unwrap()
                .iter()
                .map(|s| s.chunk.ordinal)
                .collect();
            assert_eq!(a, b, "ordering differs for '{}'", query);
        }
    }

    #[test]
    fn test_rank_rejects_foreign_index() {
        let provider = Arc::new(TrigramProvider::new(64).unwrap());
        let exact = ExactVectorBackend::new(provider.clone()).unwrap();
        let dense = DenseFallbackBackend::new(provider);

        let index = exact
            .build(Chunk::sequence(vec!["Some text here.".to_string()]))
            .unwrap();
        assert!(dense.rank(&index, "text", 1).is_err());
    }
}
