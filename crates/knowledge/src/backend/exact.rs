//! Exact-vector backend: normalized embeddings in a flat inner-product index.

use super::flat::{normalize_l2, FlatIpIndex};
use super::{
    check_snapshot, embed_cleaned, embed_query, ensure_kind, restamp, vector_model_identifier,
    SimilarityBackend,
};
use crate::embeddings::EmbeddingProvider;
use crate::store::IndexSnapshot;
use crate::types::{BackendKind, Chunk, Index, Representation, ScoredChunk};
use docent_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Ranks by inner product of L2-normalized vectors, which equals cosine similarity.
#[derive(Debug)]
pub struct ExactVectorBackend {
    provider: Arc<dyn EmbeddingProvider>,
    model_identifier: String,
}

impl ExactVectorBackend {
    /// Wrap a provider. The flat index needs a fixed dimension, so a provider
    /// reporting zero dimensions is rejected.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        if provider.dimensions() == 0 {
            return Err(AppError::BackendUnavailable(format!(
                "Provider '{}' does not report a fixed embedding dimension",
                provider.provider_name()
            )));
        }

        let model_identifier = vector_model_identifier(provider.as_ref());
        Ok(Self {
            provider,
            model_identifier,
        })
    }

    fn flat_from(&self, vectors: Vec<Vec<f32>>) -> AppResult<FlatIpIndex> {
        let mut flat = FlatIpIndex::new(self.provider.dimensions());
        for mut vector in vectors {
            normalize_l2(&mut vector);
            flat.add(&vector)?;
        }
        Ok(flat)
    }
}

impl SimilarityBackend for ExactVectorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ExactVector
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
        let flat = self.flat_from(vectors)?;
        debug!("Built flat index with {} vectors", flat.len());

        Index::new(
            chunks,
            Representation::Flat(flat),
            BackendKind::ExactVector,
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
            AppError::Persistence("Exact-vector index is missing its vectors".to_string())
        })?;
        let flat = self
            .flat_from(vectors)
            .map_err(|e| AppError::Persistence(format!("Stored vectors are unusable: {}", e)))?;

        let index = Index::new(
            Chunk::sequence(chunks),
            Representation::Flat(flat),
            BackendKind::ExactVector,
            self.model_identifier.clone(),
        )?;

        Ok(restamp(index, built_at, document_digest))
    }

    #[instrument(skip(self, index, query), fields(query_len = query.len()))]
    fn rank(&self, index: &Index, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>> {
        ensure_kind(index, BackendKind::ExactVector)?;
        let Representation::Flat(flat) = index.representation() else {
            return Err(AppError::Knowledge(
                "Exact-vector index has no flat representation".to_string(),
            ));
        };

        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut query_vector = embed_query(self.provider.as_ref(), query)?;
        normalize_l2(&mut query_vector);

        let chunks = index.chunks();
        Ok(flat
            .search(&query_vector, k)?
            .into_iter()
            .filter_map(|(ordinal, score)| {
                chunks.get(ordinal).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;

    fn backend() -> ExactVectorBackend {
        ExactVectorBackend::new(Arc::new(TrigramProvider::new(256).unwrap())).unwrap()
    }

    fn chunks() -> Vec<Chunk> {
        Chunk::sequence(vec![
            "Rust compilers produce native binaries.".to_string(),
            "Gardening requires patience and sunlight.".to_string(),
            "The borrow checker enforces ownership in Rust.".to_string(),
        ])
    }

    #[test]
    fn test_model_identifier() {
        assert_eq!(backend().model_identifier(), "trigram/trigram-v1");
    }

    #[test]
    fn test_build_normalizes_vectors() {
        let index = backend().build(chunks()).unwrap();
        assert_eq!(index.len(), 3);
        for vector in index.vectors().unwrap() {
            let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_rank_orders_by_similarity() {
        let backend = backend();
        let index = backend.build(chunks()).unwrap();
        let ranked = backend.rank(&index, "gardening sunlight", 3).unwrap();

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].chunk.ordinal, 1);
        assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_rank_zero_k_is_empty() {
        let backend = backend();
        let index = backend.build(chunks()).unwrap();
        assert!(backend.rank(&index, "rust", 0).unwrap().is_empty());
    }

    #[test]
    fn test_restore_rejects_other_model() {
        let backend = backend();
        let index = backend.build(chunks()).unwrap();
        let mut snapshot = IndexSnapshot::from_index(&index);
        snapshot.model_identifier = "ollama/all-minilm".to_string();

        assert!(matches!(
            backend.restore(snapshot),
            Err(AppError::Persistence(_))
        ));
    }

    #[test]
    fn test_rejects_zero_dimension_provider() {
        #[derive(Debug)]
        struct Unsized;
        impl EmbeddingProvider for Unsized {
            fn provider_name(&self) -> &str {
                "unsized"
            }
            fn model_name(&self) -> &str {
                "none"
            }
            fn dimensions(&self) -> usize {
                0
            }
            fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0]).collect())
            }
        }

        let result = ExactVectorBackend::new(Arc::new(Unsized));
        assert!(matches!(result, Err(AppError::BackendUnavailable(_))));
    }
}
