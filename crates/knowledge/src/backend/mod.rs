//! Similarity backends.
//!
//! Three interchangeable strategies turn chunks into a searchable
//! representation and rank them against a query:
//!
//! - [`ExactVectorBackend`]: normalized embeddings in a flat inner-product index
//! - [`DenseFallbackBackend`]: raw embeddings scored by cosine similarity
//! - [`LexicalBackend`]: Jaccard overlap of word sets, no embedding model
//!
//! Which one runs is decided once, at construction, by [`select_backend`].

pub mod dense;
pub mod exact;
pub mod flat;
pub mod lexical;

pub use dense::DenseFallbackBackend;
pub use exact::ExactVectorBackend;
pub use flat::FlatIpIndex;
pub use lexical::LexicalBackend;

use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::parser;
use crate::store::IndexSnapshot;
use crate::types::{BackendKind, Chunk, Index, ScoredChunk};
use chrono::{DateTime, Utc};
use docent_core::{AppError, AppResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Capability contract shared by every similarity backend.
pub trait SimilarityBackend: Send + Sync + fmt::Debug {
    /// Identity recorded in indexes built by this backend.
    fn kind(&self) -> BackendKind;

    /// Embedding model (or scoring scheme) the backend's scores depend on.
    fn model_identifier(&self) -> &str;

    /// Compute per-chunk representations.
    fn build(&self, chunks: Vec<Chunk>) -> AppResult<Index>;

    /// Rebuild an index from persisted data, re-deriving search structures.
    fn restore(&self, snapshot: IndexSnapshot) -> AppResult<Index>;

    /// Return at most `k` chunks, highest score first, ties by ascending ordinal.
    fn rank(&self, index: &Index, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>>;
}

/// Backend requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Best available: exact-vector, then dense-fallback, then lexical
    #[default]
    Auto,
    Exact,
    Dense,
    Lexical,
}

impl BackendPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Exact => "exact",
            Self::Dense => "dense",
            Self::Lexical => "lexical",
        }
    }
}

impl FromStr for BackendPreference {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "exact" | "exact-vector" => Ok(Self::Exact),
            "dense" | "dense-fallback" => Ok(Self::Dense),
            "lexical" => Ok(Self::Lexical),
            other => Err(AppError::Config(format!(
                "Unknown backend '{}'. Supported: auto, exact, dense, lexical",
                other
            ))),
        }
    }
}

/// Construct the similarity backend for a preference.
///
/// An explicit preference yields exactly that backend or
/// [`AppError::BackendUnavailable`]. `Auto` degrades from exact-vector to
/// dense-fallback to lexical, logging each step down.
pub fn select_backend(
    preference: BackendPreference,
    config: &EmbeddingConfig,
) -> AppResult<Arc<dyn SimilarityBackend>> {
    let backend: Arc<dyn SimilarityBackend> = match preference {
        BackendPreference::Lexical => Arc::new(LexicalBackend::new()),
        BackendPreference::Exact => Arc::new(ExactVectorBackend::new(create_provider(config)?)?),
        BackendPreference::Dense => Arc::new(DenseFallbackBackend::new(create_provider(config)?)),
        BackendPreference::Auto => {
            let provider = match create_provider(config) {
                Ok(provider) => provider,
                Err(e) => {
                    tracing::warn!("Embedding provider unavailable, using lexical backend: {}", e);
                    return Ok(Arc::new(LexicalBackend::new()));
                }
            };

            match ExactVectorBackend::new(Arc::clone(&provider)) {
                Ok(backend) => Arc::new(backend),
                Err(e) => {
                    tracing::warn!("Exact-vector backend unavailable, using dense fallback: {}", e);
                    Arc::new(DenseFallbackBackend::new(provider))
                }
            }
        }
    };

    tracing::info!(
        "Selected {} backend (model: {})",
        backend.kind(),
        backend.model_identifier()
    );

    Ok(backend)
}

/// Order `(ordinal, score)` pairs by descending score, then ascending ordinal.
///
/// NaN scores sort last.
pub(crate) fn sort_by_relevance(scores: &mut [(usize, f32)]) {
    fn key(score: f32) -> f32 {
        if score.is_nan() {
            f32::NEG_INFINITY
        } else {
            score
        }
    }

    scores.sort_by(|a, b| key(b.1).total_cmp(&key(a.1)).then_with(|| a.0.cmp(&b.0)));
}

/// Keep the best `k` scores and attach their chunks.
pub(crate) fn top_k(chunks: &[Chunk], mut scores: Vec<(usize, f32)>, k: usize) -> Vec<ScoredChunk> {
    sort_by_relevance(&mut scores);
    scores.truncate(k);
    scores
        .into_iter()
        .filter_map(|(ordinal, score)| {
            chunks.get(ordinal).map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                score,
            })
        })
        .collect()
}

/// Embed cleaned texts, checking the provider returned one vector of a
/// single dimension per text.
pub(crate) fn embed_cleaned<'a>(
    provider: &dyn EmbeddingProvider,
    texts: impl IntoIterator<Item = &'a str>,
) -> AppResult<Vec<Vec<f32>>> {
    let cleaned: Vec<String> = texts.into_iter().map(parser::clean_text).collect();
    if cleaned.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = provider.embed_batch(&cleaned)?;

    if vectors.len() != cleaned.len() {
        return Err(AppError::Embedding(format!(
            "Provider returned {} embeddings for {} texts",
            vectors.len(),
            cleaned.len()
        )));
    }

    let dim = vectors[0].len();
    if vectors.iter().any(|v| v.len() != dim) {
        return Err(AppError::Embedding(
            "Provider returned embeddings of inconsistent dimensions".to_string(),
        ));
    }

    if let Some(position) = vectors.iter().position(|v| !is_finite(v)) {
        return Err(AppError::Embedding(format!(
            "Provider returned a non-finite embedding for chunk {}",
            position
        )));
    }

    Ok(vectors)
}

/// Embed a cleaned query, rejecting non-finite output.
pub(crate) fn embed_query(provider: &dyn EmbeddingProvider, query: &str) -> AppResult<Vec<f32>> {
    let vector = provider.embed(&parser::clean_text(query))?;
    if !is_finite(&vector) {
        return Err(AppError::Embedding(
            "Provider returned a non-finite query embedding".to_string(),
        ));
    }
    Ok(vector)
}

/// True when every component is neither NaN nor infinite.
pub(crate) fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

/// Reject snapshots written by a different backend or model.
pub(crate) fn check_snapshot(
    backend: &dyn SimilarityBackend,
    snapshot: &IndexSnapshot,
) -> AppResult<()> {
    if snapshot.backend != backend.kind() {
        return Err(AppError::Persistence(format!(
            "Index was built by the {} backend, current backend is {}",
            snapshot.backend,
            backend.kind()
        )));
    }

    if snapshot.model_identifier != backend.model_identifier() {
        return Err(AppError::Persistence(format!(
            "Index was built with model '{}', current model is '{}'",
            snapshot.model_identifier,
            backend.model_identifier()
        )));
    }

    Ok(())
}

/// Reject an index handed to a backend that did not build it.
pub(crate) fn ensure_kind(index: &Index, kind: BackendKind) -> AppResult<()> {
    if index.backend() != kind {
        return Err(AppError::Knowledge(format!(
            "Index was built by the {} backend and cannot be ranked by {}",
            index.backend(),
            kind
        )));
    }
    Ok(())
}

/// Carry a snapshot's build metadata over to a restored index.
pub(crate) fn restamp(
    index: Index,
    built_at: DateTime<Utc>,
    document_digest: Option<String>,
) -> Index {
    let index = index.with_built_at(built_at);
    match document_digest {
        Some(digest) => index.with_document_digest(digest),
        None => index,
    }
}

/// Model identifier used by the embedding-based backends.
pub(crate) fn vector_model_identifier(provider: &dyn EmbeddingProvider) -> String {
    format!("{}/{}", provider.provider_name(), provider.model_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parsing() {
        assert_eq!("auto".parse::<BackendPreference>().unwrap(), BackendPreference::Auto);
        assert_eq!(
            "Exact-Vector".parse::<BackendPreference>().unwrap(),
            BackendPreference::Exact
        );
        assert_eq!("dense".parse::<BackendPreference>().unwrap(), BackendPreference::Dense);
        assert_eq!(
            " lexical ".parse::<BackendPreference>().unwrap(),
            BackendPreference::Lexical
        );
        assert!("faiss".parse::<BackendPreference>().is_err());
    }

    #[test]
    fn test_sort_by_relevance_ties() {
        let mut scores = vec![(2, 0.5), (0, 0.5), (1, 0.9), (3, 0.1)];
        sort_by_relevance(&mut scores);
        let ordinals: Vec<usize> = scores.iter().map(|(o, _)| *o).collect();
        assert_eq!(ordinals, vec![1, 0, 2, 3]);
    }

    #[test]
    fn test_sort_by_relevance_tolerates_nan() {
        let mut scores: Vec<(usize, f32)> = (0..200)
            .map(|i| (i, if i % 3 == 0 { f32::NAN } else { (i % 7) as f32 / 7.0 }))
            .collect();
        sort_by_relevance(&mut scores);

        let first_nan = scores.iter().position(|(_, s)| s.is_nan()).unwrap();
        assert!(scores[first_nan..].iter().all(|(_, s)| s.is_nan()));
        assert!(scores[..first_nan].windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[derive(Debug)]
    struct NanProvider;

    impl EmbeddingProvider for NanProvider {
        fn provider_name(&self) -> &str {
            "nan"
        }
        fn model_name(&self) -> &str {
            "broken"
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| if t.contains("bad") { vec![f32::NAN, 1.0] } else { vec![1.0, 0.0] })
                .collect())
        }
    }

    #[test]
    fn test_non_finite_embeddings_are_rejected() {
        let result = embed_cleaned(&NanProvider, ["good text", "bad text"]);
        assert!(matches!(result, Err(AppError::Embedding(_))));
        assert!(embed_cleaned(&NanProvider, ["good text"]).is_ok());

        assert!(matches!(
            embed_query(&NanProvider, "bad query"),
            Err(AppError::Embedding(_))
        ));

        let dense = DenseFallbackBackend::new(Arc::new(NanProvider));
        let chunks = Chunk::sequence(vec!["Good one.".into(), "A bad one.".into()]);
        assert!(matches!(dense.build(chunks), Err(AppError::Embedding(_))));
    }

    #[test]
    fn test_top_k_truncates() {
        let chunks = Chunk::sequence(vec!["a.".into(), "b.".into(), "c.".into()]);
        let ranked = top_k(&chunks, vec![(0, 0.2), (1, 0.8), (2, 0.5)], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].chunk.text, "b.");
        assert_eq!(ranked[1].chunk.text, "c.");
    }

    #[test]
    fn test_select_explicit_lexical() {
        let backend = select_backend(BackendPreference::Lexical, &EmbeddingConfig::default()).unwrap();
        assert_eq!(backend.kind(), BackendKind::Lexical);
    }

    #[test]
    fn test_select_auto_prefers_exact() {
        let backend = select_backend(BackendPreference::Auto, &EmbeddingConfig::default()).unwrap();
        assert_eq!(backend.kind(), BackendKind::ExactVector);
        assert_eq!(backend.model_identifier(), "trigram/trigram-v1");
    }

    #[test]
    fn test_select_auto_degrades_to_lexical() {
        let config = EmbeddingConfig {
            provider: "missing".to_string(),
            ..Default::default()
        };
        let backend = select_backend(BackendPreference::Auto, &config).unwrap();
        assert_eq!(backend.kind(), BackendKind::Lexical);
    }

    #[test]
    fn test_select_explicit_vector_surfaces_unavailable() {
        let config = EmbeddingConfig {
            provider: "missing".to_string(),
            ..Default::default()
        };
        let exact = select_backend(BackendPreference::Exact, &config);
        assert!(matches!(exact, Err(AppError::BackendUnavailable(_))));

        let dense = select_backend(BackendPreference::Dense, &config);
        assert!(matches!(dense, Err(AppError::BackendUnavailable(_))));
    }
}
