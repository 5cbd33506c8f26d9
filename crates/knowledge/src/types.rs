//! Retrieval type definitions.

use chrono::{DateTime, Utc};
use docent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::backend::flat::FlatIpIndex;

/// A bounded slice of the source document's sentences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk in the document (dense, zero-based)
    pub ordinal: usize,

    /// Plain-text content
    pub text: String,
}

impl Chunk {
    /// Number chunk texts in document order.
    pub fn sequence(texts: Vec<String>) -> Vec<Chunk> {
        texts
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk { ordinal, text })
            .collect()
    }
}

/// A chunk paired with its relevance score for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Identity of the similarity backend an index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Normalized embeddings in a flat inner-product structure
    ExactVector,
    /// Raw embeddings scored with cosine similarity at query time
    DenseFallback,
    /// Jaccard overlap of word sets
    Lexical,
}

impl BackendKind {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactVector => "exact-vector",
            Self::DenseFallback => "dense-fallback",
            Self::Lexical => "lexical",
        }
    }

    /// Whether indexes of this kind carry embedding vectors.
    pub fn uses_vectors(&self) -> bool {
        !matches!(self, Self::Lexical)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend-specific searchable form of the chunks.
#[derive(Debug, Clone)]
pub enum Representation {
    /// L2-normalized vectors in an exhaustive inner-product structure
    Flat(FlatIpIndex),
    /// Raw embedding vectors, one per chunk
    Dense(Vec<Vec<f32>>),
    /// Lowercase word sets, one per chunk
    Tokens(Vec<HashSet<String>>),
}

impl Representation {
    fn len(&self) -> usize {
        match self {
            Self::Flat(flat) => flat.len(),
            Self::Dense(vectors) => vectors.len(),
            Self::Tokens(sets) => sets.len(),
        }
    }

    fn matches(&self, kind: BackendKind) -> bool {
        matches!(
            (self, kind),
            (Self::Flat(_), BackendKind::ExactVector)
                | (Self::Dense(_), BackendKind::DenseFallback)
                | (Self::Tokens(_), BackendKind::Lexical)
        )
    }
}

/// Chunks paired with their backend representation.
///
/// Immutable once built; the engine replaces whole indexes rather than
/// editing them.
#[derive(Debug, Clone)]
pub struct Index {
    chunks: Vec<Chunk>,
    representation: Representation,
    backend: BackendKind,
    model_identifier: String,
    built_at: DateTime<Utc>,
    document_digest: Option<String>,
}

impl Index {
    /// Assemble an index, checking ordinals and representation length.
    pub fn new(
        chunks: Vec<Chunk>,
        representation: Representation,
        backend: BackendKind,
        model_identifier: impl Into<String>,
    ) -> AppResult<Self> {
        if let Some(pos) = chunks.iter().enumerate().position(|(i, c)| c.ordinal != i) {
            return Err(AppError::Knowledge(format!(
                "Chunk at position {} has ordinal {}",
                pos, chunks[pos].ordinal
            )));
        }

        if !representation.matches(backend) {
            return Err(AppError::Knowledge(format!(
                "Representation does not belong to backend '{}'",
                backend
            )));
        }

        if representation.len() != chunks.len() {
            return Err(AppError::Knowledge(format!(
                "Index has {} chunks but {} representations",
                chunks.len(),
                representation.len()
            )));
        }

        Ok(Self {
            chunks,
            representation,
            backend,
            model_identifier: model_identifier.into(),
            built_at: Utc::now(),
            document_digest: None,
        })
    }

    /// Record the fingerprint of the document this index was built from.
    pub fn with_document_digest(mut self, digest: impl Into<String>) -> Self {
        self.document_digest = Some(digest.into());
        self
    }

    /// Override the build timestamp (used when restoring a snapshot).
    pub fn with_built_at(mut self, built_at: DateTime<Utc>) -> Self {
        self.built_at = built_at;
        self
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn representation(&self) -> &Representation {
        &self.representation
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn model_identifier(&self) -> &str {
        &self.model_identifier
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn document_digest(&self) -> Option<&str> {
        self.document_digest.as_deref()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Embedding vectors parallel to the chunks, if this backend has any.
    pub fn vectors(&self) -> Option<Vec<Vec<f32>>> {
        match &self.representation {
            Representation::Flat(flat) => Some(flat.rows().map(<[f32]>::to_vec).collect()),
            Representation::Dense(vectors) => Some(vectors.clone()),
            Representation::Tokens(_) => None,
        }
    }
}
