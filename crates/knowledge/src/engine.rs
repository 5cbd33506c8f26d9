//! Retrieval engine: owns the current index and answers context queries.
//!
//! The index is an immutable `Arc<Index>` behind a `RwLock`. Queries clone
//! the `Arc` under a short read lock and rank without holding any lock.
//! `build` and `load` compute the replacement outside the lock and swap it in.
//! A separate writer mutex serializes build, load and save.

use crate::backend::{select_backend, BackendPreference, SimilarityBackend};
use crate::chunker::Chunker;
use crate::config::{self, RelevanceThresholds, RetrievalConfig};
use crate::store::{self, IndexSnapshot};
use crate::types::{BackendKind, Chunk, Index, ScoredChunk};
use chrono::{DateTime, Utc};
use docent_core::{AppError, AppResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, instrument, warn};

/// Returned by [`RetrievalEngine::get_context`] when no chunk clears the threshold.
pub const NO_INFORMATION: &str = "I don't have specific information about that.";

/// Separator between chunks in a context string.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    /// No index built or loaded yet
    Unbuilt,
    Ready,
    /// A forced rebuild is in progress; queries still see the previous index
    Rebuilding,
}

/// How [`RetrievalEngine::load_or_build`] obtained its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    Loaded,
    Built,
}

/// Snapshot of the engine for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub backend: BackendKind,
    pub model_identifier: String,
    pub chunk_count: usize,
    pub built_at: Option<DateTime<Utc>>,
    pub index_path: PathBuf,
}

/// Clears the rebuilding flag however the rebuild ends.
struct RebuildGuard<'a>(&'a AtomicBool);

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct RetrievalEngine {
    backend: Arc<dyn SimilarityBackend>,
    chunker: Chunker,
    thresholds: RelevanceThresholds,
    top_k: usize,
    index_path: PathBuf,
    index: RwLock<Option<Arc<Index>>>,
    writer: Mutex<()>,
    rebuilding: AtomicBool,
}

impl RetrievalEngine {
    /// Create an unbuilt engine around an already selected backend.
    pub fn new(
        backend: Arc<dyn SimilarityBackend>,
        config: &RetrievalConfig,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            chunker: Chunker::new(config.chunk_size, config.chunk_overlap),
            thresholds: config.thresholds,
            top_k: config.top_k,
            index_path: index_path.into(),
            index: RwLock::new(None),
            writer: Mutex::new(()),
            rebuilding: AtomicBool::new(false),
        }
    }

    /// Create an engine from a workspace's `.docent/retrieval.yaml`.
    pub fn open(workspace: &Path, preference: BackendPreference) -> AppResult<Self> {
        let config = config::load_config(workspace)?;
        let backend = select_backend(preference, &config.embedding)?;
        let index_path = config::get_index_path(workspace, &config);
        Ok(Self::new(backend, &config, index_path))
    }

    pub fn backend(&self) -> &dyn SimilarityBackend {
        self.backend.as_ref()
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Configured number of chunks per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_some()
    }

    /// Chunk and index `document`, replace the current index and persist it.
    ///
    /// Returns the number of chunks indexed.
    pub fn build(&self, document: &str) -> AppResult<usize> {
        let _writer = self.lock_writer();
        self.build_locked(document)
    }

    /// Force a fresh build. Queries keep using the previous index until the
    /// new one is swapped in.
    pub fn rebuild(&self, document: &str) -> AppResult<usize> {
        let _writer = self.lock_writer();
        self.rebuilding.store(true, Ordering::Release);
        let _guard = RebuildGuard(&self.rebuilding);

        info!("Rebuilding index");
        self.build_locked(document)
    }

    /// Restore the persisted index.
    ///
    /// Returns `false`, leaving the engine unchanged, when the blob is missing,
    /// unreadable, or was produced by another backend or model.
    pub fn load(&self) -> bool {
        let _writer = self.lock_writer();
        match self.read_persisted() {
            Some(index) => {
                info!("Loaded index with {} chunks", index.len());
                self.install(Arc::new(index));
                true
            }
            None => false,
        }
    }

    /// Persist the current index.
    pub fn save(&self) -> AppResult<()> {
        let _writer = self.lock_writer();
        let index = self.current().ok_or(AppError::NotReady)?;
        self.save_index(&index)
    }

    /// Load the persisted index if it was built from this exact document with
    /// the current chunk size, otherwise build (and save) a new one.
    #[instrument(skip(self, document), fields(document_len = document.len()))]
    pub fn load_or_build(&self, document: &str) -> AppResult<IndexSource> {
        let _writer = self.lock_writer();
        let digest = store::document_digest(document, self.chunker.chunk_size());

        if let Some(index) = self.read_persisted() {
            if index.document_digest() == Some(digest.as_str()) {
                info!("Persisted index is current ({} chunks)", index.len());
                self.install(Arc::new(index));
                return Ok(IndexSource::Loaded);
            }
            info!("Document or chunk size changed since the index was built, rebuilding");
        }

        self.build_locked(document)?;
        Ok(IndexSource::Built)
    }

    /// Ranked chunks scoring strictly above the backend's threshold.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub fn retrieve(&self, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>> {
        let index = self.current().ok_or(AppError::NotReady)?;
        let threshold = self.thresholds.for_backend(index.backend());

        let ranked = self.backend.rank(&index, query, k)?;
        if !ranked.is_empty() {
            let all_scores: Vec<f32> = ranked.iter().map(|s| s.score).collect();
            debug!(
                "Ranked {} chunks before filtering - scores: {:?}",
                ranked.len(),
                all_scores
            );
        }

        let relevant: Vec<ScoredChunk> = ranked
            .into_iter()
            .filter(|scored| scored.score > threshold)
            .collect();

        match (relevant.first(), relevant.last()) {
            (Some(top), Some(lowest)) => info!(
                "Retrieved {} relevant chunks (top score: {:.3}, lowest: {:.3})",
                relevant.len(),
                top.score,
                lowest.score
            ),
            _ => info!(
                "No relevant chunks found (all scores at or below {:.2} threshold)",
                threshold
            ),
        }

        Ok(relevant)
    }

    /// Context string for `query`: relevant chunk texts joined by blank
    /// lines, or [`NO_INFORMATION`] when none qualify.
    pub fn get_context(&self, query: &str, k: usize) -> AppResult<String> {
        let relevant = self.retrieve(query, k)?;
        Ok(compose_context(&relevant))
    }

    pub fn status(&self) -> EngineStatus {
        let current = self.current();
        let state = if self.rebuilding.load(Ordering::Acquire) {
            EngineState::Rebuilding
        } else if current.is_some() {
            EngineState::Ready
        } else {
            EngineState::Unbuilt
        };

        match current {
            Some(index) => EngineStatus {
                state,
                backend: index.backend(),
                model_identifier: index.model_identifier().to_string(),
                chunk_count: index.len(),
                built_at: Some(index.built_at()),
                index_path: self.index_path.clone(),
            },
            None => EngineStatus {
                state,
                backend: self.backend.kind(),
                model_identifier: self.backend.model_identifier().to_string(),
                chunk_count: 0,
                built_at: None,
                index_path: self.index_path.clone(),
            },
        }
    }

    fn build_locked(&self, document: &str) -> AppResult<usize> {
        let texts = self.chunker.chunk(document);
        if texts.is_empty() {
            return Err(AppError::EmptyDocument);
        }

        info!(
            "Building {} index from {} chunks",
            self.backend.kind(),
            texts.len()
        );

        let index = self
            .backend
            .build(Chunk::sequence(texts))?
            .with_document_digest(store::document_digest(document, self.chunker.chunk_size()));
        let count = index.len();

        let index = Arc::new(index);
        self.install(Arc::clone(&index));
        self.save_index(&index)?;

        Ok(count)
    }

    fn read_persisted(&self) -> Option<Index> {
        let snapshot = match store::load_snapshot(&self.index_path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No persisted index at {}", self.index_path.display());
                return None;
            }
            Err(e) => {
                warn!("Ignoring unreadable index: {}", e);
                return None;
            }
        };

        match self.backend.restore(snapshot) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!("Ignoring incompatible index: {}", e);
                None
            }
        }
    }

    fn save_index(&self, index: &Index) -> AppResult<()> {
        store::save_snapshot(&self.index_path, &IndexSnapshot::from_index(index))?;
        info!("Saved index to {}", self.index_path.display());
        Ok(())
    }

    fn current(&self) -> Option<Arc<Index>> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, index: Arc<Index>) {
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Join retrieved chunk texts in rank order, or [`NO_INFORMATION`] if there are none.
pub fn compose_context(relevant: &[ScoredChunk]) -> String {
    if relevant.is_empty() {
        return NO_INFORMATION.to_string();
    }

    relevant
        .iter()
        .map(|scored| scored.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_context() {
        assert_eq!(compose_context(&[]), NO_INFORMATION);

        let relevant: Vec<ScoredChunk> = Chunk::sequence(vec!["First.".into(), "Second.".into()])
            .into_iter()
            .rev()
            .map(|chunk| ScoredChunk { chunk, score: 0.9 })
            .collect();
        assert_eq!(compose_context(&relevant), "Second.\n\nFirst.");
    }
}
