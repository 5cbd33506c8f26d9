//! On-disk index blob.
//!
//! Layout: 4 magic bytes, a little-endian `u16` format version, then a
//! bincode-encoded [`IndexSnapshot`]. Writes go to a sibling temp file that is
//! renamed into place, so a crash never leaves a half-written index behind.

use crate::types::{BackendKind, Index};
use chrono::{DateTime, Utc};
use docent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Magic bytes identifying an index blob.
pub const MAGIC: &[u8; 4] = b"DCIX";

/// Current blob format version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + std::mem::size_of::<u16>();

/// Everything needed to restore an [`Index`] without re-embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub backend: BackendKind,
    pub model_identifier: String,
    pub built_at: DateTime<Utc>,
    /// Hex SHA-256 of the source document
    pub document_digest: Option<String>,
    /// Chunk texts in ordinal order
    pub chunks: Vec<String>,
    /// One vector per chunk; absent for lexical indexes
    pub vectors: Option<Vec<Vec<f32>>>,
}

impl IndexSnapshot {
    pub fn from_index(index: &Index) -> Self {
        Self {
            backend: index.backend(),
            model_identifier: index.model_identifier().to_string(),
            built_at: index.built_at(),
            document_digest: index.document_digest().map(str::to_string),
            chunks: index.chunks().iter().map(|c| c.text.clone()).collect(),
            vectors: index.vectors(),
        }
    }

    /// Check internal consistency of a decoded snapshot.
    pub fn validate(&self) -> AppResult<()> {
        match (&self.vectors, self.backend.uses_vectors()) {
            (Some(vectors), true) => {
                if vectors.len() != self.chunks.len() {
                    return Err(AppError::Persistence(format!(
                        "Index holds {} chunks but {} vectors",
                        self.chunks.len(),
                        vectors.len()
                    )));
                }
                if let Some(dim) = vectors.first().map(Vec::len) {
                    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
                        return Err(AppError::Persistence(
                            "Index vectors have inconsistent dimensions".to_string(),
                        ));
                    }
                }
                if vectors.iter().flatten().any(|x| !x.is_finite()) {
                    return Err(AppError::Persistence(
                        "Index vectors contain non-finite values".to_string(),
                    ));
                }
            }
            (None, true) => {
                return Err(AppError::Persistence(format!(
                    "{} index is missing its vectors",
                    self.backend
                )));
            }
            (Some(_), false) => {
                return Err(AppError::Persistence(
                    "Lexical index unexpectedly carries vectors".to_string(),
                ));
            }
            (None, false) => {}
        }

        Ok(())
    }
}

/// Serialize a snapshot into the blob format.
pub fn encode_snapshot(snapshot: &IndexSnapshot) -> AppResult<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())
        .map_err(|e| AppError::Serialization(format!("Failed to encode index: {}", e)))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Parse and validate a blob.
pub fn decode_snapshot(bytes: &[u8]) -> AppResult<IndexSnapshot> {
    if bytes.len() < HEADER_LEN {
        return Err(AppError::Persistence("Index file is truncated".to_string()));
    }

    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(AppError::Persistence(
            "Index file has an unrecognized header".to_string(),
        ));
    }

    let version = u16::from_le_bytes([bytes[MAGIC.len()], bytes[MAGIC.len() + 1]]);
    if version != FORMAT_VERSION {
        return Err(AppError::Persistence(format!(
            "Unsupported index format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let (snapshot, consumed): (IndexSnapshot, usize) =
        bincode::serde::decode_from_slice(&bytes[HEADER_LEN..], bincode::config::standard())
            .map_err(|e| AppError::Persistence(format!("Failed to decode index: {}", e)))?;

    if HEADER_LEN + consumed != bytes.len() {
        return Err(AppError::Persistence(
            "Index file has trailing bytes".to_string(),
        ));
    }

    snapshot.validate()?;
    Ok(snapshot)
}

/// Write a snapshot to `path`, replacing any existing blob atomically.
pub fn save_snapshot(path: &Path, snapshot: &IndexSnapshot) -> AppResult<()> {
    let bytes = encode_snapshot(snapshot)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Persistence(format!("Failed to create index directory: {}", e))
        })?;
    }

    let tmp = temp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        AppError::Persistence(format!("Failed to write index to {}: {}", path.display(), e))
    })?;

    tracing::debug!("Saved index ({} bytes) to {}", bytes.len(), path.display());
    Ok(())
}

/// Read a snapshot from `path`. `Ok(None)` when no blob exists.
pub fn load_snapshot(path: &Path) -> AppResult<Option<IndexSnapshot>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppError::Persistence(format!(
                "Failed to read index from {}: {}",
                path.display(),
                e
            )))
        }
    };

    decode_snapshot(&bytes).map(Some)
}

/// Hex SHA-256 of a document together with the chunk size it was split with.
///
/// Either changing means the stored chunks no longer match a fresh build.
pub fn document_digest(document: &str, chunk_size: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update((chunk_size as u64).to_le_bytes());
    hasher.update(document.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
