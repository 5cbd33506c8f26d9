//! Sentence-accumulating document chunker.
//!
//! Markup is stripped, the text is split on terminal punctuation and the
//! sentences are packed greedily: a sentence joins the current chunk while
//! the accumulated text plus the bare sentence fits in `chunk_size`
//! characters. The re-added period is not counted, so an emitted chunk can
//! reach `chunk_size + 1` characters. A sentence longer than `chunk_size` is
//! kept whole as its own oversized chunk.

use regex::Regex;
use std::sync::OnceLock;

use crate::parser;

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap setting. Accepted for configuration compatibility only.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

fn sentence_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence boundary pattern"))
}

/// Splits documents into ordered, bounded chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    /// Create a chunker.
    ///
    /// `overlap` is stored but never applied: chunks do not share text.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk a markup document into plain-text chunks in document order.
    pub fn chunk(&self, document: &str) -> Vec<String> {
        let text = parser::strip_markup(document);

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in split_sentences(&text) {
            let sentence_len = sentence.chars().count();

            // `current_len` includes the trailing ". " of earlier sentences
            if current_len + sentence_len <= self.chunk_size {
                current.push_str(sentence);
                current.push_str(". ");
                current_len += sentence_len + 2;
            } else {
                if !current.is_empty() {
                    chunks.push(current.trim().to_string());
                }
                current = format!("{}. ", sentence);
                current_len = sentence_len + 2;
            }
        }

        if !current.is_empty() {
            chunks.push(current.trim().to_string());
        }

        tracing::debug!(
            "Chunked document into {} chunks (size: {}, overlap: {} ignored)",
            chunks.len(),
            self.chunk_size,
            self.overlap
        );

        chunks
    }
}

/// Split plain text into trimmed, non-empty sentence-like units.
fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    sentence_boundary()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
