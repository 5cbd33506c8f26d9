//! Lexical backend: Jaccard overlap of lowercase word sets.
//!
//! Needs no embedding model, so it is always available.

use super::{check_snapshot, ensure_kind, restamp, top_k, SimilarityBackend};
use crate::store::IndexSnapshot;
use crate::types::{BackendKind, Chunk, Index, Representation, ScoredChunk};
use docent_core::{AppError, AppResult};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Model identifier recorded for lexical indexes.
pub const LEXICAL_MODEL: &str = "lexical-jaccard";

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid word regex"))
}

/// Set of lowercase word tokens in `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    word_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// |a ∩ b| / |a ∪ b|; 0.0 when either set is empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}

#[derive(Debug, Default)]
pub struct LexicalBackend;

impl LexicalBackend {
    pub fn new() -> Self {
        Self
    }

    fn token_sets(chunks: &[Chunk]) -> Vec<HashSet<String>> {
        chunks.iter().map(|c| tokenize(&c.text)).collect()
    }
}

impl SimilarityBackend for LexicalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Lexical
    }

    fn model_identifier(&self) -> &str {
        LEXICAL_MODEL
    }

    fn build(&self, chunks: Vec<Chunk>) -> AppResult<Index> {
        let tokens = Self::token_sets(&chunks);
        Index::new(
            chunks,
            Representation::Tokens(tokens),
            BackendKind::Lexical,
            LEXICAL_MODEL,
        )
    }

    fn restore(&self, snapshot: IndexSnapshot) -> AppResult<Index> {
        check_snapshot(self, &snapshot)?;

        let IndexSnapshot {
            chunks,
            built_at,
            document_digest,
            ..
        } = snapshot;

        // Token sets are cheap to derive, so only the texts are stored
        let index = self.build(Chunk::sequence(chunks))?;
        Ok(restamp(index, built_at, document_digest))
    }

    fn rank(&self, index: &Index, query: &str, k: usize) -> AppResult<Vec<ScoredChunk>> {
        ensure_kind(index, BackendKind::Lexical)?;
        let Representation::Tokens(sets) = index.representation() else {
            return Err(AppError::Knowledge(
                "Lexical index has no token representation".to_string(),
            ));
        };

        if index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_tokens = tokenize(query);
        let scores: Vec<(usize, f32)> = sets
            .iter()
            .enumerate()
            .map(|(ordinal, tokens)| (ordinal, jaccard(&query_tokens, tokens)))
            .collect();

        Ok(top_k(index.chunks(), scores, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_tokenize_lowercases_and_splits() {
        assert_eq!(
            tokenize("The Cat, the HAT!"),
            set(&["the", "cat", "hat"])
        );
        assert!(tokenize("  ... ").is_empty());
    }

    #[test]
    fn test_jaccard() {
        let a = set(&["red", "apple"]);
        let b = set(&["red", "apple", "pie"]);
        assert!((jaccard(&a, &b) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(jaccard(&a, &set(&["blue"])), 0.0);
        assert_eq!(jaccard(&HashSet::new(), &b), 0.0);
    }

    #[test]
    fn test_rank_prefers_overlap() {
        let backend = LexicalBackend::new();
        let index = backend
            .build(Chunk::sequence(vec![
                "Apples are red.".to_string(),
                "Bananas are yellow.".to_string(),
                "Cherries are red.".to_string(),
            ]))
            .unwrap();

        let ranked = backend.rank(&index, "yellow bananas", 2).unwrap();
        assert_eq!(ranked[0].chunk.ordinal, 1);
        assert!((ranked[0].score - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_ties_by_ordinal() {
        let backend = LexicalBackend::new();
        let index = backend
            .build(Chunk::sequence(vec![
                "Apples are red.".to_string(),
                "Bananas are yellow.".to_string(),
                "Cherries are red.".to_string(),
            ]))
            .unwrap();

        let ranked = backend.rank(&index, "red", 3).unwrap();
        let ordinals: Vec<usize> = ranked.iter().map(|s| s.chunk.ordinal).collect();
        assert_eq!(ordinals, vec![0, 2, 1]);
    }

    #[test]
    fn test_empty_query_scores_zero() {
        let backend = LexicalBackend::new();
        let index = backend
            .build(Chunk::sequence(vec!["Something here.".to_string()]))
            .unwrap();

        let ranked = backend.rank(&index, "?!", 1).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].score, 0.0);
    }
}
