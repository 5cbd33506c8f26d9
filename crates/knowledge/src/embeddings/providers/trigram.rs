//! Trigram embedding provider using hashed character trigrams and words.

use crate::embeddings::provider::EmbeddingProvider;
use docent_core::{AppError, AppResult};
use std::collections::{BTreeMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Trigram-based embedding provider for local, offline operation.
///
/// Generates deterministic embeddings from text content using character
/// trigrams and word frequencies. Not semantically accurate like neural
/// embedding models, but consistent and content-dependent, which is enough
/// for offline use and tests.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
    stop_words: HashSet<&'static str>,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> AppResult<Self> {
        if dimensions == 0 {
            return Err(AppError::Config(
                "Trigram provider needs a non-zero dimension".to_string(),
            ));
        }

        Ok(Self {
            dimensions,
            stop_words: STOP_WORDS.iter().copied().collect(),
        })
    }

    /// Generate a unit-length embedding for text (zero vector when no words survive).
    fn generate_trigram_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        let lower = text.to_lowercase();

        let mut word_freq: BTreeMap<&str, u32> = BTreeMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !self.stop_words.contains(*w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        // Ordered iteration keeps float accumulation reproducible
        for (word, freq) in &word_freq {
            // Trigrams spread each word over several dimensions
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let hash = window.iter().fold(0u64, |acc, c| {
                    acc.wrapping_mul(37).wrapping_add(*c as u64)
                });
                embedding[(hash % self.dimensions as u64) as usize] += (*freq as f32).sqrt();
            }

            let word_hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(word_hash % self.dimensions as u64) as usize] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| self.generate_trigram_embedding(text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_trigram_provider_dimensions() {
        let provider = TrigramProvider::new(384).unwrap();
        assert_eq!(provider.dimensions(), 384);
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
    }

    #[test]
    fn test_trigram_provider_rejects_zero_dimensions() {
        assert!(TrigramProvider::new(0).is_err());
    }

    #[test]
    fn test_trigram_provider_embed_batch() {
        let provider = TrigramProvider::new(128).unwrap();
        let texts = vec![
            "hello world".to_string(),
            "test embedding".to_string(),
            "rust programming".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).unwrap();

        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 128);
            assert!((norm(embedding) - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_trigram_provider_deterministic() {
        let provider = TrigramProvider::new(384).unwrap();
        let embedding1 = provider.embed("deterministic test").unwrap();
        let embedding2 = provider.embed("deterministic test").unwrap();
        assert_eq!(embedding1, embedding2);
    }

    #[test]
    fn test_trigram_provider_ignores_punctuation() {
        let provider = TrigramProvider::new(384).unwrap();
        let plain = provider.embed("rust compilers").unwrap();
        let punctuated = provider.embed("Rust, compilers.").unwrap();
        assert_eq!(plain, punctuated);
    }

    #[test]
    fn test_trigram_provider_different_texts() {
        let provider = TrigramProvider::new(384).unwrap();
        let embedding1 = provider.embed("hello world").unwrap();
        let embedding2 = provider.embed("goodbye world").unwrap();
        assert_ne!(embedding1, embedding2);
    }

    #[test]
    fn test_trigram_provider_empty_text() {
        let provider = TrigramProvider::new(384).unwrap();
        let embedding = provider.embed("").unwrap();

        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_trigram_provider_utf8_safety() {
        let provider = TrigramProvider::new(384).unwrap();
        let embedding = provider
            .embed("Gamedex é um aplicativo brasileiro para gerenciar jogos!")
            .unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }
}
