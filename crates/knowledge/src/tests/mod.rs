//! Cross-module retrieval tests.


use crate::embeddings::EmbeddingProvider;
use docent_core::AppResult;

/// Embeds text as keyword counts along fixed axes, so cosine scores are
/// exact and easy to reason about.
#[derive(Debug)]
pub(crate) struct KeywordProvider {
    axes: Vec<&'static str>,
}

impl KeywordProvider {
    pub(crate) fn new(axes: &[&'static str]) -> Self {
        Self {
            axes: axes.to_vec(),
        }
    }
}

impl EmbeddingProvider for KeywordProvider {
    fn provider_name(&self) -> &str {
        "keyword"
    }

    fn model_name(&self) -> &str {
        "axes-v1"
    }

    fn dimensions(&self) -> usize {
        self.axes.len()
    }

    fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric()).collect();
                self.axes
                    .iter()
                    .map(|axis| words.iter().filter(|w| *w == axis).count() as f32)
                    .collect()
            })
            .collect())
    }
}
