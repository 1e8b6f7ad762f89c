//! Embedding providers used to turn query and page text into vectors.

use async_trait::async_trait;

use crate::error::ProviderError;

pub mod openai;

pub use openai::OpenAiEmbedder;

/// Vector produced for a piece of text plus the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryEmbedding {
    /// Embedding values.
    pub vector: Vec<f32>,
    /// Identifier of the producing model.
    pub model: String,
}

/// Trait implemented by concrete embedding backends.
///
/// `embed` is a single network call: implementations must not retry or cache.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds one non-empty text.
    async fn embed(&self, text: &str) -> Result<QueryEmbedding, ProviderError>;

    /// Embeds several texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?.vector);
        }
        Ok(out)
    }

    /// Name of the model this provider embeds with.
    fn model_name(&self) -> &str;
}

/// Normalizes text before it is sent to an embedding model.
pub fn clean_input(text: &str) -> String {
    text.trim().replace(['\r', '\n'], " ")
}
