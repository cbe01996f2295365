use async_trait::async_trait;

use crate::error::RetrievalResult;

/// Turns text into fixed-length vectors.
///
/// Failures are surfaced as [`crate::RetrievalError::Embedding`] and are
/// never retried or replaced with defaults by the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single search text
    async fn embed(&self, text: &str) -> RetrievalResult<Vec<f32>>;

    /// Embed several texts in one call. The output is positionally aligned
    /// with `texts`.
    async fn embed_batch(&self, texts: &[String]) -> RetrievalResult<Vec<Vec<f32>>>;
}
