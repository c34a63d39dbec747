//! Embedding Client (§4.C): a content-hash cache decorator wrapping any
//! provider behind the [`Embedder`] trait, sub-batching to the provider's
//! limit and preserving input order.

pub mod cache;
pub mod http;

use async_trait::async_trait;
use rag_model::{ErrorKind, RagError};
use thiserror::Error;

/// Static metadata describing a particular embedder instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedderInfo {
    pub provider: String,
    pub embedding_model_id: String,
    pub dimension: usize,
}

#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("invalid embedder configuration: {0}")]
    InvalidConfiguration(String),
    #[error("embedding provider failure: {0}")]
    ProviderFailure(String),
}

impl From<EmbedderError> for RagError {
    fn from(err: EmbedderError) -> Self {
        RagError::new(ErrorKind::EmbeddingError, err.to_string())
    }
}

/// Contract: `embed_batch` preserves input order; `embed` is a 1-element
/// batch. The active dimension is a process-lifetime constant per instance.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let mut batch = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        Ok(batch.pop().unwrap_or_default())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    fn info(&self) -> &EmbedderInfo;
}

/// Maximum number of texts sent to the underlying provider in one call.
pub const MAX_PROVIDER_BATCH: usize = 100;

/// Split `texts` into sub-batches of at most [`MAX_PROVIDER_BATCH`], call
/// `provider_call` on each, and stitch results back in input order.
pub async fn embed_in_subbatches<F, Fut>(
    texts: &[String],
    provider_call: F,
) -> Result<Vec<Vec<f32>>, EmbedderError>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Vec<f32>>, EmbedderError>>,
{
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let mut results = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(MAX_PROVIDER_BATCH) {
        let batch_result = provider_call(chunk.to_vec()).await?;
        if batch_result.len() != chunk.len() {
            return Err(EmbedderError::ProviderFailure(format!(
                "provider returned {} embeddings for a batch of {}",
                batch_result.len(),
                chunk.len()
            )));
        }
        results.extend(batch_result);
    }
    Ok(results)
}
