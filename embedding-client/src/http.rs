//! Thin HTTP-backed [`Embedder`] implementation, calling an
//! OpenAI-compatible `/embeddings` endpoint.

use crate::{embed_in_subbatches, EmbedderError, EmbedderInfo, Embedder};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    pub endpoint: String,
    pub api_key: String,
    pub embedding_model_id: String,
    pub dimension: usize,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    config: HttpEmbedderConfig,
    info: EmbedderInfo,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Self {
        let info = EmbedderInfo {
            provider: "http".into(),
            embedding_model_id: config.embedding_model_id.clone(),
            dimension: config.dimension,
        };
        Self {
            client: reqwest::Client::new(),
            config,
            info,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
    index: usize,
}

impl HttpEmbedder {
    /// Sends exactly one `/embeddings` request for `texts` and stitches the
    /// response back into input order. Callers are responsible for keeping
    /// `texts` within the provider's batch limit.
    async fn call_provider(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let body = json!({
            "model": self.config.embedding_model_id,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedderError::ProviderFailure(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EmbedderError::ProviderFailure(format!(
                "provider returned {status}: {text}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbedderError::ProviderFailure(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(EmbedderError::ProviderFailure(format!(
                "provider returned {} embeddings for {} input(s)",
                parsed.data.len(),
                texts.len()
            )));
        }

        let mut ordered: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for entry in parsed.data {
            if entry.index >= ordered.len() {
                return Err(EmbedderError::ProviderFailure(format!(
                    "provider returned out-of-range index {}",
                    entry.index
                )));
            }
            ordered[entry.index] = Some(entry.embedding);
        }

        ordered
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                v.ok_or_else(|| {
                    EmbedderError::ProviderFailure(format!("provider omitted embedding for index {i}"))
                })
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        embed_in_subbatches(texts, |chunk| self.call_provider(chunk)).await
    }

    fn info(&self) -> &EmbedderInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_populates_info_fields() {
        let embedder = HttpEmbedder::new(HttpEmbedderConfig {
            endpoint: "https://example.com/v1/embeddings".into(),
            api_key: "sk-test".into(),
            embedding_model_id: "text-embedding-3-small".into(),
            dimension: 1536,
        });
        assert_eq!(embedder.info().dimension, 1536);
        assert_eq!(embedder.info().embedding_model_id, "text-embedding-3-small");
    }
}
