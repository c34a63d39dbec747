//! Content-addressed embedding cache (§4.C): keyed by MD5 of the text,
//! 24h TTL, eviction opportunistic on access plus an idle cleanup pass.
//! Only successful provider results are ever stored.

use crate::{EmbedderError, EmbedderInfo, Embedder};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry {
    embedding: Vec<f32>,
    inserted_at: Instant,
}

fn content_key(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Wraps any [`Embedder`] with a content-hash cache, sharded by key hash
/// (via `dashmap`) so lookups for distinct texts don't serialize behind one
/// global lock. Cache misses fall through to the inner provider; provider
/// failures are never cached.
pub struct CachedEmbedder<E: Embedder> {
    inner: E,
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    pub fn with_ttl(inner: E, ttl: Duration) -> Self {
        Self {
            inner,
            entries: DashMap::new(),
            ttl,
        }
    }

    fn get(&self, key: &str) -> Option<Vec<f32>> {
        let expired = self.entries.get(key).map(|e| e.inserted_at.elapsed() > self.ttl).unwrap_or(false);
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| e.embedding.clone())
    }

    fn put(&self, key: String, embedding: Vec<f32>) {
        self.entries.insert(key, Entry { embedding, inserted_at: Instant::now() });
    }

    pub fn cached_len(&self) -> usize {
        self.entries.len()
    }

    /// Idle cleanup pass, meant to be called periodically by a background
    /// task rather than on the request path. Drops every entry past its
    /// TTL regardless of access.
    pub fn sweep_expired(&self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, e| e.inserted_at.elapsed() <= ttl);
        before - self.entries.len()
    }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = texts.iter().map(|t| content_key(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses: Vec<usize> = Vec::new();

        for (i, key) in keys.iter().enumerate() {
            match self.get(key) {
                Some(embedding) => results[i] = Some(embedding),
                None => misses.push(i),
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let fetched = self.inner.embed_batch(&miss_texts).await?;
            if fetched.len() != misses.len() {
                return Err(EmbedderError::ProviderFailure(format!(
                    "provider returned {} embeddings for {} miss(es)",
                    fetched.len(),
                    misses.len()
                )));
            }

            for (offset, &i) in misses.iter().enumerate() {
                self.put(keys[i].clone(), fetched[offset].clone());
                results[i] = Some(fetched[offset].clone());
            }
        }

        Ok(results.into_iter().map(|r| r.unwrap_or_default()).collect())
    }

    fn info(&self) -> &EmbedderInfo {
        self.inner.info()
    }
}
