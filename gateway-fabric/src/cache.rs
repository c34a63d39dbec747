//! Response Cache (§4.G): an LRU-with-TTL cache over `key -> value`,
//! deterministic key derivation, and live hit/miss/eviction statistics.

use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const DEFAULT_MAX_SIZE: usize = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// What a cache key is scoped to besides the question text.
pub enum ContextIdentifier {
    Files(Vec<String>),
    Raw(String),
    None,
}

impl ContextIdentifier {
    fn as_string(&self) -> String {
        match self {
            ContextIdentifier::Files(files) => files.join("|"),
            ContextIdentifier::Raw(s) => s.clone(),
            ContextIdentifier::None => String::new(),
        }
    }
}

/// Deterministic SHA-256 key over the canonical JSON form of the request.
/// `serde_json`'s default map representation is key-sorted, so the same
/// `{q, c, s}` triple always serializes identically regardless of call site.
pub fn cache_key(question: &str, context: &ContextIdentifier, model_settings: &serde_json::Value) -> String {
    let canonical = serde_json::json!({
        "q": question.trim().to_lowercase(),
        "c": context.as_string(),
        "s": model_settings,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

struct Entry {
    value: serde_json::Value,
    inserted_at: Instant,
    ttl: Duration,
    last_accessed: u64,
    insertion_seq: u64,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub max_size: usize,
    pub hit_rate: f64,
    pub total_requests: u64,
}

pub struct ResponseCache {
    entries: DashMap<String, Entry>,
    max_size: usize,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    clock: AtomicU64,
    insertion_counter: AtomicU64,
}

impl ResponseCache {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            insertion_counter: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let expired = self.entries.get(key).map(|e| e.is_expired()).unwrap_or(false);
        if expired {
            self.entries.remove(key);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let result = self.entries.get_mut(key).map(|mut e| {
            e.last_accessed = self.clock.fetch_add(1, Ordering::Relaxed);
            e.value.clone()
        });

        if result.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Evicts the entry with the smallest `last_accessed` tick (LRU), ties
    /// broken by earliest `insertion_seq`, only when the key is new and the
    /// cache is already at capacity.
    fn evict_one(&self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|e| (e.last_accessed, e.insertion_seq))
            .map(|e| e.key().clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set(&self, key: String, value: serde_json::Value, ttl: Option<Duration>) {
        let is_new = !self.entries.contains_key(&key);
        if is_new && self.entries.len() >= self.max_size {
            self.evict_one();
        }

        let tick = self.clock.fetch_add(1, Ordering::Relaxed);
        let seq = self.insertion_counter.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
                ttl: ttl.unwrap_or(self.default_ttl),
                last_accessed: tick,
                insertion_seq: seq,
            },
        );
    }

    /// Sweep expired entries. Safe to call periodically from a background
    /// task (every 5 minutes, per §4.G).
    pub fn cleanup(&self) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.is_expired())
            .map(|e| e.key().clone())
            .collect();
        for key in &expired {
            self.entries.remove(key);
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total_requests = hits + misses;
        CacheStats {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.entries.len(),
            max_size: self.max_size,
            hit_rate: if total_requests == 0 {
                0.0
            } else {
                hits as f64 / total_requests as f64
            },
            total_requests,
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE, DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_derive_the_same_key_case_and_whitespace_insensitively() {
        let settings = serde_json::json!({"model": "gpt-4"});
        let a = cache_key("  What is Rust?  ", &ContextIdentifier::Files(vec!["a.txt".into()]), &settings);
        let b = cache_key("what is rust?", &ContextIdentifier::Files(vec!["a.txt".into()]), &settings);
        assert_eq!(a, b);
    }

    #[test]
    fn different_context_files_change_the_key() {
        let settings = serde_json::json!({});
        let a = cache_key("q", &ContextIdentifier::Files(vec!["a.txt".into()]), &settings);
        let b = cache_key("q", &ContextIdentifier::Files(vec!["b.txt".into()]), &settings);
        assert_ne!(a, b);
    }

    #[test]
    fn hit_then_miss_updates_stats() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.set("k".into(), serde_json::json!("v"), None);
        assert_eq!(cache.get("k"), Some(serde_json::json!("v")));
        assert!(cache.get("missing").is_none());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.hit_rate, 0.5);
    }

    #[test]
    fn expired_entries_are_evicted_lazily_on_get() {
        let cache = ResponseCache::new(10, Duration::from_millis(10));
        cache.set("k".into(), serde_json::json!(1), None);
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn capacity_eviction_removes_least_recently_accessed() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.set("a".into(), serde_json::json!(1), None);
        cache.set("b".into(), serde_json::json!(2), None);
        cache.get("a");
        cache.set("c".into(), serde_json::json!(3), None);
        assert!(cache.get("b").is_none());
        assert!(cache.entries.contains_key("a"));
        assert!(cache.entries.contains_key("c"));
    }

    #[test]
    fn cleanup_sweeps_all_expired_entries() {
        let cache = ResponseCache::new(10, Duration::from_millis(10));
        cache.set("a".into(), serde_json::json!(1), None);
        cache.set("b".into(), serde_json::json!(2), None);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.stats().size, 0);
    }
}
