//! In-memory cache for fallback classifications
//!
//! Keys are SHA-256 of the trimmed, lowercased description. When the cache is
//! full, the tenth of entries closest to expiry is dropped before inserting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::models::CategoryLabel;

/// Only results above this confidence are worth remembering
pub const MIN_CACHEABLE_CONFIDENCE: f64 = 0.25;

/// A remembered provider answer
#[derive(Debug, Clone, PartialEq)]
pub struct CachedClassification {
    pub category: CategoryLabel,
    pub confidence: f64,
    pub reasoning: String,
    pub model: Option<String>,
}

#[derive(Debug)]
struct CacheEntry {
    value: CachedClassification,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups served from cache
    pub hit_rate: f64,
    pub max_entries: usize,
    pub ttl_secs: u64,
}

/// TTL + capacity bounded classification cache
#[derive(Debug)]
pub struct ClassificationCache {
    ttl: Duration,
    max_entries: usize,
    inner: Mutex<Inner>,
}

impl ClassificationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Build from config; `None` when the cache is disabled
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.ttl, config.max_entries))
    }

    fn key(description: &str) -> String {
        let normalized = description.trim().to_lowercase();
        hex::encode(Sha256::digest(normalized.as_bytes()))
    }

    /// Look up a description, counting the hit or miss
    pub fn get(&self, description: &str) -> Option<CachedClassification> {
        let key = Self::key(description);
        let Ok(mut inner) = self.inner.lock() else {
            return None;
        };

        let now = Instant::now();
        let found = match inner.entries.get(&key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(&key);
                None
            }
            None => None,
        };

        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    /// Remember a result; low-confidence results are ignored
    pub fn insert(&self, description: &str, value: CachedClassification) -> bool {
        if value.confidence <= MIN_CACHEABLE_CONFIDENCE {
            return false;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };

        let key = Self::key(description);
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            self.evict_soonest_expiring(&mut inner);
        }

        inner.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
        true
    }

    fn evict_soonest_expiring(&self, inner: &mut Inner) {
        let count = (self.max_entries / 10).max(1);

        let mut by_expiry: Vec<(Instant, String)> = inner
            .entries
            .iter()
            .map(|(k, e)| (e.expires_at, k.clone()))
            .collect();
        by_expiry.sort();

        for (_, key) in by_expiry.into_iter().take(count) {
            inner.entries.remove(&key);
        }
        tracing::debug!(evicted = count, "Classification cache full");
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner = Inner::default();
        }
    }

    pub fn stats(&self) -> CacheStats {
        let (size, hits, misses) = self
            .inner
            .lock()
            .map(|i| (i.entries.len(), i.hits, i.misses))
            .unwrap_or((0, 0, 0));
        let total = hits + misses;
        let hit_rate = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            size,
            hits,
            misses,
            hit_rate,
            max_entries: self.max_entries,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
