//! Keyed result cache with per-entry expiry.
//!
//! Adapters stay stateless; [`crate::client::MediaClient`] consults a
//! [`Cache`] before calling them and stores what they return. Values are
//! kept as JSON so one store can hold every result type.

use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Storage port for adapter results.
pub trait Cache: Send + Sync {
    /// Returns the live value under `key`, if any.
    fn get(&self, key: &str) -> Option<JsonValue>;

    /// Stores `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: JsonValue, ttl: Duration);
}

/// Key for a search on one source.
pub fn search_key(source: &str, keyword: &str) -> String {
    format!("search_{source}_{keyword}")
}

/// Key for the episode list of a detail page.
pub fn episodes_key(detail_url: &str) -> String {
    format!("episodes_{detail_url}")
}

/// Key for a resolved video URL.
pub fn extract_key(episode_url: &str) -> String {
    format!("extract_{episode_url}")
}

/// Process-local cache. Expired entries are dropped when read and on every
/// write.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, JsonValue)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<JsonValue> {
        let mut entries = self.entries.lock().ok()?;
        let expired = match entries.get(key) {
            Some((expires, value)) if Instant::now() < *expires => {
                debug!(key, "Cache hit");
                return Some(value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(key, "Cache entry expired");
            entries.remove(key);
        }
        None
    }

    fn set(&self, key: &str, value: JsonValue, ttl: Duration) {
        let now = Instant::now();
        let Some(expires) = now.checked_add(ttl) else {
            return;
        };
        if let Ok(mut entries) = self.entries.lock() {
            let before = entries.len();
            entries.retain(|_, (until, _)| *until > now);
            if entries.len() < before {
                debug!(dropped = before - entries.len(), "Evicted expired cache entries");
            }
            entries.insert(key.to_string(), (expires, value));
        }
    }
}
