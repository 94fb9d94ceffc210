//! Response cache for parsed tables.
//!
//! Keyed by canonical URI with one TTL for every entry. Expired entries read
//! as absent and are purged by a janitor task. Failures are never cached.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::table::Table;

/// Cache entry with TTL
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: chrono::Duration) -> Self {
        Self {
            value,
            expires_at: Utc::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// TTL cache from canonical URI to parsed table.
#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry<Arc<Table>>>>,
    ttl: chrono::Duration,
    ttl_std: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::milliseconds(millis),
            ttl_std: ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl_std
    }

    /// Cached table for `key`, unless missing or expired.
    pub fn get(&self, key: &str) -> Option<Arc<Table>> {
        let entries = self.entries.read().ok()?;

        entries.get(key).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(Arc::clone(&entry.value))
            }
        })
    }

    /// Store `table` under `key`; the last write wins.
    pub fn set(&self, key: impl Into<String>, table: Arc<Table>) {
        let entry = CacheEntry::new(table, self.ttl);

        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.into(), entry);
        }
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn clear_expired(&self) -> usize {
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, entry| !entry.is_expired());
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    pub fn clear_all(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().ok();
        let (total, expired) = entries
            .map(|c| {
                let total = c.len();
                let expired = c.values().filter(|e| e.is_expired()).count();
                (total, expired)
            })
            .unwrap_or((0, 0));

        CacheStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total - expired,
            ttl_secs: self.ttl_std.as_secs(),
        }
    }

    /// Purge expired entries every TTL.
    pub fn spawn_janitor(self: Arc<Self>) -> JoinHandle<()> {
        let period = self.ttl_std.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let purged = self.clear_expired();
                if purged > 0 {
                    debug!(purged, "Purged expired cache entries");
                }
            }
        })
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    pub ttl_secs: u64,
}

// ============================================================================
// Tests
// ============================================================================
