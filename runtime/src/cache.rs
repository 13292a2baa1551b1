// Copyright 2026 Datacom Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dividend date caching, keyed by asset detail URL.
//!
//! ## Expiry
//!
//! Entries expire lazily: a read that finds an entry older than the TTL
//! deletes it and reports a miss. There is no background sweep; the key
//! space is bounded by the asset universe.

use crate::clock::Clock;
use crate::model::DividendSnapshot;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default TTL. Dividend calendars change at most daily.
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

struct CacheEntry {
    snapshot: DividendSnapshot,
    cached_at: DateTime<Utc>,
}

/// TTL-bounded map from asset URL to its last resolved dividend date.
///
/// Shared by every enrichment run; one lock guards both reads and writes.
pub struct DividendDateCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl DividendDateCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Fresh entry for `key`, if any. A stale entry is removed on the way.
    pub fn get(&self, key: &str) -> Option<DividendSnapshot> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let entry = entries.get(key)?;
        if now - entry.cached_at > self.ttl {
            entries.remove(key);
            tracing::debug!(key, "dividend cache entry expired");
            return None;
        }
        Some(entry.snapshot.clone())
    }

    /// Insert or refresh `key` with the current timestamp.
    pub fn set(&self, key: &str, snapshot: DividendSnapshot) {
        let entry = CacheEntry {
            snapshot,
            cached_at: self.clock.now(),
        };
        self.entries.lock().insert(key.to_string(), entry);
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
