//! Time-boxed deduplication cache for inbound events

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default suppression window for repeated camera events
pub const DEFAULT_DEDUP_TTL: Duration = Duration::from_secs(30);

/// Map size above which expired entries are swept on insert
const PURGE_THRESHOLD: usize = 1024;

/// TTL key set.
///
/// A key is a duplicate while its expiry lies in the future. Check and
/// insert happen under one lock, so of several simultaneous first calls for
/// the same key exactly one sees `false`.
#[derive(Debug)]
pub struct DedupCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Instant>>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_TTL)
    }
}

impl DedupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` if `key` was seen within the TTL window.
    ///
    /// Otherwise records `key` with a fresh window and returns `false`.
    pub fn hit(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(expiry) = entries.get(key) {
            if *expiry > now {
                return true;
            }
        }

        if entries.len() >= PURGE_THRESHOLD {
            entries.retain(|_, expiry| *expiry > now);
        }
        entries.insert(key.to_string(), now + self.ttl);
        false
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, expiry| *expiry > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
