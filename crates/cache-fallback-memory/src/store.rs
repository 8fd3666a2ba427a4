//! Entry storage with TTL tracking.

use bytes::Bytes;
use cache_fallback_core::{CacheRecord, Key};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant, SystemTime};

/// A stored payload with its expiry bookkeeping.
#[derive(Clone, Debug)]
struct Entry {
    item: Bytes,
    stored: SystemTime,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn new(item: Bytes, ttl: Duration) -> Self {
        Self {
            item,
            stored: SystemTime::now(),
            inserted_at: Instant::now(),
            ttl,
        }
    }

    // A zero ttl is expired on arrival.
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }

    fn to_record(&self) -> CacheRecord {
        CacheRecord::new(self.item.clone(), self.stored, self.ttl)
    }
}

/// Key/value storage, optionally bounded with least-recently-used eviction.
pub(crate) struct MemoryStore {
    entries: LruCache<Key, Entry>,
}

impl MemoryStore {
    /// Creates a store holding at most `capacity` entries, or unbounded.
    pub(crate) fn new(capacity: Option<NonZeroUsize>) -> Self {
        let entries = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self { entries }
    }

    /// Returns the record for `key` unless it is missing or expired.
    pub(crate) fn get(&mut self, key: &Key) -> Option<CacheRecord> {
        let expired = self.entries.get(key)?.is_expired();
        if expired {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(Entry::to_record)
    }

    /// Stores a payload. Returns the key evicted to make room, if any.
    pub(crate) fn insert(&mut self, key: Key, item: Bytes, ttl: Duration) -> Option<Key> {
        let entry = Entry::new(item, ttl);
        match self.entries.push(key.clone(), entry) {
            Some((evicted, _)) if evicted != key => Some(evicted),
            _ => None,
        }
    }

    /// Removes `key` if present.
    pub(crate) fn remove(&mut self, key: &Key) {
        self.entries.pop(key);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
