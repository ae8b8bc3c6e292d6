//! Cache entries and their access statistics

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// One cached decode plus the statistics the eviction scorer reads.
///
/// Created on the first miss for a key, mutated in place on every
/// subsequent hit, destroyed only by a bulk eviction pass.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    payload: T,
    last_access: Instant,
    seek_deltas: BTreeSet<i64>,
    hits: u32,
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(payload: T, delta: i64) -> Self {
        let mut seek_deltas = BTreeSet::new();
        seek_deltas.insert(delta);
        Self {
            payload,
            last_access: Instant::now(),
            seek_deltas,
            hits: 0,
        }
    }

    /// Refresh on a cache hit: new timestamp, new delta, one more hit.
    pub(crate) fn touch(&mut self, delta: i64) {
        self.last_access = Instant::now();
        self.seek_deltas.insert(delta);
        self.hits += 1;
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Number of cache hits. The initial insert does not count.
    pub fn hits(&self) -> u32 {
        self.hits
    }

    /// Signed seek distances observed when this entry was produced or
    /// re-requested. A locality fingerprint.
    pub fn seek_deltas(&self) -> &BTreeSet<i64> {
        &self.seek_deltas
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_access)
    }

    /// Statistics snapshot handed to the priority scorer.
    pub fn stats(&self, now: Instant) -> EntryStats<'_> {
        EntryStats {
            age: self.age(now),
            hits: self.hits,
            seek_deltas: &self.seek_deltas,
        }
    }
}

/// Access statistics of one entry at a fixed evaluation instant.
#[derive(Debug, Clone, Copy)]
pub struct EntryStats<'a> {
    pub age: Duration,
    pub hits: u32,
    pub seek_deltas: &'a BTreeSet<i64>,
}
