//! Memoizing frame store with hysteresis eviction

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::entry::CacheEntry;
use super::key::AccessKey;
use super::score::{Priority, PriorityScorer};

/// Cache sizing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Target number of entries.
    pub capacity: usize,
    /// The store may grow to `capacity * limit_factor` before a purge.
    pub limit_factor: f64,
    /// A purge shrinks the store to `capacity * reduction_factor`.
    pub reduction_factor: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            limit_factor: 1.1,
            reduction_factor: 0.8,
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

/// When and how hard to shrink the store.
///
/// The gap between the trigger ceiling and the purge target is a
/// hysteresis band: the store grows past its nominal capacity before a
/// purge fires, and each purge drops it well below capacity, so a store
/// sitting near capacity does not purge on every insertion.
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    ceiling: usize,
    target: usize,
}

impl EvictionPolicy {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ceiling: scaled(config.capacity, config.limit_factor),
            target: scaled(config.capacity, config.reduction_factor),
        }
    }

    /// Entry count at which a purge fires.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Entry count a purge shrinks the store to.
    pub fn target(&self) -> usize {
        self.target
    }

    /// Number of entries a purge should drop; zero if none is due.
    pub fn excess(&self, len: usize) -> usize {
        if len >= self.ceiling.max(1) {
            len.saturating_sub(self.target)
        } else {
            0
        }
    }
}

/// `capacity * factor`, rounded to the nearest entry count.
fn scaled(capacity: usize, factor: f64) -> usize {
    (capacity as f64 * factor).round() as usize
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the store.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Memoizing store for decoded frames.
///
/// Lookups, statistics bookkeeping and size enforcement run as one
/// synchronous sequence under `&mut self`; the store is not reentrant,
/// and the decode closure must not call back into it. Callers that need
/// concurrent access wrap the whole owning service in a lock.
pub struct FrameCache<T> {
    entries: HashMap<AccessKey, CacheEntry<T>>,
    config: CacheConfig,
    policy: EvictionPolicy,
    scorer: PriorityScorer,
    prev_index: i64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<T: Clone> FrameCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            policy: EvictionPolicy::new(&config),
            scorer: PriorityScorer,
            config,
            prev_index: -1,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Look up `key`, invoking `decode` exactly once on a miss.
    ///
    /// Every completed call records the seek delta against the served
    /// entry, advances the previous-frame cursor to `key.frame()`, and
    /// then enforces the size bound. A failed decode stores nothing and
    /// leaves the cursor untouched.
    pub fn get_or_compute<E, F>(&mut self, key: AccessKey, decode: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let frame = key.frame();
        let delta = frame as i64 - self.prev_index;

        let payload = match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.touch(delta);
                self.hits += 1;
                trace!("cache hit for frame {} (delta {})", frame, delta);
                entry.payload().clone()
            }
            None => {
                let payload = decode()?;
                self.misses += 1;
                trace!("cache miss for frame {} (delta {})", frame, delta);
                self.entries
                    .insert(key, CacheEntry::new(payload.clone(), delta));
                payload
            }
        };

        self.prev_index = frame as i64;
        self.enforce_size();
        Ok(payload)
    }

    /// Check for a key without touching its access statistics.
    pub fn contains(&self, key: &AccessKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Inspect an entry without touching its access statistics.
    pub fn peek(&self, key: &AccessKey) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Drop every entry belonging to `subject`.
    pub fn remove_subject(&mut self, subject: &str) {
        let before = self.entries.len();
        self.entries.retain(|k, _| k.subject() != subject);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!("dropped {} cached frames for subject {}", dropped, subject);
        }
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.config.capacity,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }

    fn enforce_size(&mut self) {
        let excess = self.policy.excess(self.entries.len());
        if excess > 0 {
            self.evict(excess);
        }
    }

    /// Drop the `n` lowest-priority entries.
    ///
    /// Priorities are evaluated fresh against a single instant; equal
    /// priorities drop in frame-major key order so a purge is
    /// deterministic.
    fn evict(&mut self, n: usize) {
        let now = Instant::now();
        let mut ranked: Vec<(AccessKey, Priority)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), self.scorer.priority(entry.stats(now))))
            .collect();
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        for (key, _) in ranked.into_iter().take(n) {
            self.entries.remove(&key);
        }
        self.evictions += n as u64;
        debug!("purged {} entries, {} remain", n, self.entries.len());
    }
}
