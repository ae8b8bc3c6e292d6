//! Eviction priority scoring

use std::collections::BTreeSet;
use std::time::Duration;

use super::entry::EntryStats;

/// Entries untouched for this long score zero on recency.
const RECENCY_WINDOW_SECS: f64 = 60.0;

/// Hit counts saturate here.
const HIT_SATURATION: u32 = 16;

/// Sub-scores quantize into this many buckets.
const BUCKETS: u32 = 128;

/// Sortable eviction priority; smallest = most evictable.
///
/// Field order is the comparison order: recency dominates, hit count
/// breaks ties, locality is the final tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority {
    pub recency: u8,
    pub popularity: u8,
    pub locality: u8,
}

/// Computes eviction priorities from entry access statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer;

impl PriorityScorer {
    /// Score an entry at a fixed evaluation instant.
    pub fn priority(&self, stats: EntryStats<'_>) -> Priority {
        Priority {
            recency: bucket(self.recency_score(stats.age)),
            popularity: bucket(self.popularity_score(stats.hits)),
            locality: bucket(self.locality_score(stats.seek_deltas)),
        }
    }

    /// 1.0 for a just-touched entry, decaying linearly to 0.0 once
    /// untouched for the full recency window.
    fn recency_score(&self, age: Duration) -> f64 {
        (RECENCY_WINDOW_SECS - age.as_secs_f64().min(RECENCY_WINDOW_SECS)) / RECENCY_WINDOW_SECS
    }

    fn popularity_score(&self, hits: u32) -> f64 {
        f64::from(hits.min(HIT_SATURATION)) / f64::from(HIT_SATURATION)
    }

    /// Rewards entries whose recorded deltas show a settling sequential
    /// pattern over erratic jumps. Tiers unlock in order, each requiring
    /// the previous: a unit forward step, a jump past +2, a unit
    /// back-step, a jump below -2.
    fn locality_score(&self, deltas: &BTreeSet<i64>) -> f64 {
        let mut tier = 0u32;
        if deltas.contains(&1) {
            tier = 1;
        }
        if tier == 1 && deltas.iter().any(|&d| d > 2) {
            tier = 2;
        }
        if tier == 2 && deltas.contains(&-1) {
            tier = 3;
        }
        if tier == 3 && deltas.iter().any(|&d| d < -2) {
            tier = 4;
        }
        f64::from(tier) / 4.0
    }
}

/// Quantize a 0.0..=1.0 score into a 0..=127 bucket.
fn bucket(score: f64) -> u8 {
    (((score.clamp(0.0, 1.0) * f64::from(BUCKETS)) as u32).min(BUCKETS - 1)) as u8
}
