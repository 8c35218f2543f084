// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Eviction-priority scoring.
//!
//! Every device entry gets one score when it is admitted and keeps it for
//! its whole residency. Lower scores are evicted first. The score mixes two
//! terms, weighted by the configured [`EvictionPolicy`]:
//!
//! ```text
//! score = w_cost    * (penalty_secs / size_mb) * (1 + misses)
//!       + w_recency * secs_since_start
//!
//! penalty_secs = compute_secs + size_mb / d2h_mbps
//! ```
//!
//! `penalty_secs` is what a future miss on the value would cost: recomputing
//! it, plus moving it across the device-to-host link at the currently
//! estimated bandwidth. `misses` comes from the [`RemovalList`], which
//! remembers keys that were evicted and then asked for again.

use crate::{CacheEntry, LineageKey};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// An eviction-priority value. Totally ordered, lower evicts first.
#[derive(Debug, Clone, Copy)]
pub struct Score(f64);

impl Score {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Preset weightings of the two score terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Recency only: the oldest admission goes first.
    Lru,
    /// Compute cost per byte only.
    #[default]
    CostNSize,
    /// Both terms with equal weight.
    Hybrid,
}

impl EvictionPolicy {
    pub fn weights(self) -> Weights {
        match self {
            Self::Lru => Weights { cost: 0.0, recency: 1.0 },
            Self::CostNSize => Weights { cost: 1.0, recency: 0.0 },
            Self::Hybrid => Weights { cost: 1.0, recency: 1.0 },
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::CostNSize => "cost-n-size",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Weights of the cost and recency terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub cost: f64,
    pub recency: f64,
}

/// Default number of evicted keys a [`RemovalList`] remembers.
pub const DEFAULT_REMOVAL_CAPACITY: usize = 4096;

#[derive(Debug)]
struct Remembered {
    misses: u32,
    stamp: u64,
}

/// Lineage keys that were evicted from the device, with the number of
/// misses observed on each since.
///
/// Holds at most `capacity` keys. When full, the key evicted longest ago
/// is forgotten first; evicting a remembered key again refreshes it.
#[derive(Debug)]
pub struct RemovalList {
    keys: HashMap<LineageKey, Remembered>,
    order: BTreeMap<u64, LineageKey>,
    next_stamp: u64,
    capacity: usize,
}

impl Default for RemovalList {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_REMOVAL_CAPACITY)
    }
}

impl RemovalList {
    /// A list remembering at most `capacity` keys (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: HashMap::new(),
            order: BTreeMap::new(),
            next_stamp: 0,
            capacity: capacity.max(1),
        }
    }

    /// Remembers an evicted key. Existing miss counts are kept.
    pub fn remember(&mut self, key: LineageKey) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        match self.keys.get_mut(&key) {
            Some(known) => {
                self.order.remove(&known.stamp);
                known.stamp = stamp;
            }
            None => {
                self.keys.insert(key.clone(), Remembered { misses: 0, stamp });
            }
        }
        self.order.insert(stamp, key);

        while self.keys.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.keys.remove(&oldest);
        }
    }

    /// Counts a miss on `key`. Returns false if the key is not remembered.
    pub fn record_miss(&mut self, key: &LineageKey) -> bool {
        match self.keys.get_mut(key) {
            Some(known) => {
                known.misses = known.misses.saturating_add(1);
                true
            }
            None => false,
        }
    }

    pub fn misses(&self, key: &LineageKey) -> u32 {
        self.keys.get(key).map_or(0, |k| k.misses)
    }

    pub fn contains(&self, key: &LineageKey) -> bool {
        self.keys.contains_key(key)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Forgets every key. The capacity is kept.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.order.clear();
    }
}

/// Computes admission scores.
#[derive(Debug, Clone)]
pub struct CostModel {
    weights: Weights,
    start: Instant,
}

impl CostModel {
    pub fn new(weights: Weights) -> Self {
        Self {
            weights,
            start: Instant::now(),
        }
    }

    pub fn weights(&self) -> Weights {
        self.weights
    }

    /// The instant recency is measured from.
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Restarts the recency clock.
    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    /// Scores `entry` of `size_bytes` as if admitted at `now`.
    pub fn score_at(
        &self,
        entry: &CacheEntry,
        size_bytes: usize,
        removals: &RemovalList,
        d2h_mbps: f64,
        now: Instant,
    ) -> Score {
        let size_mb = size_bytes.max(1) as f64 / BYTES_PER_MB;
        let transfer_secs = if d2h_mbps > 0.0 { size_mb / d2h_mbps } else { 0.0 };
        let penalty_secs = entry.compute_time.as_secs_f64() + transfer_secs;
        let miss_factor = 1.0 + f64::from(removals.misses(&entry.key));

        let cost = penalty_secs / size_mb * miss_factor;
        let recency = now.saturating_duration_since(self.start).as_secs_f64();
        Score(self.weights.cost * cost + self.weights.recency * recency)
    }

    pub fn score(
        &self,
        entry: &CacheEntry,
        size_bytes: usize,
        removals: &RemovalList,
        d2h_mbps: f64,
    ) -> Score {
        self.score_at(entry, size_bytes, removals, d2h_mbps, Instant::now())
    }
}
