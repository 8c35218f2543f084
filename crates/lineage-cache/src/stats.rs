// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Eviction statistics.
//!
//! [`EvictionStats`] accumulates counters over the cache's lifetime (until
//! `reset`). They are cheap to update inside the cache lock and are handed
//! out as snapshots.

/// Cumulative counters of a [`DeviceCache`](crate::DeviceCache).
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct EvictionStats {
    /// Device entries admitted.
    pub admissions: u64,
    /// Placeholder entries that were offered and ignored.
    pub placeholders_skipped: u64,
    /// Entries evicted to make space.
    pub evictions: u64,
    /// Bytes reclaimed by eviction.
    pub bytes_evicted: u64,
    /// Entries removed through explicit invalidation.
    pub explicit_removals: u64,
    /// Admissions refused because eviction could not reclaim enough space.
    pub failed_admissions: u64,
    /// High-water mark of accounted cache bytes.
    pub peak_cached_bytes: usize,
    /// Bandwidth samples blended into the estimate.
    pub bandwidth_samples: u64,
    /// Bandwidth samples discarded as implausible.
    pub discarded_samples: u64,
}

impl EvictionStats {
    pub(crate) fn record_admission(&mut self) {
        self.admissions += 1;
    }

    pub(crate) fn record_placeholder(&mut self) {
        self.placeholders_skipped += 1;
    }

    pub(crate) fn record_eviction(&mut self, bytes: usize) {
        self.evictions += 1;
        self.bytes_evicted += bytes as u64;
    }

    pub(crate) fn record_removal(&mut self) {
        self.explicit_removals += 1;
    }

    pub(crate) fn record_failed_admission(&mut self) {
        self.failed_admissions += 1;
    }

    pub(crate) fn update_peak(&mut self, current_bytes: usize) {
        self.peak_cached_bytes = self.peak_cached_bytes.max(current_bytes);
    }

    pub(crate) fn record_sample(&mut self, accepted: bool) {
        if accepted {
            self.bandwidth_samples += 1;
        } else {
            self.discarded_samples += 1;
        }
    }

    /// Evicted bytes per eviction, or `0.0` before the first eviction.
    pub fn mean_eviction_bytes(&self) -> f64 {
        if self.evictions == 0 {
            return 0.0;
        }
        self.bytes_evicted as f64 / self.evictions as f64
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Cache: {} admissions ({} placeholders skipped), {} evictions \
             ({:.2} MB reclaimed), {} removals, {} failed admissions, \
             peak {:.2} MB, {} bandwidth samples ({} discarded)",
            self.admissions,
            self.placeholders_skipped,
            self.evictions,
            self.bytes_evicted as f64 / (1024.0 * 1024.0),
            self.explicit_removals,
            self.failed_admissions,
            self.peak_cached_bytes as f64 / (1024.0 * 1024.0),
            self.bandwidth_samples,
            self.discarded_samples,
        )
    }
}
