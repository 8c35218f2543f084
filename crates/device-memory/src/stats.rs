// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Counters for the simulated device.

/// Cumulative statistics of a [`SimulatedDevice`](crate::SimulatedDevice).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DeviceStats {
    /// Successful allocations.
    pub allocations: u64,
    /// Successful frees.
    pub frees: u64,
    /// Allocation requests rejected because the pool was full.
    pub oom_count: u64,
    /// Frees or size queries naming a pointer the device does not know.
    pub unknown_pointer_count: u64,
    /// High-water mark of allocated bytes.
    pub peak_allocated_bytes: usize,
}

impl DeviceStats {
    pub(crate) fn record_allocation(&mut self, allocated_now: usize) {
        self.allocations += 1;
        self.peak_allocated_bytes = self.peak_allocated_bytes.max(allocated_now);
    }

    pub(crate) fn record_free(&mut self) {
        self.frees += 1;
    }

    pub(crate) fn record_oom(&mut self) {
        self.oom_count += 1;
    }

    pub(crate) fn record_unknown_pointer(&mut self) {
        self.unknown_pointer_count += 1;
    }

    /// Number of blocks allocated and not yet freed.
    pub fn outstanding(&self) -> u64 {
        self.allocations.saturating_sub(self.frees)
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Device: {} allocations, {} frees ({} outstanding), {} OOMs, \
             {} unknown-pointer calls, peak {:.2} MB",
            self.allocations,
            self.frees,
            self.outstanding(),
            self.oom_count,
            self.unknown_pointer_count,
            self.peak_allocated_bytes as f64 / (1024.0 * 1024.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outstanding() {
        let mut s = DeviceStats::default();
        s.record_allocation(10);
        s.record_allocation(30);
        s.record_free();
        assert_eq!(s.outstanding(), 1);
        assert_eq!(s.peak_allocated_bytes, 30);
    }

    #[test]
    fn test_summary() {
        let mut s = DeviceStats::default();
        s.record_allocation(1024 * 1024);
        s.record_oom();
        let text = s.summary();
        assert!(text.contains("1 allocations"));
        assert!(text.contains("1 OOMs"));
        assert!(text.contains("peak 1.00 MB"));
    }
}
