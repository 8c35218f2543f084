// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Smoothed device-to-host bandwidth estimate.
//!
//! Each measured copy yields a throughput sample in MB/s. Samples at or
//! above the plausibility ceiling are dropped: a device-to-host copy can
//! wait on unrelated queued kernels, which makes the measured rate
//! meaningless. Accepted samples are blended in with a fixed factor:
//!
//! ```text
//! estimate' = 0.5 * sample + 0.5 * estimate
//! ```

use std::time::Duration;

/// Weight of the newest sample.
pub const SMOOTHING_FACTOR: f64 = 0.5;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of [`BandwidthEstimator::record_transfer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferSample {
    Accepted { sample_mbps: f64, estimate_mbps: f64 },
    Discarded { sample_mbps: f64 },
}

#[derive(Debug, Clone)]
pub struct BandwidthEstimator {
    estimate_mbps: f64,
    max_plausible_mbps: f64,
}

impl BandwidthEstimator {
    pub fn new(initial_mbps: f64, max_plausible_mbps: f64) -> Self {
        Self {
            estimate_mbps: initial_mbps,
            max_plausible_mbps,
        }
    }

    /// Feeds one measured copy of `size_bytes` that took `elapsed`.
    pub fn record_transfer(&mut self, size_bytes: usize, elapsed: Duration) -> TransferSample {
        let sample_mbps = (size_bytes as f64 / BYTES_PER_MB) / elapsed.as_secs_f64();
        if !sample_mbps.is_finite() || sample_mbps >= self.max_plausible_mbps {
            tracing::debug!(
                sample_mbps,
                max = self.max_plausible_mbps,
                "discarding implausible d2h bandwidth sample"
            );
            return TransferSample::Discarded { sample_mbps };
        }

        self.estimate_mbps =
            SMOOTHING_FACTOR * sample_mbps + (1.0 - SMOOTHING_FACTOR) * self.estimate_mbps;
        TransferSample::Accepted {
            sample_mbps,
            estimate_mbps: self.estimate_mbps,
        }
    }

    pub fn estimate_mbps(&self) -> f64 {
        self.estimate_mbps
    }

    pub fn max_plausible_mbps(&self) -> f64 {
        self.max_plausible_mbps
    }
}
