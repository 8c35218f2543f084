// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # lineage-cache
//!
//! The device-memory eviction core of a lineage (computation reuse) cache.
//! It decides which cached results in accelerator memory may be reclaimed,
//! keeps results that are in active use out of reach of eviction, and holds
//! the cache to a byte budget carved out of the device's memory pool.
//!
//! # Key Components
//!
//! - [`LivenessTable`]: per-pointer active-use counts.
//! - [`EntryRegistry`]: pointer → entry metadata, score and admission order.
//! - [`EvictionQueue`]: free entries ordered by score, lowest first.
//! - [`SpaceAccountant`]: cached bytes against the configured limit.
//! - [`BandwidthEstimator`]: smoothed device-to-host copy throughput,
//!   feeding the [`CostModel`] that scores new entries.
//! - [`DeviceCache`]: the five above behind one lock, plus the eviction
//!   protocol and lifecycle. This is the only type callers need.
//! - [`BackgroundEvictor`]: a tokio task keeping headroom free.
//!
//! # Entry Lifecycle
//!
//! ```text
//! admit ─► live (count ≥ 1) ◄─► free (queued) ─► evicted: invalidated upstream,
//!                                                  freed on the device
//! ```
//!
//! A cached pointer is always either live or free, never both. Placeholders
//! and scalars never enter either state.
//!
//! # Example
//! ```
//! use device_memory::{ByteSize, SimulatedDevice};
//! use lineage_cache::{CacheConfig, CacheEntry, DeviceCache, NoUpstream};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(2_000_000)));
//! let config = CacheConfig { cache_fraction: 0.5, ..Default::default() };
//! let cache = DeviceCache::init(config, device.clone(), Arc::new(NoUpstream)).unwrap();
//!
//! let a = device.allocate(600_000).unwrap();
//! cache.admit(CacheEntry::device("A", a, Duration::from_millis(5))).unwrap();
//! cache.release(a).unwrap(); // A is free now
//!
//! // B does not fit next to A, so A is evicted and freed on the device.
//! let b = device.allocate(500_000).unwrap();
//! cache.admit(CacheEntry::device("B", b, Duration::from_millis(5))).unwrap();
//! assert_eq!(cache.num_cached(), 1);
//! assert!(!device.contains(a));
//! ```

mod accountant;
mod background;
mod bandwidth;
mod cache;
mod config;
mod entry;
mod error;
mod guard;
mod liveness;
mod queue;
mod registry;
mod score;
mod stats;

pub use accountant::SpaceAccountant;
pub use background::BackgroundEvictor;
pub use bandwidth::{BandwidthEstimator, TransferSample, SMOOTHING_FACTOR};
pub use cache::{
    Admission, DeviceCache, EvictedEntry, EvictionReport, NoUpstream, ResultTable,
    ShutdownReport,
};
pub use config::{BackgroundConfig, CacheConfig};
pub use entry::{CacheEntry, EntryValue, LineageKey};
pub use error::CacheError;
pub use guard::LiveGuard;
pub use liveness::LivenessTable;
pub use queue::{EvictionQueue, Victim};
pub use registry::{EntryRegistry, RegisteredEntry};
pub use score::{
    CostModel, EvictionPolicy, RemovalList, Score, Weights, DEFAULT_REMOVAL_CAPACITY,
};
pub use stats::EvictionStats;
