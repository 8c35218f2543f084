// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII liveness guard.
//!
//! [`LiveGuard`] pairs a `mark_in_use` with its `release`: the pointer stays
//! live, and therefore unevictable, for exactly as long as the guard exists.

use crate::DeviceCache;
use device_memory::DevicePtr;

/// Keeps a cached pointer live until dropped.
///
/// # Example
/// ```
/// use device_memory::{ByteSize, SimulatedDevice};
/// use lineage_cache::{CacheConfig, CacheEntry, DeviceCache, NoUpstream};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let device = Arc::new(SimulatedDevice::new(ByteSize::from_mb(1)));
/// let cache = DeviceCache::init(CacheConfig::default(), device.clone(), Arc::new(NoUpstream)).unwrap();
/// let ptr = device.allocate(4096).unwrap();
/// cache.admit(CacheEntry::device("tsmm(X)", ptr, Duration::from_millis(2))).unwrap();
/// cache.release(ptr).unwrap();
///
/// let guard = cache.acquire(ptr).unwrap();
/// assert!(cache.probe_live(guard.ptr())); // cannot be evicted meanwhile
/// drop(guard);                            // released; evictable again at count 0
/// assert_eq!(cache.num_evictable(), 1);
/// ```
pub struct LiveGuard<'a> {
    cache: &'a DeviceCache,
    ptr: DevicePtr,
}

impl<'a> LiveGuard<'a> {
    pub(crate) fn new(cache: &'a DeviceCache, ptr: DevicePtr) -> Self {
        Self { cache, ptr }
    }

    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.cache.release(self.ptr) {
            tracing::error!(ptr = %self.ptr, error = %e, "live guard release failed");
        }
    }
}

impl std::fmt::Debug for LiveGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveGuard").field("ptr", &self.ptr).finish()
    }
}
