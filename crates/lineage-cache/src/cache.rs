// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The device cache core.
//!
//! [`DeviceCache`] owns the liveness table, the entry registry, the eviction
//! queue, the space accountant and the bandwidth estimator, all behind one
//! mutex. Every operation that looks at whether a pointer is live and then
//! moves it in or out of the queue does both under that single lock, so a
//! pointer is never observed in both the live and free sets, nor evicted
//! while a consumer holds it.
//!
//! ```text
//!   add_entry ──► live(1) ──release──► free (queued) ──evict──► gone
//!                   ▲  │                   │
//!                   │  └──mark_in_use──────┘ (count += 1)
//!                   └────────mark_in_use──────┘
//! ```
//!
//! # Eviction
//! Eviction pops victims in ascending score order until the requested bytes
//! fit under the limit. Victims are unregistered and their bytes returned to
//! the budget while the lock is held; the upstream invalidation and the
//! device `free` run after it is released, so a slow device call never
//! blocks unrelated cache operations and no thread can see a half-evicted
//! entry.

use crate::accountant::limit_for;
use crate::{
    BandwidthEstimator, CacheConfig, CacheEntry, CacheError, CostModel, EntryRegistry,
    EntryValue, EvictionQueue, EvictionStats, LineageKey, LiveGuard, LivenessTable,
    RegisteredEntry, RemovalList, Score, SpaceAccountant, TransferSample, Victim,
};
use device_memory::{DeviceMemory, DevicePtr};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// The upstream result table that maps lineage keys to cached values.
///
/// The cache calls [`invalidate`](ResultTable::invalidate) once an entry has
/// left the device cache, after the entry is unregistered.
pub trait ResultTable: Send + Sync {
    fn invalidate(&self, key: &LineageKey);
}

/// A [`ResultTable`] that ignores invalidations.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoUpstream;

impl ResultTable for NoUpstream {
    fn invalidate(&self, _key: &LineageKey) {}
}

/// Result of offering an entry to the cache.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// The entry is cached and live with one user.
    Admitted { ptr: DevicePtr, score: Score },
    /// Placeholders never take part in device caching.
    SkippedPlaceholder,
}

/// One entry reclaimed by eviction.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictedEntry {
    pub ptr: DevicePtr,
    pub key: LineageKey,
    pub size_bytes: usize,
}

/// Entries reclaimed by one eviction run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvictionReport {
    pub evicted: Vec<EvictedEntry>,
}

impl EvictionReport {
    pub fn reclaimed_bytes(&self) -> usize {
        self.evicted.iter().map(|e| e.size_bytes).sum()
    }

    pub fn len(&self) -> usize {
        self.evicted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }
}

/// Result of [`DeviceCache::shutdown`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    /// Free entries evicted and freed on the device.
    pub released: EvictionReport,
    /// Entries still held by consumers.
    pub still_live: usize,
}

struct CacheState {
    liveness: LivenessTable,
    registry: EntryRegistry,
    queue: EvictionQueue,
    space: SpaceAccountant,
    bandwidth: BandwidthEstimator,
    removals: RemovalList,
    cost: CostModel,
    stats: EvictionStats,
    closed: bool,
}

impl CacheState {
    fn victim_for(&self, ptr: DevicePtr) -> Option<Victim> {
        self.registry.get(ptr).map(|r| Victim {
            score: r.score,
            seq: r.seq,
            ptr,
        })
    }

    /// Registers `entry` and marks it live with one user.
    fn insert_live(
        &mut self,
        entry: CacheEntry,
        ptr: DevicePtr,
        size_bytes: usize,
    ) -> Result<Score, CacheError> {
        let score = self.cost.score(
            &entry,
            size_bytes,
            &self.removals,
            self.bandwidth.estimate_mbps(),
        );
        let key = entry.key.clone();
        self.registry.register(entry, ptr, score)?;
        self.liveness.increment(ptr);
        self.stats.record_admission();
        tracing::debug!(%key, %ptr, size_bytes, %score, "entry admitted to device cache");
        Ok(score)
    }

    /// Pops victims until `need` bytes fit. Reclaimed entries are appended
    /// to `victims` even when the queue runs dry first.
    fn evict_until_headroom(
        &mut self,
        need: usize,
        device: &dyn DeviceMemory,
        victims: &mut Vec<EvictedEntry>,
    ) -> Result<(), CacheError> {
        let mut reclaimed = 0;
        while !self.space.has_headroom(need) {
            let Some(victim) = self.queue.pop_victim() else {
                return Err(CacheError::InsufficientSpace {
                    needed_bytes: need,
                    reclaimed_bytes: reclaimed,
                    available_bytes: self.space.available_bytes(),
                    limit_bytes: self.space.limit_bytes(),
                });
            };
            if let Some(evicted) = self.unregister_victim(victim.ptr, device) {
                reclaimed += evicted.size_bytes;
                victims.push(evicted);
            }
        }
        Ok(())
    }

    /// Drops a victim already taken off the queue from the registry and
    /// returns its bytes to the budget.
    fn unregister_victim(
        &mut self,
        ptr: DevicePtr,
        device: &dyn DeviceMemory,
    ) -> Option<EvictedEntry> {
        let Some(registered) = self.registry.unregister(ptr) else {
            tracing::error!(%ptr, "queued pointer missing from registry");
            return None;
        };
        let size_bytes = device.size_of(ptr).unwrap_or_else(|e| {
            tracing::warn!(%ptr, error = %e, "cannot size evicted pointer; accounting 0 bytes");
            0
        });
        self.space.release(size_bytes);
        self.removals.remember(registered.entry.key.clone());
        self.stats.record_eviction(size_bytes);
        Some(EvictedEntry {
            ptr,
            key: registered.entry.key,
            size_bytes,
        })
    }

    fn clear(&mut self) {
        self.liveness.clear();
        self.registry.clear();
        self.queue.clear();
        self.space.reset();
        self.removals.clear();
    }
}

/// The device-memory eviction core of a lineage cache.
///
/// One instance per accelerator context, shared by reference (or `Arc`)
/// between the foreground threads that use cached values and the
/// [`BackgroundEvictor`](crate::BackgroundEvictor).
///
/// # Example
/// ```
/// use device_memory::{ByteSize, SimulatedDevice};
/// use lineage_cache::{CacheConfig, CacheEntry, DeviceCache, NoUpstream};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let device = Arc::new(SimulatedDevice::new(ByteSize::from_mb(10)));
/// let cache = DeviceCache::init(CacheConfig::default(), device.clone(), Arc::new(NoUpstream)).unwrap();
///
/// let ptr = device.allocate(1024 * 1024).unwrap();
/// cache.admit(CacheEntry::device("tsmm(X)", ptr, Duration::from_millis(20))).unwrap();
/// assert!(cache.probe_live(ptr));
///
/// cache.release(ptr).unwrap();
/// assert!(!cache.probe_live(ptr));
/// assert_eq!(cache.num_cached(), 1);
/// ```
pub struct DeviceCache {
    state: Mutex<CacheState>,
    device: Arc<dyn DeviceMemory>,
    upstream: Arc<dyn ResultTable>,
    config: CacheConfig,
}

impl DeviceCache {
    /// Creates the cache for one device. The byte limit is fixed here as
    /// `config.cache_fraction` of the device's memory pool.
    pub fn init(
        config: CacheConfig,
        device: Arc<dyn DeviceMemory>,
        upstream: Arc<dyn ResultTable>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        let pool = device.total_memory_pool();
        let space = SpaceAccountant::from_pool(pool, config.cache_fraction)?;
        tracing::info!(
            pool_bytes = pool,
            limit_bytes = space.limit_bytes(),
            policy = config.policy.name(),
            "device lineage cache initialised"
        );

        let state = CacheState {
            liveness: LivenessTable::default(),
            registry: EntryRegistry::default(),
            queue: EvictionQueue::default(),
            space,
            bandwidth: BandwidthEstimator::new(config.d2h_initial_mbps, config.d2h_max_mbps),
            removals: RemovalList::with_capacity(config.removal_list_capacity),
            cost: CostModel::new(config.resolve_weights()),
            stats: EvictionStats::default(),
            closed: false,
        };

        Ok(Self {
            state: Mutex::new(state),
            device,
            upstream,
            config,
        })
    }

    /// Re-derives the byte limit as `fraction` of the device pool.
    ///
    /// Meant to be called once at startup; the running total is kept.
    pub fn configure_limit(&self, fraction: f64) -> Result<usize, CacheError> {
        let limit = limit_for(self.device.total_memory_pool(), fraction)?;
        let mut state = self.state.lock();
        let current = state.space.current_bytes();
        state.space = SpaceAccountant::new(limit);
        state.space.reserve(current);
        tracing::info!(fraction, limit_bytes = limit, "device cache limit configured");
        Ok(limit)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ── Admission ───────────────────────────────────────────────

    /// Returns the pointer of a cacheable entry, `None` for placeholders.
    fn cacheable_ptr(&self, entry: &CacheEntry) -> Result<Option<DevicePtr>, CacheError> {
        match entry.value {
            EntryValue::Device(ptr) => Ok(Some(ptr)),
            EntryValue::Placeholder => {
                self.state.lock().stats.record_placeholder();
                Ok(None)
            }
            EntryValue::Scalar(_) => {
                tracing::error!(key = %entry.key, "attempted to cache a scalar on the device");
                Err(CacheError::ScalarAdmission {
                    key: entry.key.clone(),
                })
            }
        }
    }

    /// Adds a device entry, live with one user.
    ///
    /// Space is not accounted here; callers that manage the budget
    /// themselves pair this with [`make_space`](Self::make_space) and
    /// [`reserve_bytes`](Self::reserve_bytes). [`admit`](Self::admit) does
    /// all three at once.
    pub fn add_entry(&self, entry: CacheEntry) -> Result<Admission, CacheError> {
        let Some(ptr) = self.cacheable_ptr(&entry)? else {
            return Ok(Admission::SkippedPlaceholder);
        };
        let size_bytes = self.device.size_of(ptr)?;

        let mut state = self.state.lock();
        if state.closed {
            return Err(CacheError::Closed);
        }
        let score = state.insert_live(entry, ptr, size_bytes)?;
        Ok(Admission::Admitted { ptr, score })
    }

    /// Evicts as needed, reserves the entry's bytes and adds it live, as one
    /// step with respect to other cache operations.
    ///
    /// Fails with [`CacheError::InsufficientSpace`] when the free entries
    /// cannot make room; entries already evicted by the attempt stay evicted.
    pub fn admit(&self, entry: CacheEntry) -> Result<Admission, CacheError> {
        let Some(ptr) = self.cacheable_ptr(&entry)? else {
            return Ok(Admission::SkippedPlaceholder);
        };
        let size_bytes = self.device.size_of(ptr)?;
        let key = entry.key.clone();

        let mut victims = Vec::new();
        let outcome = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(CacheError::Closed);
            }
            if let Some(existing) = state.registry.get(ptr) {
                return Err(CacheError::DuplicatePointer {
                    ptr,
                    key: existing.entry.key.clone(),
                });
            }

            let fits = if size_bytes > state.space.limit_bytes() {
                Err(CacheError::InsufficientSpace {
                    needed_bytes: size_bytes,
                    reclaimed_bytes: 0,
                    available_bytes: state.space.available_bytes(),
                    limit_bytes: state.space.limit_bytes(),
                })
            } else {
                state.evict_until_headroom(size_bytes, &*self.device, &mut victims)
            };

            match fits {
                Ok(()) => {
                    state.space.reserve(size_bytes);
                    let current = state.space.current_bytes();
                    state.stats.update_peak(current);
                    state.insert_live(entry, ptr, size_bytes)
                }
                Err(e) => {
                    state.stats.record_failed_admission();
                    Err(e)
                }
            }
        };

        self.finish_evictions(victims);
        match outcome {
            Ok(score) => Ok(Admission::Admitted { ptr, score }),
            Err(e) => {
                tracing::warn!(%key, %ptr, size_bytes, error = %e, "device cache admission failed");
                Err(e)
            }
        }
    }

    // ── Liveness ────────────────────────────────────────────────

    /// Adds a user to a cached pointer, returning the new count. A pointer
    /// that was free leaves the eviction queue.
    pub fn mark_in_use(&self, ptr: DevicePtr) -> Result<u32, CacheError> {
        let mut state = self.state.lock();
        if !state.registry.contains(ptr) {
            return Err(CacheError::NotCached { ptr });
        }
        let count = state.liveness.increment(ptr);
        if count == 1 {
            state.queue.remove(ptr);
        }
        tracing::trace!(%ptr, count, "marked in use");
        Ok(count)
    }

    /// Removes a user from a live pointer, returning the remaining count.
    /// At zero the pointer becomes free and evictable.
    ///
    /// Releasing a pointer that is not live is a caller defect and fails
    /// with [`CacheError::UnknownLiveness`] without changing anything.
    pub fn release(&self, ptr: DevicePtr) -> Result<u32, CacheError> {
        let mut state = self.state.lock();
        let remaining = state.liveness.decrement(ptr).map_err(|e| {
            tracing::error!(%ptr, "release of a pointer with no recorded liveness");
            e
        })?;
        if remaining == 0 {
            if let Some(victim) = state.victim_for(ptr) {
                state.queue.insert(victim);
            }
        }
        tracing::trace!(%ptr, remaining, "released");
        Ok(remaining)
    }

    /// Releases a batch of pointers under one lock. A pointer may appear
    /// more than once. Either every release applies or none does.
    pub fn release_all(&self, ptrs: &[DevicePtr]) -> Result<usize, CacheError> {
        let mut wanted: HashMap<DevicePtr, u32> = HashMap::new();
        for ptr in ptrs {
            *wanted.entry(*ptr).or_insert(0) += 1;
        }

        let mut state = self.state.lock();
        for (ptr, n) in &wanted {
            if state.liveness.count(*ptr).unwrap_or(0) < *n {
                tracing::error!(%ptr, "batch release exceeds recorded liveness");
                return Err(CacheError::UnknownLiveness { ptr: *ptr });
            }
        }

        let mut freed = Vec::new();
        for (ptr, n) in wanted {
            for _ in 0..n {
                if state.liveness.decrement(ptr)? == 0 {
                    freed.extend(state.victim_for(ptr));
                }
            }
        }
        let count = freed.len();
        state.queue.insert_all(freed);
        Ok(count)
    }

    /// Whether `ptr` currently has active users.
    pub fn probe_live(&self, ptr: DevicePtr) -> bool {
        self.state.lock().liveness.is_live(ptr)
    }

    pub fn live_count(&self, ptr: DevicePtr) -> Option<u32> {
        self.state.lock().liveness.count(ptr)
    }

    /// Marks `ptr` in use and returns a guard that releases it on drop.
    pub fn acquire(&self, ptr: DevicePtr) -> Result<LiveGuard<'_>, CacheError> {
        self.mark_in_use(ptr)?;
        Ok(LiveGuard::new(self, ptr))
    }

    // ── Removal & eviction ──────────────────────────────────────

    /// Explicitly invalidates a free entry, e.g. when its value is
    /// overwritten. Returns the bytes released from the budget, or `None`
    /// if the entry was not cached. Device memory is not freed; it stays
    /// with whoever holds the value.
    pub fn remove_entry(&self, entry: &CacheEntry) -> Result<Option<usize>, CacheError> {
        let Some(ptr) = entry.device_ptr() else {
            return Ok(None);
        };

        let removed = {
            let mut state = self.state.lock();
            if let Some(count) = state.liveness.count(ptr) {
                return Err(CacheError::EntryLive { ptr, count });
            }
            if !state.registry.contains(ptr) {
                return Ok(None);
            }
            let size_bytes = self.device.size_of(ptr)?;
            state.queue.remove(ptr);
            let removed = state.registry.unregister(ptr);
            state.space.release(size_bytes);
            state.stats.record_removal();
            removed.map(|r| (r.entry.key, size_bytes))
        };

        Ok(removed.map(|(key, size_bytes)| {
            tracing::debug!(%key, %ptr, size_bytes, "entry removed from device cache");
            self.upstream.invalidate(&key);
            size_bytes
        }))
    }

    /// Evicts free entries, lowest score first, until `need` more bytes fit
    /// under the limit.
    pub fn make_space(&self, need: usize) -> Result<EvictionReport, CacheError> {
        self.drive_eviction(need, true)
    }

    pub(crate) fn drive_eviction(
        &self,
        need: usize,
        counts_as_admission: bool,
    ) -> Result<EvictionReport, CacheError> {
        let mut victims = Vec::new();
        let outcome = {
            let mut state = self.state.lock();
            let outcome = state.evict_until_headroom(need, &*self.device, &mut victims);
            if outcome.is_err() && counts_as_admission {
                state.stats.record_failed_admission();
            }
            outcome
        };
        let report = self.finish_evictions(victims);
        outcome.map(|()| report)
    }

    /// Invalidates upstream and frees on the device. Runs without the lock.
    fn finish_evictions(&self, victims: Vec<EvictedEntry>) -> EvictionReport {
        for victim in &victims {
            self.upstream.invalidate(&victim.key);
            if let Err(e) = self.device.free(victim.ptr) {
                tracing::error!(ptr = %victim.ptr, error = %e, "device free failed for evicted entry");
            }
            tracing::debug!(
                key = %victim.key,
                ptr = %victim.ptr,
                size_bytes = victim.size_bytes,
                "entry evicted from device cache"
            );
        }
        EvictionReport { evicted: victims }
    }

    /// The free entry that would be evicted next.
    pub fn peek_victim(&self) -> Option<RegisteredEntry> {
        let state = self.state.lock();
        let victim = state.queue.peek_victim()?;
        state.registry.get(victim.ptr).cloned()
    }

    pub fn lookup(&self, ptr: DevicePtr) -> Option<RegisteredEntry> {
        self.state.lock().registry.get(ptr).cloned()
    }

    /// Counts a miss on a key that was previously evicted, raising the score
    /// it gets if admitted again. Returns false for keys never evicted.
    pub fn record_miss(&self, key: &LineageKey) -> bool {
        self.state.lock().removals.record_miss(key)
    }

    /// Number of evicted keys currently remembered for miss counting.
    pub fn removal_list_len(&self) -> usize {
        self.state.lock().removals.len()
    }

    // ── Space ───────────────────────────────────────────────────

    /// Adds `bytes` to the accounted cache size.
    pub fn reserve_bytes(&self, bytes: usize) {
        let mut state = self.state.lock();
        state.space.reserve(bytes);
        let current = state.space.current_bytes();
        state.stats.update_peak(current);
    }

    /// Subtracts `bytes` from the accounted cache size.
    pub fn release_bytes(&self, bytes: usize) {
        self.state.lock().space.release(bytes);
    }

    pub fn has_headroom(&self, bytes: usize) -> bool {
        self.state.lock().space.has_headroom(bytes)
    }

    pub fn current_size(&self) -> usize {
        self.state.lock().space.current_bytes()
    }

    pub fn limit_bytes(&self) -> usize {
        self.state.lock().space.limit_bytes()
    }

    /// Recomputes the cached bytes from the device's allocation sizes of
    /// every live and free pointer. An audit query, not the hot path.
    pub fn total_resident(&self) -> Result<usize, CacheError> {
        let state = self.state.lock();
        let live = state.liveness.pointers();
        let free = state.queue.iter().map(|v| v.ptr);
        let total = live
            .chain(free)
            .try_fold(0usize, |total, ptr| -> Result<usize, CacheError> {
                Ok(total + self.device.size_of(ptr)?)
            });
        total
    }

    // ── Bandwidth ───────────────────────────────────────────────

    /// Feeds a measured device-to-host copy into the bandwidth estimate.
    pub fn record_transfer(&self, size_bytes: usize, elapsed: Duration) -> TransferSample {
        let mut state = self.state.lock();
        let sample = state.bandwidth.record_transfer(size_bytes, elapsed);
        state
            .stats
            .record_sample(matches!(sample, TransferSample::Accepted { .. }));
        sample
    }

    pub fn bandwidth_mbps(&self) -> f64 {
        self.state.lock().bandwidth.estimate_mbps()
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Number of cached device entries, live and free.
    pub fn num_cached(&self) -> usize {
        let state = self.state.lock();
        state.liveness.len() + state.queue.len()
    }

    /// Whether nothing is evictable. Live entries may still be cached;
    /// `num_cached() == 0` asks whether the cache holds anything at all.
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn num_live(&self) -> usize {
        self.state.lock().liveness.len()
    }

    /// Number of free entries eligible for eviction.
    pub fn num_evictable(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Every cached pointer, live and free.
    pub fn cached_pointers(&self) -> HashSet<DevicePtr> {
        let state = self.state.lock();
        let pointers = state
            .liveness
            .pointers()
            .chain(state.queue.iter().map(|v| v.ptr))
            .collect();
        pointers
    }

    pub fn stats(&self) -> EvictionStats {
        self.state.lock().stats.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Verifies that every registered pointer is either live or queued, never
    /// both, and that nothing live or queued is unregistered.
    pub fn check_consistency(&self) -> Result<(), CacheError> {
        let state = self.state.lock();
        for reg in state.registry.iter() {
            let live = state.liveness.is_live(reg.ptr);
            let queued = state.queue.contains(reg.ptr);
            if live == queued {
                return Err(CacheError::Inconsistent(format!(
                    "{} is live={live} queued={queued}",
                    reg.ptr
                )));
            }
        }
        let orphan = state
            .liveness
            .pointers()
            .chain(state.queue.iter().map(|v| v.ptr))
            .find(|ptr| !state.registry.contains(*ptr));
        if let Some(ptr) = orphan {
            return Err(CacheError::Inconsistent(format!("{ptr} is not registered")));
        }
        Ok(())
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Forgets every entry and statistic and restarts the recency clock.
    /// Device memory is not freed; the limit is kept.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.clear();
        state.stats = EvictionStats::default();
        state.cost.restart();
        state.closed = false;
        tracing::info!("device lineage cache reset");
    }

    /// Evicts and frees every free entry and refuses further admissions.
    /// Live entries stay until their users release them.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut victims = Vec::new();
        let still_live = {
            let mut state = self.state.lock();
            state.closed = true;
            while let Some(victim) = state.queue.pop_victim() {
                victims.extend(state.unregister_victim(victim.ptr, &*self.device));
            }
            state.liveness.len()
        };
        let released = self.finish_evictions(victims);
        tracing::info!(
            released = released.len(),
            still_live,
            "device lineage cache shut down"
        );
        ShutdownReport {
            released,
            still_live,
        }
    }
}

impl std::fmt::Debug for DeviceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DeviceCache")
            .field("live", &state.liveness.len())
            .field("free", &state.queue.len())
            .field("current_bytes", &state.space.current_bytes())
            .field("limit_bytes", &state.space.limit_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_memory::{ByteSize, SimulatedDevice};

    fn setup(pool: u64) -> (DeviceCache, Arc<SimulatedDevice>) {
        let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(pool)));
        let config = CacheConfig {
            cache_fraction: 1.0,
            ..Default::default()
        };
        let cache = DeviceCache::init(config, device.clone(), Arc::new(NoUpstream)).unwrap();
        (cache, device)
    }

    #[test]
    fn test_init_derives_limit_from_pool() {
        let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(10_000)));
        let cache = DeviceCache::init(CacheConfig::default(), device, Arc::new(NoUpstream)).unwrap();
        assert_eq!(cache.limit_bytes(), 3000);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_init_rejects_bad_config() {
        let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(10_000)));
        let config = CacheConfig {
            cache_fraction: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            DeviceCache::init(config, device, Arc::new(NoUpstream)),
            Err(CacheError::InvalidFraction(_))
        ));
    }

    #[test]
    fn test_configure_limit_keeps_running_total() {
        let (cache, device) = setup(10_000);
        let ptr = device.allocate(500).unwrap();
        cache.admit(CacheEntry::device("a", ptr, Duration::ZERO)).unwrap();
        assert_eq!(cache.configure_limit(0.25).unwrap(), 2500);
        assert_eq!(cache.limit_bytes(), 2500);
        assert_eq!(cache.current_size(), 500);
        assert!(cache.configure_limit(2.0).is_err());
    }

    #[test]
    fn test_consistency_after_mixed_operations() {
        let (cache, device) = setup(10_000);
        let a = device.allocate(100).unwrap();
        let b = device.allocate(100).unwrap();
        cache.admit(CacheEntry::device("a", a, Duration::ZERO)).unwrap();
        cache.admit(CacheEntry::device("b", b, Duration::ZERO)).unwrap();
        cache.release(a).unwrap();
        cache.mark_in_use(b).unwrap();
        cache.check_consistency().unwrap();
        assert_eq!(cache.num_live(), 1);
        assert_eq!(cache.num_evictable(), 1);
    }

    #[test]
    fn test_duplicate_admission_evicts_nothing() {
        let (cache, device) = setup(1000);
        let a = device.allocate(600).unwrap();
        let b = device.allocate(400).unwrap();
        cache.admit(CacheEntry::device("a", a, Duration::ZERO)).unwrap();
        cache.admit(CacheEntry::device("b", b, Duration::ZERO)).unwrap();
        cache.release(b).unwrap();

        let err = cache.admit(CacheEntry::device("a2", a, Duration::ZERO)).unwrap_err();
        assert!(matches!(err, CacheError::DuplicatePointer { .. }));
        assert_eq!(cache.num_evictable(), 1);
        assert!(device.contains(b));
    }

    #[test]
    fn test_oversized_admission_fails_without_evicting() {
        let (cache, device) = setup(1000);
        let a = device.allocate(300).unwrap();
        cache.admit(CacheEntry::device("a", a, Duration::ZERO)).unwrap();
        cache.release(a).unwrap();
        cache.configure_limit(0.5).unwrap();

        let big = device.allocate(600).unwrap();
        let err = cache.admit(CacheEntry::device("big", big, Duration::ZERO)).unwrap_err();
        assert!(matches!(err, CacheError::InsufficientSpace { reclaimed_bytes: 0, .. }));
        assert_eq!(cache.num_evictable(), 1);
        assert_eq!(cache.stats().failed_admissions, 1);
    }

    #[test]
    fn test_removal_list_stays_bounded() {
        let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(1000)));
        let config = CacheConfig {
            cache_fraction: 0.1,
            removal_list_capacity: 8,
            ..Default::default()
        };
        let cache = DeviceCache::init(config, device.clone(), Arc::new(NoUpstream)).unwrap();
        for i in 0..500 {
            let ptr = device.allocate(100).unwrap();
            cache.admit(CacheEntry::device(format!("k{i}"), ptr, Duration::ZERO)).unwrap();
            cache.release(ptr).unwrap();
        }
        assert_eq!(cache.num_cached(), 1);
        assert_eq!(cache.stats().evictions, 499);
        assert_eq!(cache.removal_list_len(), 8);
        assert!(cache.record_miss(&LineageKey::new("k497")));
        assert!(!cache.record_miss(&LineageKey::new("k0")));
    }

    #[test]
    fn test_debug_format() {
        let (cache, _) = setup(1000);
        let debug = format!("{cache:?}");
        assert!(debug.contains("DeviceCache"));
        assert!(debug.contains("limit_bytes"));
    }
}
