// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! A host-side stand-in for an accelerator memory pool.
//!
//! [`SimulatedDevice`] hands out [`DevicePtr`] handles against a fixed pool
//! size, remembers each block's size, and rejects allocations that would
//! exceed the pool. No host memory backs the blocks; only the bookkeeping is
//! simulated. It is what tests, benchmarks and the simulator binary plug into
//! the cache in place of a real GPU.
//!
//! # Thread Safety
//! `SimulatedDevice` is `Send + Sync`; the block table sits behind a single
//! mutex and the allocated-bytes counter is atomic, so it can be shared as
//! `Arc<SimulatedDevice>`.

use crate::{ByteSize, DeviceError, DeviceMemory, DevicePtr, DeviceStats};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Device allocations are aligned to this many bytes.
const ALIGNMENT: u64 = 256;

/// First address handed out. Zero is never a valid pointer.
const BASE_ADDRESS: u64 = 0x1000;

struct BlockTable {
    blocks: HashMap<DevicePtr, usize>,
    next_addr: u64,
    stats: DeviceStats,
}

/// A simulated device memory pool.
///
/// # Example
/// ```
/// use device_memory::{ByteSize, DeviceMemory, SimulatedDevice};
///
/// let device = SimulatedDevice::new(ByteSize::from_mb(1));
/// let ptr = device.allocate(4096).unwrap();
/// assert_eq!(device.size_of(ptr).unwrap(), 4096);
///
/// device.free(ptr).unwrap();
/// assert_eq!(device.allocated_bytes(), 0);
/// ```
pub struct SimulatedDevice {
    pool: ByteSize,
    allocated_bytes: AtomicUsize,
    table: Mutex<BlockTable>,
}

impl SimulatedDevice {
    /// Creates a device with `pool` bytes of memory.
    pub fn new(pool: ByteSize) -> Self {
        Self {
            pool,
            allocated_bytes: AtomicUsize::new(0),
            table: Mutex::new(BlockTable {
                blocks: HashMap::new(),
                next_addr: BASE_ADDRESS,
                stats: DeviceStats::default(),
            }),
        }
    }

    /// Allocates a block of `size_bytes`.
    ///
    /// Returns `Err(OutOfMemory)` when the pool cannot hold the block.
    pub fn allocate(&self, size_bytes: usize) -> Result<DevicePtr, DeviceError> {
        if size_bytes == 0 {
            return Err(DeviceError::ZeroSizedAllocation);
        }

        let mut table = self.table.lock();
        let pool = self.pool_bytes();
        let current = self.allocated_bytes.load(Ordering::Acquire);
        if current.checked_add(size_bytes).map_or(true, |total| total > pool) {
            table.stats.record_oom();
            return Err(DeviceError::OutOfMemory {
                requested_bytes: size_bytes,
                available_bytes: pool.saturating_sub(current),
                pool_bytes: pool,
            });
        }

        let ptr = DevicePtr::new(table.next_addr);
        let span = (size_bytes as u64).div_ceil(ALIGNMENT) * ALIGNMENT;
        table.next_addr += span;
        table.blocks.insert(ptr, size_bytes);

        let now = self.allocated_bytes.fetch_add(size_bytes, Ordering::AcqRel) + size_bytes;
        table.stats.record_allocation(now);
        tracing::trace!(%ptr, size_bytes, "device block allocated");
        Ok(ptr)
    }

    /// Bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Acquire)
    }

    /// Bytes still available in the pool.
    pub fn available_bytes(&self) -> usize {
        self.pool_bytes().saturating_sub(self.allocated_bytes())
    }

    /// Number of blocks currently allocated.
    pub fn live_blocks(&self) -> usize {
        self.table.lock().blocks.len()
    }

    /// Whether `ptr` names a currently allocated block.
    pub fn contains(&self, ptr: DevicePtr) -> bool {
        self.table.lock().blocks.contains_key(&ptr)
    }

    /// Returns a snapshot of the device statistics.
    pub fn stats(&self) -> DeviceStats {
        self.table.lock().stats.clone()
    }

    fn pool_bytes(&self) -> usize {
        usize::try_from(self.pool.as_bytes()).unwrap_or(usize::MAX)
    }
}

impl DeviceMemory for SimulatedDevice {
    fn size_of(&self, ptr: DevicePtr) -> Result<usize, DeviceError> {
        let mut table = self.table.lock();
        match table.blocks.get(&ptr) {
            Some(size) => Ok(*size),
            None => {
                table.stats.record_unknown_pointer();
                Err(DeviceError::UnknownPointer(ptr))
            }
        }
    }

    fn free(&self, ptr: DevicePtr) -> Result<(), DeviceError> {
        let mut table = self.table.lock();
        let Some(size) = table.blocks.remove(&ptr) else {
            table.stats.record_unknown_pointer();
            return Err(DeviceError::UnknownPointer(ptr));
        };
        self.allocated_bytes.fetch_sub(size, Ordering::AcqRel);
        table.stats.record_free();
        tracing::trace!(%ptr, size, "device block freed");
        Ok(())
    }

    fn total_memory_pool(&self) -> usize {
        self.pool_bytes()
    }
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("pool", &self.pool)
            .field("allocated_bytes", &self.allocated_bytes())
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_free() {
        let device = SimulatedDevice::new(ByteSize::from_mb(1));
        let ptr = device.allocate(1000).unwrap();
        assert_eq!(device.allocated_bytes(), 1000);
        assert_eq!(device.size_of(ptr).unwrap(), 1000);
        assert!(device.contains(ptr));

        device.free(ptr).unwrap();
        assert_eq!(device.allocated_bytes(), 0);
        assert!(!device.contains(ptr));
    }

    #[test]
    fn test_pointers_are_distinct_and_aligned() {
        let device = SimulatedDevice::new(ByteSize::from_mb(1));
        let a = device.allocate(10).unwrap();
        let b = device.allocate(10).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.addr() % ALIGNMENT, 0);
        assert_eq!(b.addr() % ALIGNMENT, 0);
        assert_ne!(a.addr(), 0);
    }

    #[test]
    fn test_oom() {
        let device = SimulatedDevice::new(ByteSize::from_bytes(1024));
        let _a = device.allocate(600).unwrap();
        let result = device.allocate(600);
        assert!(matches!(
            result,
            Err(DeviceError::OutOfMemory { available_bytes: 424, .. })
        ));
        assert_eq!(device.stats().oom_count, 1);
    }

    #[test]
    fn test_oversized_request_is_oom() {
        let device = SimulatedDevice::new(ByteSize::from_bytes(4096));
        device.allocate(1024).unwrap();
        let err = device.allocate(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::OutOfMemory { requested_bytes: usize::MAX, available_bytes: 3072, .. }
        ));
        assert_eq!(device.allocated_bytes(), 1024);
        assert_eq!(device.stats().oom_count, 1);
    }

    #[test]
    fn test_zero_allocation() {
        let device = SimulatedDevice::new(ByteSize::from_mb(1));
        assert!(matches!(
            device.allocate(0),
            Err(DeviceError::ZeroSizedAllocation)
        ));
    }

    #[test]
    fn test_double_free_is_reported() {
        let device = SimulatedDevice::new(ByteSize::from_mb(1));
        let ptr = device.allocate(64).unwrap();
        device.free(ptr).unwrap();
        assert!(matches!(device.free(ptr), Err(DeviceError::UnknownPointer(p)) if p == ptr));
        assert!(device.size_of(ptr).is_err());
        assert_eq!(device.stats().unknown_pointer_count, 2);
    }

    #[test]
    fn test_total_memory_pool() {
        let device = SimulatedDevice::new(ByteSize::from_gb(2));
        assert_eq!(device.total_memory_pool(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_stats_peak_and_outstanding() {
        let device = SimulatedDevice::new(ByteSize::from_mb(1));
        let a = device.allocate(1000).unwrap();
        let _b = device.allocate(2000).unwrap();
        device.free(a).unwrap();

        let stats = device.stats();
        assert_eq!(stats.peak_allocated_bytes, 3000);
        assert_eq!(stats.outstanding(), 1);
        assert_eq!(device.live_blocks(), 1);
    }

    #[test]
    fn test_debug_format() {
        let device = SimulatedDevice::new(ByteSize::from_mb(64));
        let debug = format!("{device:?}");
        assert!(debug.contains("SimulatedDevice"));
        assert!(debug.contains("pool"));
    }
}
