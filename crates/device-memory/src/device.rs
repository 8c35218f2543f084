// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The allocator boundary the cache core talks to.

use crate::{DeviceError, DevicePtr};

/// Queries and releases accelerator allocations.
///
/// The cache never allocates through this trait; values are materialised on
/// the device by whoever computes them. It only asks how large a block is,
/// frees blocks it has evicted, and reads the pool size once at startup.
pub trait DeviceMemory: Send + Sync {
    /// Size in bytes of the allocation behind `ptr`.
    fn size_of(&self, ptr: DevicePtr) -> Result<usize, DeviceError>;

    /// Releases the allocation behind `ptr`.
    fn free(&self, ptr: DevicePtr) -> Result<(), DeviceError>;

    /// Total bytes in the device memory pool.
    fn total_memory_pool(&self) -> usize;
}
