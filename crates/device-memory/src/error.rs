// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the device memory boundary.

use crate::DevicePtr;

/// Errors reported by a [`DeviceMemory`](crate::DeviceMemory) implementation.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The pointer does not name a live allocation on this device.
    #[error("unknown device pointer {0}")]
    UnknownPointer(DevicePtr),

    /// The device pool cannot satisfy the allocation.
    #[error("out of device memory: requested {requested_bytes} bytes, but only {available_bytes} available (pool: {pool_bytes})")]
    OutOfMemory {
        requested_bytes: usize,
        available_bytes: usize,
        pool_bytes: usize,
    },

    /// Attempted to allocate a zero-sized block.
    #[error("cannot allocate zero-sized device block")]
    ZeroSizedAllocation,

    /// A human-readable size string could not be parsed.
    #[error("invalid size '{input}': {reason}")]
    InvalidSize { input: String, reason: String },
}
