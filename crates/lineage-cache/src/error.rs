// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the device lineage cache.

use crate::LineageKey;
use device_memory::{DeviceError, DevicePtr};

/// Errors returned by [`DeviceCache`](crate::DeviceCache) operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A scalar value was offered for device caching.
    #[error("scalars are never stored on the device (lineage key '{key}')")]
    ScalarAdmission { key: LineageKey },

    /// `release` was called for a pointer that is not live.
    #[error("release of {ptr} which has no recorded liveness")]
    UnknownLiveness { ptr: DevicePtr },

    /// The pointer is not owned by any cache entry.
    #[error("{ptr} is not a cached device pointer")]
    NotCached { ptr: DevicePtr },

    /// The pointer already belongs to another cache entry.
    #[error("{ptr} is already cached under lineage key '{key}'")]
    DuplicatePointer { ptr: DevicePtr, key: LineageKey },

    /// The entry is in use and cannot be removed.
    #[error("{ptr} is live ({count} active users) and cannot be removed")]
    EntryLive { ptr: DevicePtr, count: u32 },

    /// Eviction ran out of free entries before enough space was reclaimed.
    #[error("insufficient device cache space: need {needed_bytes} bytes, reclaimed {reclaimed_bytes}, {available_bytes} available (limit: {limit_bytes})")]
    InsufficientSpace {
        needed_bytes: usize,
        reclaimed_bytes: usize,
        available_bytes: usize,
        limit_bytes: usize,
    },

    /// The cache fraction lies outside `(0, 1]`.
    #[error("invalid cache fraction {0}: expected a value in (0, 1]")]
    InvalidFraction(f64),

    /// The cache has been shut down and admits nothing new.
    #[error("device cache is shut down")]
    Closed,

    /// The device memory manager reported an error.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// The liveness table, registry and queue disagree about an entry.
    #[error("cache state inconsistent: {0}")]
    Inconsistent(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// True for errors that indicate a defect in the caller rather than a
    /// runtime condition: admitting a scalar or releasing a pointer that was
    /// never marked live.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::ScalarAdmission { .. } | Self::UnknownLiveness { .. }
        )
    }

    /// True when the operation failed for lack of cache space.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::InsufficientSpace { .. })
    }
}
