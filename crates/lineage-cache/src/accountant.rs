// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Byte budget of the device cache.
//!
//! [`SpaceAccountant`] keeps a running total of cached bytes against a limit
//! derived once from the device pool. It trusts its callers: `reserve` and
//! `release` are driven by whoever admits or evicts, and the total is never
//! recomputed from the registry on the hot path.

use crate::CacheError;

#[derive(Debug, Clone)]
pub struct SpaceAccountant {
    current_bytes: usize,
    limit_bytes: usize,
}

impl SpaceAccountant {
    /// An accountant with an explicit byte limit.
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            current_bytes: 0,
            limit_bytes,
        }
    }

    /// An accountant allowed to use `fraction` of a pool of `pool_bytes`.
    pub fn from_pool(pool_bytes: usize, fraction: f64) -> Result<Self, CacheError> {
        Ok(Self::new(limit_for(pool_bytes, fraction)?))
    }

    /// Adds `bytes` to the cached total.
    pub fn reserve(&mut self, bytes: usize) {
        self.current_bytes = self.current_bytes.saturating_add(bytes);
    }

    /// Subtracts `bytes` from the cached total.
    pub fn release(&mut self, bytes: usize) {
        if bytes > self.current_bytes {
            tracing::warn!(
                bytes,
                current = self.current_bytes,
                "released more bytes than are accounted for; clamping to zero"
            );
        }
        self.current_bytes = self.current_bytes.saturating_sub(bytes);
    }

    /// Whether `bytes` more would still fit under the limit.
    pub fn has_headroom(&self, bytes: usize) -> bool {
        bytes
            .checked_add(self.current_bytes)
            .is_some_and(|total| total <= self.limit_bytes)
    }

    pub fn current_bytes(&self) -> usize {
        self.current_bytes
    }

    pub fn limit_bytes(&self) -> usize {
        self.limit_bytes
    }

    pub fn available_bytes(&self) -> usize {
        self.limit_bytes.saturating_sub(self.current_bytes)
    }

    /// Clears the running total. The limit is kept.
    pub fn reset(&mut self) {
        self.current_bytes = 0;
    }
}

/// `fraction` of `pool_bytes`, truncated to whole bytes.
pub(crate) fn limit_for(pool_bytes: usize, fraction: f64) -> Result<usize, CacheError> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(CacheError::InvalidFraction(fraction));
    }
    Ok((pool_bytes as f64 * fraction) as usize)
}
