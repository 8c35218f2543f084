// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Active-use reference counts for cached device pointers.
//!
//! A pointer is *live* while it has an entry here (count ≥ 1). A count never
//! drops to zero in place: the decrement that would reach zero removes the
//! pointer instead, so "absent" and "free" mean the same thing.

use crate::CacheError;
use device_memory::DevicePtr;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct LivenessTable {
    counts: HashMap<DevicePtr, u32>,
}

impl LivenessTable {
    /// Adds one user to `ptr`, returning the new count. A result of 1 means
    /// the pointer just became live.
    pub fn increment(&mut self, ptr: DevicePtr) -> u32 {
        let count = self.counts.entry(ptr).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Removes one user from `ptr`, returning the remaining count. At zero
    /// the pointer is dropped from the table.
    ///
    /// Fails with [`CacheError::UnknownLiveness`] if `ptr` is not live; the
    /// table is left untouched in that case.
    pub fn decrement(&mut self, ptr: DevicePtr) -> Result<u32, CacheError> {
        let count = self
            .counts
            .get_mut(&ptr)
            .ok_or(CacheError::UnknownLiveness { ptr })?;
        if *count == 1 {
            self.counts.remove(&ptr);
            return Ok(0);
        }
        *count -= 1;
        Ok(*count)
    }

    pub fn count(&self, ptr: DevicePtr) -> Option<u32> {
        self.counts.get(&ptr).copied()
    }

    pub fn is_live(&self, ptr: DevicePtr) -> bool {
        self.counts.contains_key(&ptr)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn pointers(&self) -> impl Iterator<Item = DevicePtr> + '_ {
        self.counts.keys().copied()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_from_absent() {
        let mut t = LivenessTable::default();
        let p = DevicePtr::new(1);
        assert!(!t.is_live(p));
        assert_eq!(t.count(p), None);
        assert_eq!(t.increment(p), 1);
        assert_eq!(t.increment(p), 2);
        assert!(t.is_live(p));
    }

    #[test]
    fn test_decrement_to_zero_removes() {
        let mut t = LivenessTable::default();
        let p = DevicePtr::new(1);
        t.increment(p);
        t.increment(p);
        assert_eq!(t.decrement(p).unwrap(), 1);
        assert_eq!(t.decrement(p).unwrap(), 0);
        assert!(!t.is_live(p));
        assert!(t.is_empty());
    }

    #[test]
    fn test_decrement_unknown_is_an_error() {
        let mut t = LivenessTable::default();
        let p = DevicePtr::new(9);
        let err = t.decrement(p).unwrap_err();
        assert!(matches!(err, CacheError::UnknownLiveness { ptr } if ptr == p));
        assert!(t.is_empty());
    }

    #[test]
    fn test_pointers_and_clear() {
        let mut t = LivenessTable::default();
        t.increment(DevicePtr::new(1));
        t.increment(DevicePtr::new(2));
        let mut ptrs: Vec<_> = t.pointers().collect();
        ptrs.sort();
        assert_eq!(ptrs, vec![DevicePtr::new(1), DevicePtr::new(2)]);
        t.clear();
        assert_eq!(t.len(), 0);
    }
}
