// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The ordered set of free, evictable entries.
//!
//! Entries are ordered by `(score, seq)`: the lowest score goes first and
//! the admission sequence breaks ties, so the order is total and
//! deterministic. A side index from pointer to position makes arbitrary
//! removal `O(log n)`.

use crate::Score;
use device_memory::DevicePtr;
use std::collections::{BTreeSet, HashMap};

/// A queue position. Field order defines the eviction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Victim {
    pub score: Score,
    pub seq: u64,
    pub ptr: DevicePtr,
}

#[derive(Debug, Default)]
pub struct EvictionQueue {
    order: BTreeSet<Victim>,
    index: HashMap<DevicePtr, Victim>,
}

impl EvictionQueue {
    /// Inserts a free entry. Re-inserting a pointer replaces its position.
    pub fn insert(&mut self, victim: Victim) {
        if let Some(previous) = self.index.insert(victim.ptr, victim) {
            self.order.remove(&previous);
        }
        self.order.insert(victim);
    }

    /// Inserts a batch; same result as inserting one at a time.
    pub fn insert_all(&mut self, victims: impl IntoIterator<Item = Victim>) {
        for victim in victims {
            self.insert(victim);
        }
    }

    /// Removes `ptr` if queued.
    pub fn remove(&mut self, ptr: DevicePtr) -> Option<Victim> {
        let victim = self.index.remove(&ptr)?;
        self.order.remove(&victim);
        Some(victim)
    }

    /// The lowest-scored free entry, left in place.
    pub fn peek_victim(&self) -> Option<&Victim> {
        self.order.first()
    }

    /// Removes and returns the lowest-scored free entry.
    pub fn pop_victim(&mut self) -> Option<Victim> {
        let victim = self.order.pop_first()?;
        self.index.remove(&victim.ptr);
        Some(victim)
    }

    pub fn contains(&self, ptr: DevicePtr) -> bool {
        self.index.contains_key(&ptr)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queued entries in eviction order.
    pub fn iter(&self) -> impl Iterator<Item = &Victim> {
        self.order.iter()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn victim(score: f64, seq: u64, addr: u64) -> Victim {
        Victim {
            score: Score::new(score),
            seq,
            ptr: DevicePtr::new(addr),
        }
    }

    #[test]
    fn test_pop_in_score_order() {
        let mut q = EvictionQueue::default();
        q.insert(victim(3.0, 0, 0x10));
        q.insert(victim(1.0, 1, 0x20));
        q.insert(victim(2.0, 2, 0x30));

        assert_eq!(q.peek_victim().unwrap().ptr, DevicePtr::new(0x20));
        let order: Vec<_> = std::iter::from_fn(|| q.pop_victim()).map(|v| v.ptr.addr()).collect();
        assert_eq!(order, vec![0x20, 0x30, 0x10]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_ties_broken_by_seq() {
        let mut q = EvictionQueue::default();
        q.insert(victim(1.0, 7, 0x10));
        q.insert(victim(1.0, 2, 0x20));
        assert_eq!(q.pop_victim().unwrap().seq, 2);
        assert_eq!(q.pop_victim().unwrap().seq, 7);
    }

    #[test]
    fn test_remove_arbitrary() {
        let mut q = EvictionQueue::default();
        q.insert(victim(1.0, 0, 0x10));
        q.insert(victim(2.0, 1, 0x20));
        assert!(q.remove(DevicePtr::new(0x10)).is_some());
        assert!(q.remove(DevicePtr::new(0x10)).is_none());
        assert!(!q.contains(DevicePtr::new(0x10)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek_victim().unwrap().ptr, DevicePtr::new(0x20));
    }

    #[test]
    fn test_reinsert_replaces_position() {
        let mut q = EvictionQueue::default();
        q.insert(victim(5.0, 0, 0x10));
        q.insert(victim(1.0, 0, 0x10));
        assert_eq!(q.len(), 1);
        assert_eq!(q.peek_victim().unwrap().score, Score::new(1.0));
    }

    #[test]
    fn test_insert_all_matches_single_inserts() {
        let batch = vec![victim(4.0, 0, 1), victim(2.0, 1, 2), victim(9.0, 2, 3)];

        let mut bulk = EvictionQueue::default();
        bulk.insert_all(batch.clone());

        let mut single = EvictionQueue::default();
        for v in batch {
            single.insert(v);
        }

        let a: Vec<_> = bulk.iter().copied().collect();
        let b: Vec<_> = single.iter().copied().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_queue() {
        let mut q = EvictionQueue::default();
        assert!(q.peek_victim().is_none());
        assert!(q.pop_victim().is_none());
        q.insert(victim(1.0, 0, 1));
        q.clear();
        assert!(q.is_empty());
        assert!(!q.contains(DevicePtr::new(1)));
    }
}
