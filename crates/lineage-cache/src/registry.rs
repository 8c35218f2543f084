// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device pointer → cache entry metadata.

use crate::{CacheEntry, CacheError, Score};
use device_memory::DevicePtr;
use std::collections::HashMap;

/// A cache entry as held by the registry: the upstream entry plus the score
/// and sequence number fixed at admission.
#[derive(Debug, Clone)]
pub struct RegisteredEntry {
    pub entry: CacheEntry,
    pub ptr: DevicePtr,
    pub score: Score,
    /// Admission order; breaks ties between equal scores.
    pub seq: u64,
}

/// Every device entry the cache currently owns, live or free.
#[derive(Debug, Default)]
pub struct EntryRegistry {
    entries: HashMap<DevicePtr, RegisteredEntry>,
    next_seq: u64,
}

impl EntryRegistry {
    /// Registers `entry` under `ptr`. Each pointer has at most one owner.
    pub fn register(
        &mut self,
        entry: CacheEntry,
        ptr: DevicePtr,
        score: Score,
    ) -> Result<&RegisteredEntry, CacheError> {
        if let Some(existing) = self.entries.get(&ptr) {
            return Err(CacheError::DuplicatePointer {
                ptr,
                key: existing.entry.key.clone(),
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(self.entries.entry(ptr).or_insert(RegisteredEntry {
            entry,
            ptr,
            score,
            seq,
        }))
    }

    pub fn get(&self, ptr: DevicePtr) -> Option<&RegisteredEntry> {
        self.entries.get(&ptr)
    }

    pub fn contains(&self, ptr: DevicePtr) -> bool {
        self.entries.contains_key(&ptr)
    }

    pub fn unregister(&mut self, ptr: DevicePtr) -> Option<RegisteredEntry> {
        self.entries.remove(&ptr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredEntry> {
        self.entries.values()
    }

    /// Drops every entry. Sequence numbers keep counting up.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
