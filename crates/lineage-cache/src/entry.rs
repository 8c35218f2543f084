// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cache entries as handed over by the upstream lineage cache.

use device_memory::DevicePtr;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifier of the lineage trace that produced a value.
///
/// Cloning is cheap; the key text is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineageKey(Arc<str>);

impl LineageKey {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LineageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineageKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for LineageKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

/// What a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryValue {
    /// Stand-in for a computation still in flight. Holds no device memory.
    Placeholder,
    /// A scalar result. Lives on the host only.
    Scalar(f64),
    /// A result resident in device memory.
    Device(DevicePtr),
}

/// One computation result offered to the device cache.
///
/// The entry's size is not stored here; it is always read from the device
/// memory manager. Its eviction score is assigned by the cache on admission.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: LineageKey,
    pub value: EntryValue,
    /// Time it took to compute the value, i.e. what a cache hit saves.
    pub compute_time: Duration,
}

impl CacheEntry {
    /// An entry for a device-resident result.
    pub fn device(key: impl Into<LineageKey>, ptr: DevicePtr, compute_time: Duration) -> Self {
        Self {
            key: key.into(),
            value: EntryValue::Device(ptr),
            compute_time,
        }
    }

    pub fn placeholder(key: impl Into<LineageKey>) -> Self {
        Self {
            key: key.into(),
            value: EntryValue::Placeholder,
            compute_time: Duration::ZERO,
        }
    }

    pub fn scalar(key: impl Into<LineageKey>, value: f64, compute_time: Duration) -> Self {
        Self {
            key: key.into(),
            value: EntryValue::Scalar(value),
            compute_time,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.value, EntryValue::Placeholder)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.value, EntryValue::Scalar(_))
    }

    /// The device pointer, for device-resident entries.
    pub fn device_ptr(&self) -> Option<DevicePtr> {
        match self.value {
            EntryValue::Device(ptr) => Some(ptr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let ptr = DevicePtr::new(0x1000);
        let e = CacheEntry::device("ba+*(A,B)", ptr, Duration::from_millis(3));
        assert_eq!(e.device_ptr(), Some(ptr));
        assert!(!e.is_placeholder());
        assert!(!e.is_scalar());

        let p = CacheEntry::placeholder("rand(10,10)");
        assert!(p.is_placeholder());
        assert_eq!(p.device_ptr(), None);

        let s = CacheEntry::scalar("sum(A)", 4.0, Duration::ZERO);
        assert!(s.is_scalar());
        assert_eq!(s.device_ptr(), None);
    }

    #[test]
    fn test_key_clone_shares_text() {
        let k = LineageKey::new("tsmm(X)");
        let k2 = k.clone();
        assert_eq!(k, k2);
        assert_eq!(k2.as_str(), "tsmm(X)");
        assert_eq!(format!("{k}"), "tsmm(X)");
    }
}
