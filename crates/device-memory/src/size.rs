// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Human-readable byte sizes.
//!
//! Device pool capacities and workload sizes are written in configs and on
//! the command line as `"16G"`, `"512MB"` or a raw byte count. [`ByteSize`]
//! parses and prints that notation (binary multiples, case-insensitive).

use crate::DeviceError;
use std::fmt;
use std::str::FromStr;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;
const TIB: u64 = GIB * 1024;

/// Suffix table, longest spellings first so `"MB"` wins over `"B"`.
const SUFFIXES: &[(&str, u64)] = &[
    ("TB", TIB),
    ("GB", GIB),
    ("MB", MIB),
    ("KB", KIB),
    ("T", TIB),
    ("G", GIB),
    ("M", MIB),
    ("K", KIB),
    ("B", 1),
];

/// A byte count with human-readable parsing and display.
///
/// ```
/// use device_memory::ByteSize;
///
/// let s: ByteSize = "2G".parse().unwrap();
/// assert_eq!(s.as_bytes(), 2 * 1024 * 1024 * 1024);
/// assert_eq!(s.to_string(), "2 GB");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ByteSize(u64);

impl ByteSize {
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn from_mb(mb: u64) -> Self {
        Self(mb * MIB)
    }

    pub const fn from_gb(gb: u64) -> Self {
        Self(gb * GIB)
    }

    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    /// Size in (binary) megabytes as a float, the unit bandwidths are quoted in.
    pub fn as_mb_f64(self) -> f64 {
        self.0 as f64 / MIB as f64
    }

    /// Parses `"<number>[suffix]"`, e.g. `"512M"`, `"1gb"`, `"4096"`.
    pub fn parse(input: &str) -> Result<Self, DeviceError> {
        let invalid = |reason: &str| DeviceError::InvalidSize {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, suffix) = trimmed.split_at(split);
        if digits.is_empty() {
            return Err(invalid("expected a number followed by an optional K/M/G/T suffix"));
        }

        let suffix = suffix.trim().to_ascii_uppercase();
        let multiplier = if suffix.is_empty() {
            1
        } else {
            SUFFIXES
                .iter()
                .find(|(name, _)| *name == suffix)
                .map(|(_, m)| *m)
                .ok_or_else(|| invalid("unknown suffix"))?
        };

        let value: u64 = digits.parse().map_err(|_| invalid("number out of range"))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| invalid("size overflows 64 bits"))?;
        Ok(Self(bytes))
    }
}

impl FromStr for ByteSize {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ByteSize {
    type Error = DeviceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ByteSize> for String {
    fn from(size: ByteSize) -> Self {
        size.to_string()
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = [(TIB, "TB"), (GIB, "GB"), (MIB, "MB"), (KIB, "KB")];
        for (unit, name) in units {
            if self.0 >= unit && self.0 % unit == 0 {
                return write!(f, "{} {name}", self.0 / unit);
            }
        }
        write!(f, "{} B", self.0)
    }
}
