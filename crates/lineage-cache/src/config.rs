// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Cache configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! cache_fraction = 0.3
//! policy = "cost-n-size"
//! d2h_initial_mbps = 1024.0
//! d2h_max_mbps = 8192.0
//! removal_list_capacity = 4096
//!
//! [background]
//! enabled = true
//! interval_ms = 50
//! headroom_fraction = 0.1
//! ```

use crate::{CacheError, EvictionPolicy, Weights, DEFAULT_REMOVAL_CAPACITY};
use std::path::Path;

/// Configuration of the device cache core.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Fraction of the device pool the cache may occupy, in `(0, 1]`.
    pub cache_fraction: f64,
    /// Preset score weighting.
    pub policy: EvictionPolicy,
    /// Explicit `[cost, recency]` weights; overrides `policy` when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<[f64; 2]>,
    /// Starting device-to-host bandwidth estimate, MB/s.
    pub d2h_initial_mbps: f64,
    /// Bandwidth samples at or above this (MB/s) are discarded.
    pub d2h_max_mbps: f64,
    /// Evicted lineage keys remembered for miss counting.
    pub removal_list_capacity: usize,
    /// Background evictor settings.
    pub background: BackgroundConfig,
}

/// Settings for the [`BackgroundEvictor`](crate::BackgroundEvictor).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub enabled: bool,
    /// Polling period in milliseconds.
    pub interval_ms: u64,
    /// Fraction of the cache limit the evictor tries to keep free.
    pub headroom_fraction: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_fraction: 0.3,
            policy: EvictionPolicy::default(),
            weights: None,
            d2h_initial_mbps: 1024.0,
            d2h_max_mbps: 8192.0,
            removal_list_capacity: DEFAULT_REMOVAL_CAPACITY,
            background: BackgroundConfig::default(),
        }
    }
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 50,
            headroom_fraction: 0.1,
        }
    }
}

impl CacheConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, CacheError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CacheError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, CacheError> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| CacheError::Config(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, CacheError> {
        toml::to_string_pretty(self)
            .map_err(|e| CacheError::Config(format!("TOML serialise error: {e}")))
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), CacheError> {
        if !(self.cache_fraction > 0.0 && self.cache_fraction <= 1.0) {
            return Err(CacheError::InvalidFraction(self.cache_fraction));
        }
        if !(self.d2h_initial_mbps.is_finite() && self.d2h_initial_mbps > 0.0) {
            return Err(CacheError::Config(format!(
                "d2h_initial_mbps must be positive, got {}",
                self.d2h_initial_mbps
            )));
        }
        if !(self.d2h_max_mbps > self.d2h_initial_mbps) {
            return Err(CacheError::Config(format!(
                "d2h_max_mbps ({}) must exceed d2h_initial_mbps ({})",
                self.d2h_max_mbps, self.d2h_initial_mbps
            )));
        }
        if let Some(w) = self.weights {
            if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
                return Err(CacheError::Config(format!(
                    "weights must be finite and non-negative, got {w:?}"
                )));
            }
        }
        if self.removal_list_capacity == 0 {
            return Err(CacheError::Config("removal_list_capacity must be > 0".into()));
        }
        let bg = &self.background;
        if bg.interval_ms == 0 {
            return Err(CacheError::Config("background.interval_ms must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&bg.headroom_fraction) {
            return Err(CacheError::Config(format!(
                "background.headroom_fraction must be in [0, 1], got {}",
                bg.headroom_fraction
            )));
        }
        Ok(())
    }

    /// The score weights in effect.
    pub fn resolve_weights(&self) -> Weights {
        match self.weights {
            Some([cost, recency]) => Weights { cost, recency },
            None => self.policy.weights(),
        }
    }
}
