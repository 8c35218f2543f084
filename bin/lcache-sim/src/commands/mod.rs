// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared setup.

pub mod config;
pub mod simulate;

use lineage_cache::{CacheConfig, EvictionPolicy};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Loads the config file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<CacheConfig> {
    match path {
        Some(p) => {
            let config = CacheConfig::from_file(p)?;
            tracing::info!(path = %p.display(), "loaded cache configuration");
            Ok(config)
        }
        None => Ok(CacheConfig::default()),
    }
}

pub fn parse_policy(name: &str) -> anyhow::Result<EvictionPolicy> {
    match name.trim().to_lowercase().as_str() {
        "lru" => Ok(EvictionPolicy::Lru),
        "cost-n-size" | "costnsize" => Ok(EvictionPolicy::CostNSize),
        "hybrid" => Ok(EvictionPolicy::Hybrid),
        other => anyhow::bail!(
            "unknown eviction policy '{other}' (expected lru, cost-n-size or hybrid)"
        ),
    }
}
