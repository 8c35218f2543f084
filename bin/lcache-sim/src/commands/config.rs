// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `lcache-sim config` command: print the effective configuration.

use lineage_cache::CacheConfig;

pub fn execute(config: CacheConfig) -> anyhow::Result<()> {
    let weights = config.resolve_weights();
    println!(
        "# policy {} (cost weight {}, recency weight {})",
        config.policy.name(),
        weights.cost,
        weights.recency,
    );
    print!("{}", config.to_toml()?);
    Ok(())
}
