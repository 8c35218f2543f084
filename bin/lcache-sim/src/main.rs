// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # lcache-sim
//!
//! Synthetic workload driver for the device lineage cache.
//!
//! ## Usage
//! ```bash
//! # Drive 20k entries through a 30% cache of a 512 MB device on 8 threads
//! lcache-sim simulate --pool 512M --entries 20000 --threads 8
//!
//! # Compare policies with background eviction on
//! lcache-sim simulate --policy lru --background
//!
//! # Print the effective configuration as TOML
//! lcache-sim -c cache.toml config
//! ```

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lcache-sim",
    about = "Synthetic workload driver for the device lineage cache",
    version,
    author
)]
struct Cli {
    /// Path to a TOML cache configuration file.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a randomized admit/use/release workload against a simulated device.
    Simulate {
        /// Simulated device memory pool (e.g., "512M", "2G").
        #[arg(short, long, default_value = "256M")]
        pool: String,

        /// Fraction of the pool the cache may use (overrides the config file).
        #[arg(short, long)]
        fraction: Option<f64>,

        /// Eviction policy: lru, cost-n-size, hybrid (overrides the config file).
        #[arg(long)]
        policy: Option<String>,

        /// Number of intermediates produced across all workers.
        #[arg(short, long, default_value_t = 10_000)]
        entries: usize,

        /// Number of worker threads.
        #[arg(short, long, default_value_t = 4)]
        threads: usize,

        /// Seed for the workload generator.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Run the background evictor alongside the workers.
        #[arg(long)]
        background: bool,

        /// Print the final statistics as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective cache configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            pool,
            fraction,
            policy,
            entries,
            threads,
            seed,
            background,
            json,
        } => {
            let opts = commands::simulate::Options {
                pool,
                fraction,
                policy,
                entries,
                threads,
                seed,
                background,
                json,
            };
            commands::simulate::execute(config, opts).await
        }
        Commands::Config => commands::config::execute(config),
    }
}
