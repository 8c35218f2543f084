// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `lcache-sim simulate` command: drive a randomized workload through the
//! device cache.
//!
//! Each worker produces intermediates of random size and compute cost,
//! admits them, re-uses earlier ones (counting misses on evicted keys), and
//! releases values as its consumers finish. Synthetic device-to-host copies
//! feed the bandwidth estimate, including some implausibly fast ones.

use super::parse_policy;
use device_memory::{ByteSize, DeviceError, DeviceMemory, DevicePtr, SimulatedDevice};
use lineage_cache::{
    BackgroundEvictor, CacheConfig, CacheEntry, CacheError, DeviceCache, LineageKey, NoUpstream,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

const MIN_BLOCK: usize = 64 * 1024;
const MAX_BLOCK: usize = 4 * 1024 * 1024;
/// Values a worker keeps live at once.
const WORKING_SET: usize = 8;
const REUSE_PROBABILITY: f64 = 0.3;
const PLACEHOLDER_PROBABILITY: f64 = 0.02;

pub struct Options {
    pub pool: String,
    pub fraction: Option<f64>,
    pub policy: Option<String>,
    pub entries: usize,
    pub threads: usize,
    pub seed: u64,
    pub background: bool,
    pub json: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerReport {
    produced: usize,
    admitted: usize,
    rejected: usize,
    device_oom: usize,
    reuse_hits: usize,
    reuse_misses: usize,
}

impl WorkerReport {
    fn absorb(&mut self, other: WorkerReport) {
        self.produced += other.produced;
        self.admitted += other.admitted;
        self.rejected += other.rejected;
        self.device_oom += other.device_oom;
        self.reuse_hits += other.reuse_hits;
        self.reuse_misses += other.reuse_misses;
    }

    fn hit_ratio(&self) -> f64 {
        let lookups = self.reuse_hits + self.reuse_misses;
        if lookups == 0 {
            return 0.0;
        }
        self.reuse_hits as f64 / lookups as f64
    }
}

pub async fn execute(mut config: CacheConfig, opts: Options) -> anyhow::Result<()> {
    if let Some(fraction) = opts.fraction {
        config.cache_fraction = fraction;
    }
    if let Some(name) = &opts.policy {
        config.policy = parse_policy(name)?;
        config.weights = None;
    }
    if opts.background {
        config.background.enabled = true;
    }
    config.validate()?;
    anyhow::ensure!(opts.threads > 0, "--threads must be at least 1");

    let pool = ByteSize::parse(&opts.pool)
        .map_err(|e| anyhow::anyhow!("invalid pool size '{}': {e}", opts.pool))?;
    let device = Arc::new(SimulatedDevice::new(pool));
    let cache = Arc::new(DeviceCache::init(
        config.clone(),
        device.clone(),
        Arc::new(NoUpstream),
    )?);

    if !opts.json {
        println!("╔══════════════════════════════════════════════════════╗");
        println!("║          lcache-sim · Device Cache Workload          ║");
        println!("╚══════════════════════════════════════════════════════╝");
        println!();
        println!("  Pool:       {pool}");
        println!(
            "  Cache:      {:.2} MB ({:.0}% of pool)",
            cache.limit_bytes() as f64 / (1024.0 * 1024.0),
            config.cache_fraction * 100.0,
        );
        println!("  Policy:     {}", config.policy.name());
        println!("  Workload:   {} entries on {} threads", opts.entries, opts.threads);
        println!("  Background: {}", config.background.enabled);
        println!();
    }

    let evictor = config
        .background
        .enabled
        .then(|| BackgroundEvictor::spawn(Arc::clone(&cache)));

    // ── Workers ────────────────────────────────────────────────
    let start = Instant::now();
    let mut handles = Vec::with_capacity(opts.threads);
    for worker in 0..opts.threads {
        let count = opts.entries / opts.threads + usize::from(worker < opts.entries % opts.threads);
        let cache = Arc::clone(&cache);
        let device = Arc::clone(&device);
        let seed = opts.seed.wrapping_add(worker as u64);
        handles.push(tokio::task::spawn_blocking(move || {
            run_worker(&cache, &device, worker, count, seed)
        }));
    }

    let mut totals = WorkerReport::default();
    for handle in handles {
        totals.absorb(handle.await??);
    }
    if let Some(evictor) = evictor {
        evictor.stop().await;
    }
    let elapsed = start.elapsed();

    cache.check_consistency()?;
    let stats = cache.stats();
    let cached_entries = cache.num_cached();
    let cached_bytes = cache.current_size();
    let bandwidth = cache.bandwidth_mbps();
    let shutdown = cache.shutdown();
    let device_stats = device.stats();

    if opts.json {
        let out = serde_json::json!({
            "config": {
                "pool_bytes": pool.as_bytes(),
                "limit_bytes": cache.limit_bytes(),
                "policy": config.policy.name(),
                "background": config.background.enabled,
                "entries": opts.entries,
                "threads": opts.threads,
                "seed": opts.seed,
            },
            "workload": {
                "produced": totals.produced,
                "admitted": totals.admitted,
                "rejected": totals.rejected,
                "device_oom": totals.device_oom,
                "reuse_hits": totals.reuse_hits,
                "reuse_misses": totals.reuse_misses,
                "hit_ratio": totals.hit_ratio(),
                "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
            },
            "cache": stats,
            "device": device_stats,
            "final": {
                "cached_entries": cached_entries,
                "cached_bytes": cached_bytes,
                "d2h_estimate_mbps": bandwidth,
                "released_on_shutdown": shutdown.released.len(),
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    // ── Results ────────────────────────────────────────────────
    println!("  {:<24} {:>12}", "Metric", "Value");
    println!("  {}", "-".repeat(38));
    println!("  {:<24} {:>12}", "Produced", totals.produced);
    println!("  {:<24} {:>12}", "Admitted", totals.admitted);
    println!("  {:<24} {:>12}", "Rejected (no space)", totals.rejected);
    println!("  {:<24} {:>12}", "Device OOM", totals.device_oom);
    println!("  {:<24} {:>12}", "Reuse hits", totals.reuse_hits);
    println!("  {:<24} {:>12}", "Reuse misses", totals.reuse_misses);
    println!("  {:<24} {:>11.1}%", "Hit ratio", totals.hit_ratio() * 100.0);
    println!("  {:<24} {:>12}", "Evictions", stats.evictions);
    println!(
        "  {:<24} {:>9.2} KB",
        "Mean eviction",
        stats.mean_eviction_bytes() / 1024.0
    );
    println!("  {:<24} {:>9.1} MB/s", "D2H estimate", bandwidth);
    println!(
        "  {:<24} {:>9.2} ms",
        "Elapsed",
        elapsed.as_secs_f64() * 1000.0
    );
    println!();
    println!("  {}", stats.summary());
    println!("  {}", device_stats.summary());
    println!(
        "  Shutdown: freed {} entries ({:.2} MB), {} still live",
        shutdown.released.len(),
        shutdown.released.reclaimed_bytes() as f64 / (1024.0 * 1024.0),
        shutdown.still_live,
    );
    println!();

    Ok(())
}

fn run_worker(
    cache: &DeviceCache,
    device: &SimulatedDevice,
    worker: usize,
    count: usize,
    seed: u64,
) -> anyhow::Result<WorkerReport> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut report = WorkerReport::default();
    let mut held: Vec<DevicePtr> = Vec::with_capacity(WORKING_SET + 2);
    let mut history: Vec<(LineageKey, DevicePtr)> = Vec::new();

    for i in 0..count {
        if !history.is_empty() && rng.gen_bool(REUSE_PROBABILITY) {
            let (key, ptr) = &history[rng.gen_range(0..history.len())];
            match cache.mark_in_use(*ptr) {
                Ok(_) => {
                    report.reuse_hits += 1;
                    held.push(*ptr);
                }
                Err(CacheError::NotCached { .. }) => {
                    report.reuse_misses += 1;
                    cache.record_miss(key);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let key = LineageKey::from(format!("w{worker}/op{i}"));
        if rng.gen_bool(PLACEHOLDER_PROBABILITY) {
            cache.admit(CacheEntry::placeholder(key.clone()))?;
        }

        let size = rng.gen_range(MIN_BLOCK..=MAX_BLOCK);
        let compute = Duration::from_micros(rng.gen_range(100..200_000));
        let ptr = match device.allocate(size) {
            Ok(ptr) => ptr,
            Err(DeviceError::OutOfMemory { .. }) => {
                report.device_oom += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        report.produced += 1;

        match cache.admit(CacheEntry::device(key.clone(), ptr, compute)) {
            Ok(_) => {
                report.admitted += 1;
                held.push(ptr);
                history.push((key, ptr));
            }
            Err(e) if e.is_resource_exhausted() => {
                report.rejected += 1;
                device.free(ptr)?;
            }
            Err(e) => return Err(e.into()),
        }

        let mbps: f64 = rng.gen_range(200.0..10_000.0);
        let copy_secs = size as f64 / (mbps * 1024.0 * 1024.0);
        cache.record_transfer(size, Duration::from_secs_f64(copy_secs));

        while held.len() > WORKING_SET {
            let victim = held.swap_remove(rng.gen_range(0..held.len()));
            cache.release(victim)?;
        }
    }

    cache.release_all(&held)?;
    tracing::debug!(worker, produced = report.produced, "worker finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_ratio() {
        let mut r = WorkerReport::default();
        assert_eq!(r.hit_ratio(), 0.0);
        r.absorb(WorkerReport {
            reuse_hits: 3,
            reuse_misses: 1,
            ..Default::default()
        });
        assert_eq!(r.hit_ratio(), 0.75);
    }

    #[test]
    fn test_worker_leaves_nothing_live() {
        let device = Arc::new(SimulatedDevice::new(ByteSize::from_mb(64)));
        let cache = DeviceCache::init(CacheConfig::default(), device.clone(), Arc::new(NoUpstream))
            .unwrap();
        let report = run_worker(&cache, &device, 0, 200, 7).unwrap();

        assert_eq!(report.admitted + report.rejected, report.produced);
        assert_eq!(cache.num_live(), 0);
        assert!(cache.current_size() <= cache.limit_bytes());
        assert_eq!(cache.total_resident().unwrap(), cache.current_size());
        cache.check_consistency().unwrap();
    }
}
