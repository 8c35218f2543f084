// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for admission, eviction and liveness transitions.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use device_memory::{ByteSize, DevicePtr, SimulatedDevice};
use lineage_cache::{CacheConfig, CacheEntry, DeviceCache, NoUpstream};
use std::sync::Arc;
use std::time::Duration;

const BLOCK: usize = 4096;

fn cache(slots: usize) -> (DeviceCache, Arc<SimulatedDevice>) {
    // Pool sized so the cache (half of it) holds exactly `slots` blocks.
    let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes((2 * slots * BLOCK) as u64)));
    let config = CacheConfig {
        cache_fraction: 0.5,
        ..Default::default()
    };
    let cache = DeviceCache::init(config, device.clone(), Arc::new(NoUpstream)).unwrap();
    (cache, device)
}

fn fill_free(cache: &DeviceCache, device: &SimulatedDevice, n: usize) -> Vec<DevicePtr> {
    (0..n)
        .map(|i| {
            let ptr = device.allocate(BLOCK).unwrap();
            let compute = Duration::from_micros((i * 7919 % 1000) as u64);
            cache.admit(CacheEntry::device(format!("k{i}"), ptr, compute)).unwrap();
            cache.release(ptr).unwrap();
            ptr
        })
        .collect()
}

fn bench_admit_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("admit_evicting");
    for slots in [64usize, 1024, 16_384] {
        group.bench_with_input(BenchmarkId::from_parameter(slots), &slots, |b, &slots| {
            let (cache, device) = cache(slots);
            fill_free(&cache, &device, slots);
            let mut i = 0u64;
            b.iter(|| {
                let ptr = device.allocate(BLOCK).unwrap();
                cache
                    .admit(CacheEntry::device(format!("n{i}"), ptr, Duration::from_micros(i % 500)))
                    .unwrap();
                cache.release(ptr).unwrap();
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_mark_release(c: &mut Criterion) {
    let (cache, device) = cache(1024);
    let ptrs = fill_free(&cache, &device, 1024);
    let mut i = 0;
    c.bench_function("mark_release_cycle", |b| {
        b.iter(|| {
            let ptr = ptrs[i % ptrs.len()];
            black_box(cache.mark_in_use(ptr).unwrap());
            black_box(cache.release(ptr).unwrap());
            i += 1;
        });
    });
}

fn bench_make_space(c: &mut Criterion) {
    c.bench_function("make_space_half", |b| {
        b.iter_batched(
            || {
                let (cache, device) = cache(4096);
                fill_free(&cache, &device, 4096);
                (cache, device)
            },
            |(cache, _device)| {
                let half = cache.limit_bytes() / 2;
                black_box(cache.make_space(half).unwrap())
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_admit_with_eviction, bench_mark_release, bench_make_space);
criterion_main!(benches);
