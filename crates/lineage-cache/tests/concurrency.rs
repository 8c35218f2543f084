// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Foreground threads racing on one cache.

use device_memory::{ByteSize, DeviceMemory, DevicePtr, SimulatedDevice};
use lineage_cache::{CacheConfig, CacheEntry, DeviceCache, NoUpstream};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn shared_cache(pool: u64, fraction: f64) -> (Arc<DeviceCache>, Arc<SimulatedDevice>) {
    let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(pool)));
    let config = CacheConfig {
        cache_fraction: fraction,
        ..Default::default()
    };
    let cache = Arc::new(DeviceCache::init(config, device.clone(), Arc::new(NoUpstream)).unwrap());
    (cache, device)
}

#[test]
fn test_concurrent_acquire_release_keeps_counts() {
    let (cache, device) = shared_cache(1 << 20, 1.0);
    let ptrs: Vec<DevicePtr> = (0..8)
        .map(|i| {
            let ptr = device.allocate(4096).unwrap();
            cache.admit(CacheEntry::device(format!("k{i}"), ptr, Duration::ZERO)).unwrap();
            cache.release(ptr).unwrap();
            ptr
        })
        .collect();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let ptrs = ptrs.clone();
            thread::spawn(move || {
                barrier.wait();
                for round in 0..500 {
                    let ptr = ptrs[(t + round) % ptrs.len()];
                    let guard = cache.acquire(ptr).unwrap();
                    assert!(cache.probe_live(guard.ptr()));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(cache.num_live(), 0);
    assert_eq!(cache.num_evictable(), 8);
    cache.check_consistency().unwrap();
}

#[test]
fn test_concurrent_admission_under_pressure() {
    // Room for 16 blocks of 1 KiB in the cache; 4 threads admit 64 each.
    let (cache, device) = shared_cache(1 << 20, 16.0 * 1024.0 / f64::from(1 << 20));
    assert_eq!(cache.limit_bytes(), 16 * 1024);

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let device = Arc::clone(&device);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut held = Vec::new();
                for i in 0..64 {
                    let ptr = device.allocate(1024).unwrap();
                    let entry = CacheEntry::device(format!("t{t}-{i}"), ptr, Duration::from_micros(i));
                    cache.admit(entry).unwrap();
                    held.push(ptr);
                    if held.len() > 2 {
                        cache.release(held.remove(0)).unwrap();
                    }
                }
                cache.release_all(&held).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(cache.current_size() <= cache.limit_bytes());
    assert_eq!(cache.total_resident().unwrap(), cache.current_size());
    assert_eq!(cache.num_live(), 0);
    assert_eq!(cache.stats().admissions, 256);
    assert_eq!(cache.stats().failed_admissions, 0);
    // Everything evicted was freed on the device.
    let resident = cache.cached_pointers();
    assert_eq!(device.live_blocks(), resident.len());
    for ptr in &resident {
        assert!(device.size_of(*ptr).is_ok());
    }
    cache.check_consistency().unwrap();
}

#[test]
fn test_eviction_races_with_reacquire() {
    let (cache, device) = shared_cache(1 << 20, 1.0);
    let hot = device.allocate(1024).unwrap();
    cache.admit(CacheEntry::device("hot", hot, Duration::ZERO)).unwrap();
    cache.release(hot).unwrap();

    let evictor = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for _ in 0..200 {
                let _ = cache.make_space(cache.limit_bytes());
            }
        })
    };
    let user = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            let mut acquired = 0;
            for _ in 0..200 {
                // Once evicted, the pointer is no longer cached.
                if let Ok(guard) = cache.acquire(hot) {
                    acquired += 1;
                    assert!(cache.probe_live(guard.ptr()));
                }
            }
            acquired
        })
    };
    evictor.join().unwrap();
    let _ = user.join().unwrap();

    cache.check_consistency().unwrap();
    // Either still cached and free, or evicted and freed.
    if cache.lookup(hot).is_some() {
        assert!(device.contains(hot));
        assert!(!cache.probe_live(hot));
    } else {
        assert!(!device.contains(hot));
    }
}
