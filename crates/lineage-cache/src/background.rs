// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Background eviction task.
//!
//! [`BackgroundEvictor`] runs on the tokio runtime next to the foreground
//! computation. Every `interval_ms`, or sooner when [`nudge`]d, it evicts
//! free entries until `headroom_fraction` of the cache limit is available,
//! so foreground admissions rarely have to evict inline. It goes through the
//! same locked operations as every other caller.
//!
//! A queue that runs dry before the target is reached is not an error here;
//! the evictor simply tries again on the next tick.
//!
//! [`nudge`]: BackgroundEvictor::nudge

use crate::{BackgroundConfig, DeviceCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct BackgroundEvictor {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
    wake: Arc<Notify>,
}

impl BackgroundEvictor {
    /// Spawns the evictor with the cache's own background settings.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(cache: Arc<DeviceCache>) -> Self {
        let settings = cache.config().background.clone();
        Self::spawn_with(cache, settings)
    }

    /// Spawns the evictor with explicit settings. A zero interval is raised
    /// to 1 ms and the headroom fraction is clamped into `[0, 1]`.
    pub fn spawn_with(cache: Arc<DeviceCache>, settings: BackgroundConfig) -> Self {
        let settings = sanitize(settings);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());
        let task_wake = Arc::clone(&wake);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(settings.interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                interval_ms = settings.interval_ms,
                headroom_fraction = settings.headroom_fraction,
                "background evictor started"
            );

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {}
                    _ = task_wake.notified() => {}
                }
                reclaim(&cache, settings.headroom_fraction);
            }
            tracing::info!("background evictor stopped");
        });

        Self {
            handle,
            stop_tx,
            wake,
        }
    }

    /// Wakes the evictor before its next tick.
    pub fn nudge(&self) {
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the evictor and waits for the task to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "background evictor task failed");
        }
    }
}

fn sanitize(mut settings: BackgroundConfig) -> BackgroundConfig {
    if settings.interval_ms == 0 {
        tracing::warn!("background interval_ms of 0 raised to 1");
        settings.interval_ms = 1;
    }
    if !(0.0..=1.0).contains(&settings.headroom_fraction) {
        let clamped = if settings.headroom_fraction > 1.0 { 1.0 } else { 0.0 };
        tracing::warn!(
            headroom_fraction = settings.headroom_fraction,
            clamped,
            "background headroom_fraction out of range"
        );
        settings.headroom_fraction = clamped;
    }
    settings
}

/// One eviction pass towards `headroom_fraction` of the limit being free.
fn reclaim(cache: &DeviceCache, headroom_fraction: f64) -> usize {
    let target = (cache.limit_bytes() as f64 * headroom_fraction) as usize;
    if cache.has_headroom(target) {
        return 0;
    }
    match cache.drive_eviction(target, false) {
        Ok(report) => {
            if !report.is_empty() {
                tracing::debug!(
                    evicted = report.len(),
                    reclaimed_bytes = report.reclaimed_bytes(),
                    "background eviction pass"
                );
            }
            report.len()
        }
        Err(e) => {
            tracing::trace!(error = %e, "background eviction could not reach headroom target");
            0
        }
    }
}

impl std::fmt::Debug for BackgroundEvictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundEvictor")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheConfig, CacheEntry, NoUpstream};
    use device_memory::{ByteSize, SimulatedDevice};

    #[test]
    fn test_reclaim_reaches_headroom_target() {
        let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(10_000)));
        let config = CacheConfig {
            cache_fraction: 1.0,
            ..Default::default()
        };
        let cache = DeviceCache::init(config, device.clone(), Arc::new(NoUpstream)).unwrap();
        for i in 0..10 {
            let ptr = device.allocate(1000).unwrap();
            cache.admit(CacheEntry::device(format!("k{i}"), ptr, Duration::ZERO)).unwrap();
            cache.release(ptr).unwrap();
        }
        assert_eq!(cache.current_size(), 10_000);

        // Keep 30% of 10_000 free: three entries go.
        assert_eq!(reclaim(&cache, 0.3), 3);
        assert_eq!(cache.current_size(), 7000);
        assert_eq!(reclaim(&cache, 0.3), 0);
        assert_eq!(cache.stats().failed_admissions, 0);
    }

    #[test]
    fn test_sanitize_settings() {
        let raw = BackgroundConfig {
            enabled: true,
            interval_ms: 0,
            headroom_fraction: f64::NAN,
        };
        let fixed = sanitize(raw);
        assert_eq!(fixed.interval_ms, 1);
        assert_eq!(fixed.headroom_fraction, 0.0);

        let raw = BackgroundConfig {
            enabled: true,
            interval_ms: 20,
            headroom_fraction: 3.0,
        };
        let fixed = sanitize(raw);
        assert_eq!(fixed.interval_ms, 20);
        assert_eq!(fixed.headroom_fraction, 1.0);
    }

    #[tokio::test]
    async fn test_zero_interval_keeps_running() {
        let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(1000)));
        let cache = Arc::new(
            DeviceCache::init(CacheConfig::default(), device, Arc::new(NoUpstream)).unwrap(),
        );
        let settings = BackgroundConfig {
            enabled: true,
            interval_ms: 0,
            headroom_fraction: 0.1,
        };
        let evictor = BackgroundEvictor::spawn_with(cache, settings);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(evictor.is_running());
        evictor.stop().await;
    }

    #[test]
    fn test_reclaim_with_everything_live() {
        let device = Arc::new(SimulatedDevice::new(ByteSize::from_bytes(1000)));
        let config = CacheConfig {
            cache_fraction: 1.0,
            ..Default::default()
        };
        let cache = DeviceCache::init(config, device.clone(), Arc::new(NoUpstream)).unwrap();
        let ptr = device.allocate(1000).unwrap();
        cache.admit(CacheEntry::device("live", ptr, Duration::ZERO)).unwrap();

        assert_eq!(reclaim(&cache, 0.5), 0);
        assert!(cache.probe_live(ptr));
        assert_eq!(cache.stats().failed_admissions, 0);
    }
}
