//! Idle profile eviction.
//!
//! Sweeps run either inline on a small random sample of requests or on a
//! background interval. Neither path holds more than one shard lock at a
//! time.

use std::sync::Arc;
use std::time::{Duration, Instant};
use log::{debug, info};
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time;

use crate::core::profile_store::ProfileStore;
use crate::core::telemetry;
use crate::models::SweeperConfig;

#[derive(Debug, Clone)]
pub struct Sweeper {
    retention: Duration,
    sample_rate: f64,
}

impl Sweeper {
    pub fn new(config: &SweeperConfig) -> Self {
        Self {
            retention: Duration::from_secs(config.retention_secs),
            sample_rate: if config.sample_rate.is_nan() {
                0.0
            } else {
                config.sample_rate.clamp(0.0, 1.0)
            },
        }
    }

    /// Delete every profile idle for longer than the retention period
    pub fn sweep(&self, store: &ProfileStore, now: Instant) -> usize {
        let evicted = match now.checked_sub(self.retention) {
            Some(cutoff) => store.retain_active_since(cutoff),
            // Nothing can be older than the retention period yet.
            None => 0,
        };
        telemetry::record_sweep(evicted, store.len());
        if evicted > 0 {
            debug!("Evicted {} idle traffic profiles", evicted);
        }
        evicted
    }

    /// Sweep on roughly `sample_rate` of calls
    pub fn maybe_sweep(&self, store: &ProfileStore, now: Instant) -> Option<usize> {
        if self.sample_rate > 0.0 && rand::thread_rng().gen_bool(self.sample_rate) {
            Some(self.sweep(store, now))
        } else {
            None
        }
    }

    /// Sweep `store` every `period` on the tokio runtime
    pub fn spawn_periodic(self, store: Arc<ProfileStore>, period: Duration) -> JoinHandle<()> {
        info!("Starting profile sweeper every {:?}", period);
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.sweep(&store, Instant::now());
            }
        })
    }
}
