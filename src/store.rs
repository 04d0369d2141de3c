//! Partitioned Memory Store (C5): the most recent snapshot per tenant, with
//! background TTL eviction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::metric::{MetricFamily, PartitionedMetrics};

/// One tenant's most recent batch plus the timestamp used for eviction.
#[derive(Debug, Clone)]
pub struct ClusterSlice {
    pub newest: i64,
    pub families: Vec<MetricFamily>,
}

pub struct Store<C: Clock> {
    slices: RwLock<HashMap<String, ClusterSlice>>,
    ttl: Duration,
    clock: Arc<C>,
}

impl<C: Clock> Store<C> {
    pub fn new(ttl: Duration, clock: Arc<C>) -> Self {
        Self {
            slices: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Replaces the slice for `metrics.partition_key` wholesale. A no-op if
    /// `metrics` carries no samples.
    pub async fn write(&self, metrics: PartitionedMetrics) {
        let Some(newest) = metrics.newest() else {
            return;
        };

        let mut slices = self.slices.write().await;
        slices.insert(
            metrics.partition_key,
            ClusterSlice {
                newest,
                families: metrics.families,
            },
        );
    }

    /// Returns deep clones of every slice whose `newest >= min_timestamp_ms`.
    pub async fn read(&self, min_timestamp_ms: i64) -> Vec<PartitionedMetrics> {
        let slices = self.slices.read().await;
        slices
            .iter()
            .filter(|(_, slice)| slice.newest >= min_timestamp_ms)
            .map(|(key, slice)| PartitionedMetrics {
                partition_key: key.clone(),
                families: slice.families.clone(),
            })
            .collect()
    }

    /// Removes every slice whose `newest` has fallen more than `ttl` behind
    /// the current clock. Intended to be called periodically by
    /// [`start_cleaner`].
    pub async fn evict_expired(&self) {
        let now = self.clock.now_millis();
        let cutoff = now - self.ttl.as_millis() as i64;
        let mut slices = self.slices.write().await;
        let before = slices.len();
        slices.retain(|_, slice| slice.newest >= cutoff);
        let evicted = before - slices.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = slices.len(), "evicted stale tenant slices");
            metrics::counter!("store_evicted_slices_total").increment(evicted as u64);
        }
    }
}

/// Spawns the background eviction ticker. Returns the join handle so callers
/// can hold it for the lifetime of the server (dropping it does not stop the
/// task; it is detached intentionally).
pub fn start_cleaner<C: Clock>(store: Arc<Store<C>>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            store.evict_expired().await;
        }
    })
}
