//! Elapsed-time metrics store
//!
//! Every timed operation writes its latest sample here. Writes are
//! overwrite-at-key, so concurrent writers never need more than the map's
//! own per-shard locking.

use std::{future::Future, sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Outcome tag attached to a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleOutcome {
    Success,
    Failure,
}

/// A single elapsed-time observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Metric key
    pub key: String,
    /// Elapsed time in milliseconds
    pub elapsed_ms: f64,
    /// Whether the timed operation succeeded
    pub outcome: SampleOutcome,
    /// When the sample was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Keyed store holding the latest sample per key
#[derive(Debug, Clone, Default)]
pub struct MetricsStore {
    samples: Arc<DashMap<String, MetricSample>>,
}

impl MetricsStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful sample, replacing any previous one for `key`
    pub fn record(&self, key: impl Into<String>, elapsed_ms: f64) {
        self.insert(key.into(), elapsed_ms, SampleOutcome::Success);
    }

    /// Record a failed sample, replacing any previous one for `key`
    pub fn record_failure(&self, key: impl Into<String>, elapsed_ms: f64) {
        self.insert(key.into(), elapsed_ms, SampleOutcome::Failure);
    }

    fn insert(&self, key: String, elapsed_ms: f64, outcome: SampleOutcome) {
        let sample = MetricSample {
            key: key.clone(),
            elapsed_ms,
            outcome,
            recorded_at: Utc::now(),
        };
        self.samples.insert(key, sample);
    }

    /// Time a future and record its elapsed time under `key`
    pub async fn time<F, T>(&self, key: impl Into<String>, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let timer = OperationTimer::start();
        let out = fut.await;
        self.record(key, timer.elapsed_ms());
        out
    }

    /// Latest sample for a key
    pub fn get(&self, key: &str) -> Option<MetricSample> {
        self.samples.get(key).map(|s| s.value().clone())
    }

    /// Latest elapsed time for a key
    pub fn elapsed_ms(&self, key: &str) -> Option<f64> {
        self.samples.get(key).map(|s| s.elapsed_ms)
    }

    /// All samples ordered by key
    pub fn all(&self) -> Vec<MetricSample> {
        let mut samples: Vec<MetricSample> =
            self.samples.iter().map(|s| s.value().clone()).collect();
        samples.sort_by(|a, b| a.key.cmp(&b.key));
        samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Drop every sample
    pub fn clear(&self) {
        self.samples.clear();
    }
}

/// Operation timing helper
#[derive(Debug)]
pub struct OperationTimer {
    start_time: Instant,
}

impl OperationTimer {
    /// Start timing an operation
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_sample_wins() {
        let store = MetricsStore::new();
        store.record("preload.Chart", 12.0);
        store.record("preload.Chart", 7.5);

        assert_eq!(store.len(), 1);
        assert_eq!(store.elapsed_ms("preload.Chart"), Some(7.5));
    }

    #[test]
    fn test_failure_tag() {
        let store = MetricsStore::new();
        store.record_failure("preload.Chart.failed", 3.0);

        let sample = store.get("preload.Chart.failed").unwrap();
        assert_eq!(sample.outcome, SampleOutcome::Failure);
    }

    #[test]
    fn test_all_sorted_and_clear() {
        let store = MetricsStore::new();
        store.record("b", 1.0);
        store.record("a", 2.0);

        let keys: Vec<_> = store.all().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec!["a", "b"]);

        store.clear();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_time_records_sample() {
        let store = MetricsStore::new();
        let value = store
            .time("op", async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                7
            })
            .await;

        assert_eq!(value, 7);
        assert!(store.elapsed_ms("op").unwrap() >= 5.0);
    }

    #[test]
    fn test_clones_share_state() {
        let store = MetricsStore::new();
        let other = store.clone();
        other.record("shared", 1.0);
        assert!(store.get("shared").is_some());
    }
}
