//! Benchmark history and baselines
//!
//! Each benchmark name owns a bounded FIFO of its most recent results and
//! at most one baseline. Baselines change only through explicit calls.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    path::Path,
    sync::Arc,
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{BenchError, Result},
    runner::BenchmarkResult,
};

/// Default number of results kept per benchmark
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Exported benchmark state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSnapshot {
    pub baselines: BTreeMap<String, BenchmarkResult>,
    /// Oldest first
    pub history: BTreeMap<String, Vec<BenchmarkResult>>,
}

impl BenchmarkSnapshot {
    /// Load a snapshot from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the snapshot as pretty JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[derive(Default)]
struct StoreInner {
    history: HashMap<String, VecDeque<BenchmarkResult>>,
    baselines: HashMap<String, BenchmarkResult>,
}

/// Shared, thread-safe history and baseline store
#[derive(Clone)]
pub struct BenchmarkStore {
    inner: Arc<RwLock<StoreInner>>,
    capacity: usize,
}

impl BenchmarkStore {
    /// Create a store keeping at most `capacity` results per name
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a result to its name's history, evicting the oldest when full
    pub fn record(&self, result: BenchmarkResult) {
        let mut inner = self.inner.write();
        let ring = inner.history.entry(result.name.clone()).or_default();
        ring.push_back(result);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// History for a name, oldest first
    pub fn history(&self, name: &str) -> Vec<BenchmarkResult> {
        self.inner
            .read()
            .history
            .get(name)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent result for a name
    pub fn latest(&self, name: &str) -> Option<BenchmarkResult> {
        self.inner
            .read()
            .history
            .get(name)
            .and_then(|ring| ring.back().cloned())
    }

    /// Names with history, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().history.keys().cloned().collect();
        names.sort();
        names
    }

    /// Designate a result as the baseline for its name
    pub fn set_baseline(&self, result: BenchmarkResult) {
        info!(benchmark = %result.name, average_ms = result.average_time_ms, "Baseline set");
        self.inner
            .write()
            .baselines
            .insert(result.name.clone(), result);
    }

    /// Promote the latest recorded result to baseline
    pub fn promote_latest(&self, name: &str) -> Result<BenchmarkResult> {
        let latest = self
            .latest(name)
            .ok_or_else(|| BenchError::UnknownBenchmark(name.to_string()))?;
        self.set_baseline(latest.clone());
        Ok(latest)
    }

    pub fn baseline(&self, name: &str) -> Option<BenchmarkResult> {
        self.inner.read().baselines.get(name).cloned()
    }

    pub fn clear_baseline(&self, name: &str) -> Option<BenchmarkResult> {
        self.inner.write().baselines.remove(name)
    }

    /// Copy out all baselines and history
    pub fn export_data(&self) -> BenchmarkSnapshot {
        let inner = self.inner.read();
        BenchmarkSnapshot {
            baselines: inner
                .baselines
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            history: inner
                .history
                .iter()
                .map(|(k, ring)| (k.clone(), ring.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Replace all state with a snapshot, keeping only the newest
    /// `capacity` results per name
    pub fn import_data(&self, snapshot: BenchmarkSnapshot) {
        let mut history = HashMap::with_capacity(snapshot.history.len());
        for (name, results) in snapshot.history {
            let skip = results.len().saturating_sub(self.capacity);
            let ring: VecDeque<_> = results.into_iter().skip(skip).collect();
            history.insert(name, ring);
        }

        let mut inner = self.inner.write();
        inner.baselines = snapshot.baselines.into_iter().collect();
        inner.history = history;
        debug!(
            baselines = inner.baselines.len(),
            benchmarks = inner.history.len(),
            "Imported benchmark snapshot"
        );
    }

    /// Build a store from a snapshot file, or an empty one if it is missing
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self> {
        let store = Self::new(capacity);
        if path.as_ref().exists() {
            store.import_data(BenchmarkSnapshot::load_from_file(path)?);
        }
        Ok(store)
    }

    /// Write the current state to a snapshot file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.export_data().save_to_file(path)
    }
}

impl Default for BenchmarkStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::runner::MemoryStats;
    use chrono::Utc;

    pub(crate) fn result(name: &str, average_time_ms: f64) -> BenchmarkResult {
        BenchmarkResult {
            name: name.to_string(),
            iterations: 10,
            total_time_ms: average_time_ms * 10.0,
            average_time_ms,
            min_time_ms: average_time_ms,
            max_time_ms: average_time_ms,
            std_dev_ms: 0.0,
            ops_per_second: if average_time_ms > 0.0 {
                1000.0 / average_time_ms
            } else {
                0.0
            },
            memory: MemoryStats::default(),
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let store = BenchmarkStore::new(3);
        for i in 0..5 {
            store.record(result("render", i as f64));
        }

        let averages: Vec<f64> = store
            .history("render")
            .iter()
            .map(|r| r.average_time_ms)
            .collect();
        assert_eq!(averages, vec![2.0, 3.0, 4.0]);
        assert_eq!(store.latest("render").unwrap().average_time_ms, 4.0);
    }

    #[test]
    fn test_baseline_is_explicit() {
        let store = BenchmarkStore::default();
        store.record(result("render", 10.0));
        assert!(store.baseline("render").is_none());

        let promoted = store.promote_latest("render").unwrap();
        assert_eq!(promoted.average_time_ms, 10.0);

        store.record(result("render", 20.0));
        assert_eq!(store.baseline("render").unwrap().average_time_ms, 10.0);

        assert!(matches!(
            store.promote_latest("missing"),
            Err(BenchError::UnknownBenchmark(_))
        ));
    }

    #[test]
    fn test_export_import_round_trip_trims_to_capacity() {
        let source = BenchmarkStore::new(10);
        for i in 0..6 {
            source.record(result("parse", i as f64));
        }
        source.set_baseline(result("parse", 1.0));

        let target = BenchmarkStore::new(4);
        target.record(result("stale", 1.0));
        target.import_data(source.export_data());

        assert_eq!(target.names(), vec!["parse"]);
        assert_eq!(target.history("parse").len(), 4);
        assert_eq!(target.history("parse")[0].average_time_ms, 2.0);
        assert_eq!(target.baseline("parse").unwrap().average_time_ms, 1.0);
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.json");

        let store = BenchmarkStore::default();
        store.record(result("io", 3.0));
        store.promote_latest("io").unwrap();
        store.save(&path).unwrap();

        let reopened = BenchmarkStore::open(&path, DEFAULT_HISTORY_CAPACITY).unwrap();
        assert_eq!(reopened.names(), vec!["io"]);
        assert_eq!(reopened.history("io").len(), 1);
        let baseline = reopened.baseline("io").unwrap();
        assert_eq!(baseline.average_time_ms, 3.0);
        assert!((baseline.ops_per_second - 1000.0 / 3.0).abs() < 1e-9);

        let empty = BenchmarkStore::open(dir.path().join("missing.json"), 5).unwrap();
        assert!(empty.names().is_empty());
    }
}
