//! In-flight load deduplication
//!
//! [`LoadCache`] keeps one arena slot per key. A slot is either absent
//! (not started), `Pending` with a shared future every concurrent caller
//! awaits, `Ready` with the settled value, or `Failed` with the last error.
//! A failed slot is retried by the next `preload` call; a ready slot is never
//! loaded again until the cache is cleared.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::{
    channel::oneshot,
    future::{self, BoxFuture, FutureExt, Shared},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{PreloadError, Result},
    loader::{LoadFailure, LoadResult, LoaderRef, ModuleValue},
    metrics::{MetricsStore, OperationTimer},
};

type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

enum LoadState {
    Pending { id: u64, load: SharedLoad },
    Ready(ModuleValue),
    Failed(LoadFailure),
}

/// Observable state of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    NotStarted,
    Pending,
    Ready,
    Failed,
}

/// Snapshot of load counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Loader invocations started
    pub invocations: u64,
    /// Calls that joined an already pending load
    pub deduplicated: u64,
    /// Calls answered from a ready slot
    pub ready_hits: u64,
    /// Loads that settled with a failure
    pub failures: u64,
}

#[derive(Debug, Default)]
struct LoadCounters {
    invocations: AtomicU64,
    deduplicated: AtomicU64,
    ready_hits: AtomicU64,
    failures: AtomicU64,
}

impl LoadCounters {
    fn snapshot(&self) -> LoadStats {
        LoadStats {
            invocations: self.invocations.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            ready_hits: self.ready_hits.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.invocations.store(0, Ordering::Relaxed);
        self.deduplicated.store(0, Ordering::Relaxed);
        self.ready_hits.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }
}

/// Metric key for a successful load
pub fn success_metric_key(key: &str) -> String {
    format!("preload.{key}")
}

/// Metric key for a failed load
pub fn failure_metric_key(key: &str) -> String {
    format!("preload.{key}.failed")
}

/// Deduplicating load cache
#[derive(Clone)]
pub struct LoadCache {
    states: Arc<Mutex<HashMap<String, LoadState>>>,
    metrics: MetricsStore,
    counters: Arc<LoadCounters>,
    next_id: Arc<AtomicU64>,
}

impl LoadCache {
    /// Create a cache recording into its own metrics store
    pub fn new() -> Self {
        Self::with_metrics(MetricsStore::new())
    }

    /// Create a cache recording into a shared metrics store
    pub fn with_metrics(metrics: MetricsStore) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            metrics,
            counters: Arc::new(LoadCounters::default()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Metrics store this cache records into
    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    /// Start or join the load for `key`.
    ///
    /// The loader is invoked synchronously inside this call when no load is
    /// pending or ready for `key`, so call order is invocation order. The slot
    /// is reserved before the loader runs and the lock is released, so a
    /// loader may preload its own dependencies through the same cache.
    /// When a tokio runtime is available the load is also driven by a
    /// background task, so it settles even if every caller stops waiting.
    pub fn preload(&self, key: &str, loader: &LoaderRef) -> BoxFuture<'static, LoadResult> {
        let mut states = self.states.lock();

        match states.get(key) {
            Some(LoadState::Ready(value)) => {
                self.counters.ready_hits.fetch_add(1, Ordering::Relaxed);
                return future::ready(Ok(Arc::clone(value))).boxed();
            }
            Some(LoadState::Pending { load, .. }) => {
                self.counters.deduplicated.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Joining pending load");
                return load.clone().boxed();
            }
            Some(LoadState::Failed(_)) | None => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.counters.invocations.fetch_add(1, Ordering::Relaxed);
        debug!(key, id, "Invoking loader");

        let timer = OperationTimer::start();
        let (start, started) = oneshot::channel::<BoxFuture<'static, LoadResult>>();
        let pending = async move {
            match started.await {
                Ok(load) => load.await,
                Err(_) => Err(LoadFailure::new("loader did not start")),
            }
        }
        .boxed();
        let load = self
            .settle(key.to_string(), id, timer, pending)
            .boxed()
            .shared();

        states.insert(
            key.to_string(),
            LoadState::Pending {
                id,
                load: load.clone(),
            },
        );
        drop(states);

        // The receiver lives inside `load`, which the slot holds.
        let _ = start.send(loader.load());

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(load.clone().map(|_| ()));
        }

        load.boxed()
    }

    /// Like [`preload`](Self::preload) but stop waiting after `timeout`.
    ///
    /// Timing out does not cancel the load: the slot stays pending and a
    /// later call joins the same load instead of invoking the loader again.
    pub async fn preload_with_timeout(
        &self,
        key: &str,
        loader: &LoaderRef,
        timeout: Duration,
    ) -> Result<ModuleValue> {
        match tokio::time::timeout(timeout, self.preload(key, loader)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(failure)) => Err(PreloadError::LoaderFailure {
                name: key.to_string(),
                message: failure.message,
            }),
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(key, timeout_ms, "Stopped waiting for load");
                Err(PreloadError::Timeout {
                    name: key.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    fn settle(
        &self,
        key: String,
        id: u64,
        timer: OperationTimer,
        pending: BoxFuture<'static, LoadResult>,
    ) -> impl Future<Output = LoadResult> + Send + 'static {
        let states = Arc::clone(&self.states);
        let metrics = self.metrics.clone();
        let counters = Arc::clone(&self.counters);

        async move {
            let result = pending.await;
            let elapsed_ms = timer.elapsed_ms();

            let next = match &result {
                Ok(value) => {
                    metrics.record(success_metric_key(&key), elapsed_ms);
                    debug!(key = %key, elapsed_ms, "Load settled");
                    LoadState::Ready(Arc::clone(value))
                }
                Err(failure) => {
                    metrics.record_failure(failure_metric_key(&key), elapsed_ms);
                    counters.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %key, error = %failure, "Load failed");
                    LoadState::Failed(failure.clone())
                }
            };

            // A clear or a newer load may have replaced this slot meanwhile.
            let mut states = states.lock();
            let current = matches!(
                states.get(&key),
                Some(LoadState::Pending { id: slot, .. }) if *slot == id
            );
            if current {
                states.insert(key, next);
            }

            result
        }
    }

    /// Whether `key` has a settled, successful load
    pub fn is_preloaded(&self, key: &str) -> bool {
        matches!(self.states.lock().get(key), Some(LoadState::Ready(_)))
    }

    /// Current state of `key`
    pub fn status(&self, key: &str) -> LoadStatus {
        match self.states.lock().get(key) {
            None => LoadStatus::NotStarted,
            Some(LoadState::Pending { .. }) => LoadStatus::Pending,
            Some(LoadState::Ready(_)) => LoadStatus::Ready,
            Some(LoadState::Failed(_)) => LoadStatus::Failed,
        }
    }

    /// Ready value for `key`, if any
    pub fn get(&self, key: &str) -> Option<ModuleValue> {
        match self.states.lock().get(key) {
            Some(LoadState::Ready(value)) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Last failure recorded for `key`, if its slot is failed
    pub fn last_failure(&self, key: &str) -> Option<LoadFailure> {
        match self.states.lock().get(key) {
            Some(LoadState::Failed(failure)) => Some(failure.clone()),
            _ => None,
        }
    }

    /// Keys with a successful load, sorted
    pub fn preloaded_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .states
            .lock()
            .iter()
            .filter(|(_, state)| matches!(state, LoadState::Ready(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of keys currently pending
    pub fn in_flight(&self) -> usize {
        self.states
            .lock()
            .values()
            .filter(|state| matches!(state, LoadState::Pending { .. }))
            .count()
    }

    /// Forget every pending, ready and failed slot.
    ///
    /// Loads already in flight still run to completion for their current
    /// waiters but no longer populate the cache.
    pub fn clear_cache(&self) {
        self.states.lock().clear();
        self.counters.reset();
    }

    /// Counter snapshot
    pub fn stats(&self) -> LoadStats {
        self.counters.snapshot()
    }
}

impl Default for LoadCache {
    fn default() -> Self {
        Self::new()
    }
}
