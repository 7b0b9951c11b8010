//! Benchmark execution
//!
//! A run executes setup once, the warmup iterations, the measured
//! iterations and teardown once. Teardown is attempted even when an
//! earlier phase failed. Failures are captured in the result instead of
//! being returned, so a suite always runs to the end.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{BenchError, HookPhase, Result},
    memory::{MemoryProbe, SystemMemoryProbe},
    stats::TimingStats,
    store::BenchmarkStore,
    workload::{Workload, WorkloadRef},
};

/// Upper bound on the sample buffer reserved up front
const MAX_PREALLOCATED_SAMPLES: usize = 1024;

/// Optional lifecycle hooks around a run
#[derive(Clone, Default)]
pub struct BenchmarkHooks {
    pub setup: Option<WorkloadRef>,
    pub teardown: Option<WorkloadRef>,
    pub before_each: Option<WorkloadRef>,
    pub after_each: Option<WorkloadRef>,
}

impl BenchmarkHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup(mut self, hook: WorkloadRef) -> Self {
        self.setup = Some(hook);
        self
    }

    pub fn teardown(mut self, hook: WorkloadRef) -> Self {
        self.teardown = Some(hook);
        self
    }

    pub fn before_each(mut self, hook: WorkloadRef) -> Self {
        self.before_each = Some(hook);
        self
    }

    pub fn after_each(mut self, hook: WorkloadRef) -> Self {
        self.after_each = Some(hook);
        self
    }
}

impl fmt::Debug for BenchmarkHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkHooks")
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .field("before_each", &self.before_each.is_some())
            .field("after_each", &self.after_each.is_some())
            .finish()
    }
}

/// Per-benchmark run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Measured iterations
    pub iterations: usize,
    /// Untimed iterations run first
    pub warmup_iterations: usize,
    /// Any single measured iteration slower than this fails the run
    pub timeout_ms: u64,
    #[serde(skip)]
    pub hooks: BenchmarkHooks,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            warmup_iterations: 10,
            timeout_ms: 30_000,
            hooks: BenchmarkHooks::default(),
        }
    }
}

impl BenchmarkConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_warmup(mut self, warmup_iterations: usize) -> Self {
        self.warmup_iterations = warmup_iterations;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_hooks(mut self, hooks: BenchmarkHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(BenchError::Config(
                "iterations must be greater than 0".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(BenchError::Config(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Memory readings in bytes; `0` when the probe is unavailable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub before: u64,
    pub after: u64,
    pub peak: u64,
}

/// Outcome of one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    /// Measured iterations that completed
    pub iterations: usize,
    pub total_time_ms: f64,
    pub average_time_ms: f64,
    pub min_time_ms: f64,
    pub max_time_ms: f64,
    pub std_dev_ms: f64,
    pub ops_per_second: f64,
    pub memory: MemoryStats,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkResult {
    fn from_stats(
        name: &str,
        stats: TimingStats,
        memory: MemoryStats,
        error: Option<&BenchError>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.to_string(),
            iterations: stats.iterations,
            total_time_ms: stats.total_ms,
            average_time_ms: stats.average_ms,
            min_time_ms: stats.min_ms,
            max_time_ms: stats.max_ms,
            std_dev_ms: stats.std_dev_ms,
            ops_per_second: stats.ops_per_second,
            memory,
            success: error.is_none(),
            error: error.map(ToString::to_string),
            timestamp,
        }
    }
}

/// A named workload with its settings, for suites
#[derive(Clone)]
pub struct BenchmarkCase {
    pub name: String,
    pub workload: WorkloadRef,
    pub config: BenchmarkConfig,
}

impl BenchmarkCase {
    pub fn new(name: impl Into<String>, workload: WorkloadRef, config: BenchmarkConfig) -> Self {
        Self {
            name: name.into(),
            workload,
            config,
        }
    }
}

/// Aggregate of a sequential suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSuiteResult {
    pub run_id: Uuid,
    pub name: String,
    pub results: Vec<BenchmarkResult>,
    /// Wall-clock time of the whole suite
    pub total_time_ms: f64,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub timestamp: DateTime<Utc>,
}

impl BenchmarkSuiteResult {
    pub fn all_passed(&self) -> bool {
        self.failed_tests == 0
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs workloads and appends results to a [`BenchmarkStore`]
#[derive(Clone)]
pub struct BenchmarkRunner {
    store: BenchmarkStore,
    probe: Arc<dyn MemoryProbe>,
}

impl BenchmarkRunner {
    /// Runner reading process memory through the system probe
    pub fn new(store: BenchmarkStore) -> Self {
        Self {
            store,
            probe: Arc::new(SystemMemoryProbe::new()),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn store(&self) -> &BenchmarkStore {
        &self.store
    }

    /// Run one benchmark and record it in the store's history
    pub async fn run_benchmark<W>(
        &self,
        name: &str,
        workload: &W,
        config: &BenchmarkConfig,
    ) -> BenchmarkResult
    where
        W: Workload + ?Sized,
    {
        let timestamp = Utc::now();
        let before = self.probe.sample_or_zero();
        let mut peak = before;
        let mut samples = Vec::with_capacity(config.iterations.min(MAX_PREALLOCATED_SAMPLES));

        debug!(
            benchmark = name,
            iterations = config.iterations,
            warmup = config.warmup_iterations,
            "Starting benchmark"
        );

        let mut error = config.validate().err();
        if error.is_none() {
            error = run_hook(config.hooks.setup.as_ref(), HookPhase::Setup)
                .await
                .err();
        }
        if error.is_none() {
            error = self.warmup(workload, config).await.err();
        }
        if error.is_none() {
            error = self
                .measure(name, workload, config, &mut samples, &mut peak)
                .await
                .err();
        }

        if let Err(err) = run_hook(config.hooks.teardown.as_ref(), HookPhase::Teardown).await {
            if error.is_none() {
                error = Some(err);
            } else {
                warn!(benchmark = name, error = %err, "Teardown failed after earlier error");
            }
        }

        let after = self.probe.sample_or_zero();
        let memory = MemoryStats {
            before,
            after,
            peak: peak.max(after),
        };

        let stats = TimingStats::from_samples(&samples);
        let result =
            BenchmarkResult::from_stats(name, stats, memory, error.as_ref(), timestamp);

        match &error {
            Some(err) => warn!(benchmark = name, error = %err, "Benchmark failed"),
            None => debug!(
                benchmark = name,
                average_ms = result.average_time_ms,
                ops_per_second = result.ops_per_second,
                "Benchmark finished"
            ),
        }

        self.store.record(result.clone());
        result
    }

    /// Run each case in order, one at a time
    pub async fn run_suite(&self, name: &str, cases: &[BenchmarkCase]) -> BenchmarkSuiteResult {
        let started = Instant::now();
        let timestamp = Utc::now();
        info!(suite = name, cases = cases.len(), "Running benchmark suite");

        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let result = self
                .run_benchmark(&case.name, case.workload.as_ref(), &case.config)
                .await;
            results.push(result);
        }

        let passed_tests = results.iter().filter(|r| r.success).count();
        let failed_tests = results.len() - passed_tests;
        let total_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            suite = name,
            passed = passed_tests,
            failed = failed_tests,
            total_ms = total_time_ms,
            "Benchmark suite finished"
        );

        BenchmarkSuiteResult {
            run_id: Uuid::new_v4(),
            name: name.to_string(),
            results,
            total_time_ms,
            passed_tests,
            failed_tests,
            timestamp,
        }
    }

    async fn warmup<W>(&self, workload: &W, config: &BenchmarkConfig) -> Result<()>
    where
        W: Workload + ?Sized,
    {
        for iteration in 0..config.warmup_iterations {
            run_hook(config.hooks.before_each.as_ref(), HookPhase::BeforeEach).await?;
            workload
                .call()
                .await
                .map_err(|e| BenchError::Warmup {
                    iteration,
                    message: format!("{e:#}"),
                })?;
            run_hook(config.hooks.after_each.as_ref(), HookPhase::AfterEach).await?;
        }
        Ok(())
    }

    async fn measure<W>(
        &self,
        name: &str,
        workload: &W,
        config: &BenchmarkConfig,
        samples: &mut Vec<f64>,
        peak: &mut u64,
    ) -> Result<()>
    where
        W: Workload + ?Sized,
    {
        let limit = Duration::from_millis(config.timeout_ms);
        for iteration in 0..config.iterations {
            run_hook(config.hooks.before_each.as_ref(), HookPhase::BeforeEach).await?;

            let start = Instant::now();
            // Dropping the timed-out future cancels the iteration.
            let outcome = tokio::time::timeout(limit, workload.call()).await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let timed_out = || BenchError::Timeout {
                name: name.to_string(),
                iteration,
                elapsed_ms,
                timeout_ms: config.timeout_ms,
            };
            let measured = match outcome {
                Err(_) => Err(timed_out()),
                Ok(Err(e)) => Err(BenchError::Workload {
                    iteration,
                    message: format!("{e:#}"),
                }),
                Ok(Ok(())) => {
                    samples.push(elapsed_ms);
                    *peak = (*peak).max(self.probe.sample_or_zero());
                    // A workload that blocks the thread is only caught once it returns;
                    // its sample is kept.
                    if elapsed_ms > config.timeout_ms as f64 {
                        Err(timed_out())
                    } else {
                        Ok(())
                    }
                }
            };

            let after = run_hook(config.hooks.after_each.as_ref(), HookPhase::AfterEach).await;
            match measured {
                Ok(()) => after?,
                Err(err) => {
                    if let Err(hook_err) = after {
                        warn!(
                            benchmark = name,
                            iteration,
                            error = %hook_err,
                            "after_each hook failed after a failed iteration"
                        );
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

async fn run_hook(hook: Option<&WorkloadRef>, phase: HookPhase) -> Result<()> {
    match hook {
        Some(hook) => hook
            .call()
            .await
            .map_err(|e| BenchError::SetupFailure {
                phase,
                message: format!("{e:#}"),
            }),
        None => Ok(()),
    }
}
