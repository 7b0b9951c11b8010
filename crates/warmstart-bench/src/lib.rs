//! # Warmstart Bench
//!
//! Benchmark execution, history, baselines and regression detection.
//!
//! ## Features
//!
//! - **Runner**: setup, warmup, measured iterations and teardown with
//!   per-iteration timeouts and memory sampling
//! - **Store**: bounded per-name history and explicit baselines with JSON
//!   snapshots
//! - **Regression detection**: average time, peak memory and throughput
//!   compared against a threshold
//! - **Reports**: text and JSON, optionally with preload metrics
//! - **Monitor**: periodic re-runs until cancelled

pub mod cli;
pub mod config;
pub mod error;
pub mod memory;
pub mod monitor;
pub mod regression;
pub mod report;
pub mod runner;
pub mod stats;
pub mod store;
pub mod workload;

pub use config::BenchConfig;
pub use error::{BenchError, HookPhase};
pub use memory::{MemoryProbe, NullProbe, SystemMemoryProbe};
pub use monitor::{MonitorCycle, RegressionMonitor};
pub use regression::{compare, Metric, RegressionDetector, RegressionFinding, Severity};
pub use report::{ReportGenerator, ReportSection, SectionStatus, SuiteReport};
pub use runner::{
    BenchmarkCase, BenchmarkConfig, BenchmarkHooks, BenchmarkResult, BenchmarkRunner,
    BenchmarkSuiteResult, MemoryStats,
};
pub use stats::TimingStats;
pub use store::{BenchmarkSnapshot, BenchmarkStore};
pub use workload::{from_fn, workload, Workload, WorkloadRef};

/// Re-export commonly used types
pub type Result<T> = std::result::Result<T, BenchError>;
