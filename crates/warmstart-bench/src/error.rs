//! Benchmark error types

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle hook that can fail a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    Setup,
    Teardown,
    BeforeEach,
    AfterEach,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookPhase::Setup => "setup",
            HookPhase::Teardown => "teardown",
            HookPhase::BeforeEach => "before_each",
            HookPhase::AfterEach => "after_each",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Iteration {iteration} of '{name}' took {elapsed_ms:.2}ms, over the {timeout_ms}ms limit")]
    Timeout {
        name: String,
        iteration: usize,
        elapsed_ms: f64,
        timeout_ms: u64,
    },

    #[error("{phase} hook failed: {message}")]
    SetupFailure { phase: HookPhase, message: String },

    #[error("Workload failed on iteration {iteration}: {message}")]
    Workload { iteration: usize, message: String },

    #[error("Workload failed during warmup iteration {iteration}: {message}")]
    Warmup { iteration: usize, message: String },

    #[error("No results recorded for benchmark: {0}")]
    UnknownBenchmark(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for BenchError {
    fn from(err: config::ConfigError) -> Self {
        BenchError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
