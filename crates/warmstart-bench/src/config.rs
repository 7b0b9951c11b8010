//! Benchmark configuration
//!
//! Loaded from an optional TOML file plus `WARMSTART_BENCH__*`
//! environment overrides.

use std::{path::Path, time::Duration};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    error::{BenchError, Result},
    regression::DEFAULT_THRESHOLD,
    runner::BenchmarkConfig,
    store::DEFAULT_HISTORY_CAPACITY,
};

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "WARMSTART_BENCH";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Results kept per benchmark name
    pub history_capacity: usize,
    /// Relative change that counts as significant, as a fraction
    pub regression_threshold: f64,
    /// Run settings used when a benchmark does not override them
    pub defaults: BenchmarkConfig,
    pub monitor_interval_secs: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            regression_threshold: DEFAULT_THRESHOLD,
            defaults: BenchmarkConfig::default(),
            monitor_interval_secs: 300,
        }
    }
}

impl BenchConfig {
    /// Load from a file (if it exists) layered under environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let parsed: BenchConfig = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(BenchError::Config(
                "history_capacity must be greater than 0".to_string(),
            ));
        }
        if !self.regression_threshold.is_finite() || self.regression_threshold <= 0.0 {
            return Err(BenchError::Config(format!(
                "regression_threshold must be a positive fraction, got {}",
                self.regression_threshold
            )));
        }
        if self.monitor_interval_secs == 0 {
            return Err(BenchError::Config(
                "monitor_interval_secs must be greater than 0".to_string(),
            ));
        }
        self.defaults.validate()
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BenchConfig::load(None).unwrap();
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.regression_threshold, 0.10);
        assert_eq!(config.defaults.iterations, 100);
        assert_eq!(config.defaults.warmup_iterations, 10);
        assert_eq!(config.defaults.timeout_ms, 30_000);
        assert_eq!(config.monitor_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
history_capacity = 5
regression_threshold = 0.25

[defaults]
iterations = 20
warmup_iterations = 0
"#
        )
        .unwrap();

        let config = BenchConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.regression_threshold, 0.25);
        assert_eq!(config.defaults.iterations, 20);
        assert_eq!(config.defaults.warmup_iterations, 0);
        assert_eq!(config.defaults.timeout_ms, 30_000);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = BenchConfig::default();
        config.history_capacity = 0;
        assert!(matches!(config.validate(), Err(BenchError::Config(_))));

        let mut config = BenchConfig::default();
        config.regression_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = BenchConfig::default();
        config.defaults.iterations = 0;
        assert!(config.validate().is_err());
    }
}
