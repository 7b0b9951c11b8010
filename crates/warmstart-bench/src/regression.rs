//! Performance regression detection against stored baselines

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{runner::BenchmarkResult, store::BenchmarkStore};

/// Default relative change that counts as significant
pub const DEFAULT_THRESHOLD: f64 = 0.10;

/// Metrics compared against the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AverageTime,
    PeakMemory,
    OpsPerSecond,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::AverageTime, Metric::PeakMemory, Metric::OpsPerSecond];

    pub fn value(&self, result: &BenchmarkResult) -> f64 {
        match self {
            Metric::AverageTime => result.average_time_ms,
            Metric::PeakMemory => result.memory.peak as f64,
            Metric::OpsPerSecond => result.ops_per_second,
        }
    }

    /// Whether an increase is bad. Time and memory grow when things get
    /// worse; throughput shrinks.
    pub fn increase_is_regression(&self) -> bool {
        match self {
            Metric::AverageTime | Metric::PeakMemory => true,
            Metric::OpsPerSecond => false,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::AverageTime => "average_time",
            Metric::PeakMemory => "peak_memory",
            Metric::OpsPerSecond => "ops_per_second",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Tier for an absolute relative change (fraction, not percent)
    pub fn from_change(fraction: f64) -> Self {
        let magnitude = fraction.abs();
        if magnitude > 0.5 {
            Severity::High
        } else if magnitude > 0.2 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(name)
    }
}

/// A significant change in one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionFinding {
    pub metric: Metric,
    pub current: f64,
    pub baseline: f64,
    /// `current - baseline`
    pub change: f64,
    /// Relative change in percent
    pub change_percent: f64,
    pub is_regression: bool,
    pub severity: Severity,
}

/// Compare a result to a baseline.
///
/// A metric yields a finding only when its relative change exceeds
/// `threshold` (a fraction). Metrics whose baseline is zero are skipped.
pub fn compare(
    current: &BenchmarkResult,
    baseline: &BenchmarkResult,
    threshold: f64,
) -> Vec<RegressionFinding> {
    Metric::ALL
        .iter()
        .filter_map(|metric| {
            let now = metric.value(current);
            let then = metric.value(baseline);
            if then == 0.0 {
                return None;
            }

            let change = now - then;
            let fraction = change / then;
            if fraction.abs() <= threshold {
                return None;
            }

            let is_regression = if metric.increase_is_regression() {
                fraction > 0.0
            } else {
                fraction < 0.0
            };

            Some(RegressionFinding {
                metric: *metric,
                current: now,
                baseline: then,
                change,
                change_percent: fraction * 100.0,
                is_regression,
                severity: Severity::from_change(fraction),
            })
        })
        .collect()
}

/// Looks up baselines in a store and compares fresh results to them
#[derive(Clone)]
pub struct RegressionDetector {
    store: BenchmarkStore,
    threshold: f64,
}

impl RegressionDetector {
    pub fn new(store: BenchmarkStore) -> Self {
        Self::with_threshold(store, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(store: BenchmarkStore, threshold: f64) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn store(&self) -> &BenchmarkStore {
        &self.store
    }

    /// Findings at the configured threshold
    pub fn detect(&self, current: &BenchmarkResult) -> Vec<RegressionFinding> {
        self.detect_regression(current, self.threshold)
    }

    /// Findings for `current` against its baseline; empty when no baseline
    /// is set for its name
    pub fn detect_regression(
        &self,
        current: &BenchmarkResult,
        threshold: f64,
    ) -> Vec<RegressionFinding> {
        let Some(baseline) = self.store.baseline(&current.name) else {
            return Vec::new();
        };

        let findings = compare(current, &baseline, threshold);
        for finding in findings.iter().filter(|f| f.is_regression) {
            warn!(
                benchmark = %current.name,
                metric = %finding.metric,
                change_percent = finding.change_percent,
                severity = %finding.severity,
                "Performance regression detected"
            );
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::result;

    fn with_ops(mut r: BenchmarkResult, ops: f64) -> BenchmarkResult {
        r.ops_per_second = ops;
        r
    }

    #[test]
    fn test_slower_average_is_medium_regression() {
        let store = BenchmarkStore::default();
        store.set_baseline(result("render", 100.0));
        let detector = RegressionDetector::new(store);

        let mut current = result("render", 130.0);
        current.ops_per_second = 1000.0 / 100.0;
        let findings = detector.detect_regression(&current, 0.10);

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.metric, Metric::AverageTime);
        assert!(finding.is_regression);
        assert!((finding.change_percent - 30.0).abs() < 1e-9);
        assert!((finding.change - 30.0).abs() < 1e-9);
        assert_eq!(finding.severity, Severity::Medium);
    }

    #[test]
    fn test_throughput_drop_is_regression() {
        let baseline = with_ops(result("api", 1.0), 1000.0);
        let current = with_ops(result("api", 1.0), 700.0);

        let findings = compare(&current, &baseline, 0.10);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metric, Metric::OpsPerSecond);
        assert!(findings[0].is_regression);
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn test_improvements_are_not_regressions() {
        let baseline = result("api", 100.0);
        let current = result("api", 40.0);

        let findings = compare(&current, &baseline, 0.10);

        let time = findings.iter().find(|f| f.metric == Metric::AverageTime).unwrap();
        assert!(!time.is_regression);
        assert_eq!(time.severity, Severity::High);

        let ops = findings.iter().find(|f| f.metric == Metric::OpsPerSecond).unwrap();
        assert!(!ops.is_regression);
    }

    #[test]
    fn test_memory_growth_is_regression() {
        let mut baseline = result("mem", 10.0);
        baseline.memory.peak = 1_000;
        let mut current = result("mem", 10.0);
        current.memory.peak = 1_150;

        let findings = compare(&current, &baseline, 0.10);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].metric, Metric::PeakMemory);
        assert!(findings[0].is_regression);
        assert_eq!(findings[0].severity, Severity::Low);
    }

    #[test]
    fn test_within_threshold_is_silent() {
        let findings = compare(&result("x", 105.0), &result("x", 100.0), 0.10);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_no_baseline_returns_empty() {
        let detector = RegressionDetector::new(BenchmarkStore::default());
        assert!(detector.detect(&result("unknown", 500.0)).is_empty());
    }

    #[test]
    fn test_zero_baseline_metric_skipped() {
        // Memory probes that are unavailable record 0
        let findings = compare(&result("x", 100.0), &result("x", 100.0), 0.10);
        assert!(findings.iter().all(|f| f.metric != Metric::PeakMemory));
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(Severity::from_change(0.15), Severity::Low);
        assert_eq!(Severity::from_change(0.2), Severity::Low);
        assert_eq!(Severity::from_change(-0.21), Severity::Medium);
        assert_eq!(Severity::from_change(0.5), Severity::Medium);
        assert_eq!(Severity::from_change(0.51), Severity::High);
    }
}
