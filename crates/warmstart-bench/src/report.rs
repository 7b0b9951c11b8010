//! Human-readable and JSON reports

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warmstart_preload::{MetricSample, MetricsStore, SampleOutcome};

use crate::{
    regression::{RegressionDetector, RegressionFinding},
    runner::{BenchmarkResult, BenchmarkSuiteResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    Pass,
    Warn,
    Fail,
}

impl SectionStatus {
    fn marker(&self) -> &'static str {
        match self {
            SectionStatus::Pass => "✅ PASS",
            SectionStatus::Warn => "⚠️  WARN",
            SectionStatus::Fail => "❌ FAIL",
        }
    }
}

/// One benchmark's entry in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub result: BenchmarkResult,
    pub baseline: Option<BenchmarkResult>,
    pub findings: Vec<RegressionFinding>,
}

impl ReportSection {
    pub fn status(&self) -> SectionStatus {
        if !self.result.success {
            SectionStatus::Fail
        } else if self.findings.iter().any(|f| f.is_regression) {
            SectionStatus::Warn
        } else {
            SectionStatus::Pass
        }
    }
}

/// Rendered view of a suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub total_time_ms: f64,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub sections: Vec<ReportSection>,
    pub metrics: Vec<MetricSample>,
}

impl SuiteReport {
    pub fn has_regressions(&self) -> bool {
        self.sections
            .iter()
            .any(|s| s.findings.iter().any(|f| f.is_regression))
    }

    /// Every regression finding with its benchmark name
    pub fn regressions(&self) -> Vec<(&str, &RegressionFinding)> {
        self.sections
            .iter()
            .flat_map(|s| {
                s.findings
                    .iter()
                    .filter(|f| f.is_regression)
                    .map(move |f| (s.result.name.as_str(), f))
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds reports from suite results, baselines and load metrics
#[derive(Clone)]
pub struct ReportGenerator {
    detector: RegressionDetector,
    metrics: Option<MetricsStore>,
}

impl ReportGenerator {
    pub fn new(detector: RegressionDetector) -> Self {
        Self {
            detector,
            metrics: None,
        }
    }

    /// Include a metrics store section
    pub fn with_metrics(mut self, metrics: MetricsStore) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn generate(&self, suite: &BenchmarkSuiteResult) -> SuiteReport {
        let sections = suite
            .results
            .iter()
            .map(|result| ReportSection {
                result: result.clone(),
                baseline: self.detector.store().baseline(&result.name),
                findings: self.detector.detect(result),
            })
            .collect();

        SuiteReport {
            suite: suite.name.clone(),
            run_id: suite.run_id,
            timestamp: suite.timestamp,
            total_time_ms: suite.total_time_ms,
            passed_tests: suite.passed_tests,
            failed_tests: suite.failed_tests,
            sections,
            metrics: self.metrics.as_ref().map(MetricsStore::all).unwrap_or_default(),
        }
    }

    /// Render straight to text
    pub fn render(&self, suite: &BenchmarkSuiteResult) -> String {
        self.generate(suite).to_string()
    }
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Benchmark Suite: {} ===", self.suite)?;
        writeln!(f, "Run: {} at {}", self.run_id, self.timestamp.to_rfc3339())?;
        writeln!(
            f,
            "Total: {:.2}ms  Passed: {}  Failed: {}",
            self.total_time_ms, self.passed_tests, self.failed_tests
        )?;

        for section in &self.sections {
            let r = &section.result;
            writeln!(f)?;
            writeln!(f, "{} {}", section.status().marker(), r.name)?;
            writeln!(f, "  Iterations: {}", r.iterations)?;
            writeln!(
                f,
                "  Average: {:.3}ms  Min: {:.3}ms  Max: {:.3}ms  StdDev: {:.3}ms",
                r.average_time_ms, r.min_time_ms, r.max_time_ms, r.std_dev_ms
            )?;
            writeln!(f, "  Throughput: {:.1} ops/s", r.ops_per_second)?;
            writeln!(
                f,
                "  Memory: before {:.1}MB, after {:.1}MB, peak {:.1}MB",
                megabytes(r.memory.before),
                megabytes(r.memory.after),
                megabytes(r.memory.peak)
            )?;

            if let Some(error) = &r.error {
                writeln!(f, "  Error: {error}")?;
            }

            match &section.baseline {
                None => writeln!(f, "  Baseline: none")?,
                Some(baseline) => {
                    writeln!(f, "  Baseline: {}", baseline.timestamp.to_rfc3339())?;
                    if section.findings.is_empty() {
                        writeln!(f, "    ✅ within threshold")?;
                    }
                    for finding in &section.findings {
                        let marker = if finding.is_regression { "⚠️ " } else { "✅" };
                        writeln!(
                            f,
                            "    {} {} {:+.2}% ({:.3} -> {:.3}) [{}]",
                            marker,
                            finding.metric,
                            finding.change_percent,
                            finding.baseline,
                            finding.current,
                            finding.severity
                        )?;
                    }
                }
            }
        }

        if !self.metrics.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Load Metrics ===")?;
            for sample in &self.metrics {
                let outcome = match sample.outcome {
                    SampleOutcome::Success => "ok",
                    SampleOutcome::Failure => "failed",
                };
                writeln!(
                    f,
                    "  {:<40} {:>10.3}ms  {}",
                    sample.key, sample.elapsed_ms, outcome
                )?;
            }
        }

        Ok(())
    }
}
