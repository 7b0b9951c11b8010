//! Timing distribution statistics

use serde::{Deserialize, Serialize};

/// Summary of per-iteration durations, all in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub iterations: usize,
    pub total_ms: f64,
    pub average_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// Population standard deviation
    pub std_dev_ms: f64,
    pub ops_per_second: f64,
}

impl TimingStats {
    /// Summarize samples. An empty set yields all zeros, never NaN.
    pub fn from_samples(samples_ms: &[f64]) -> Self {
        if samples_ms.is_empty() {
            return Self::default();
        }

        let n = samples_ms.len() as f64;
        let total_ms: f64 = samples_ms.iter().sum();
        let average_ms = total_ms / n;
        let min_ms = samples_ms.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ms = samples_ms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance = samples_ms
            .iter()
            .map(|t| (t - average_ms).powi(2))
            .sum::<f64>()
            / n;
        let ops_per_second = if average_ms > 0.0 {
            1000.0 / average_ms
        } else {
            0.0
        };

        Self {
            iterations: samples_ms.len(),
            total_ms,
            average_ms,
            min_ms,
            max_ms,
            std_dev_ms: variance.sqrt(),
            ops_per_second,
        }
    }
}
