//! Periodic regression monitoring

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    regression::{RegressionDetector, RegressionFinding},
    runner::{BenchmarkCase, BenchmarkRunner, BenchmarkSuiteResult},
};

/// Result of one monitoring cycle
#[derive(Debug, Clone)]
pub struct MonitorCycle {
    pub suite: BenchmarkSuiteResult,
    /// Regressions only, keyed by benchmark name
    pub regressions: Vec<(String, RegressionFinding)>,
}

impl MonitorCycle {
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

/// Re-runs a suite on a fixed interval and checks each run against the
/// stored baselines
pub struct RegressionMonitor {
    runner: BenchmarkRunner,
    detector: RegressionDetector,
    suite_name: String,
    cases: Vec<BenchmarkCase>,
    interval: Duration,
}

impl RegressionMonitor {
    pub fn new(
        runner: BenchmarkRunner,
        detector: RegressionDetector,
        suite_name: impl Into<String>,
        cases: Vec<BenchmarkCase>,
        interval: Duration,
    ) -> Self {
        Self {
            runner,
            detector,
            suite_name: suite_name.into(),
            cases,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the suite once and collect regressions
    pub async fn run_once(&self) -> MonitorCycle {
        let suite = self.runner.run_suite(&self.suite_name, &self.cases).await;

        let mut regressions = Vec::new();
        for result in suite.results.iter().filter(|r| r.success) {
            for finding in self.detector.detect(result) {
                if finding.is_regression {
                    regressions.push((result.name.clone(), finding));
                }
            }
        }

        if regressions.is_empty() {
            info!(suite = %self.suite_name, "No performance regressions");
        } else {
            warn!(
                suite = %self.suite_name,
                regressions = regressions.len(),
                "Performance regressions found"
            );
        }

        MonitorCycle { suite, regressions }
    }

    /// Run cycles until `cancel` fires. The first cycle starts immediately.
    /// Returns the number of completed cycles.
    pub async fn run<F>(&self, cancel: CancellationToken, mut on_cycle: F) -> usize
    where
        F: FnMut(&MonitorCycle),
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let cycle = self.run_once().await;
                    cycles += 1;
                    on_cycle(&cycle);
                }
            }
        }

        info!(suite = %self.suite_name, cycles, "Regression monitor stopped");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    use super::*;
    use crate::{
        memory::NullProbe,
        runner::BenchmarkConfig,
        store::{tests::result, BenchmarkStore},
        workload::workload,
    };

    fn sleeper(delay_ms: Arc<AtomicU64>) -> BenchmarkCase {
        let work = workload(move || {
            let delay = Duration::from_millis(delay_ms.load(Ordering::SeqCst));
            async move {
                time::sleep(delay).await;
                Ok::<_, anyhow::Error>(())
            }
        });
        BenchmarkCase::new(
            "render",
            work,
            BenchmarkConfig::default().with_iterations(3).with_warmup(0),
        )
    }

    fn monitor(delay_ms: Arc<AtomicU64>, store: BenchmarkStore) -> RegressionMonitor {
        let runner = BenchmarkRunner::new(store.clone()).with_probe(Arc::new(NullProbe));
        RegressionMonitor::new(
            runner,
            RegressionDetector::new(store),
            "monitor",
            vec![sleeper(delay_ms)],
            Duration::from_secs(60),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_reports_regression() {
        let store = BenchmarkStore::default();
        store.set_baseline(result("render", 10.0));
        let delay = Arc::new(AtomicU64::new(20));

        let cycle = monitor(delay, store).run_once().await;

        assert!(cycle.suite.all_passed());
        assert!(cycle.has_regressions());
        assert!(cycle.regressions.iter().all(|(name, _)| name == "render"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let store = BenchmarkStore::default();
        store.set_baseline(result("render", 12.0));
        let delay = Arc::new(AtomicU64::new(10));
        let monitor = monitor(delay.clone(), store.clone());

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let mut flagged = Vec::new();

        let cycles = monitor
            .run(cancel, |cycle| {
                flagged.push(cycle.has_regressions());
                // Slow down from the second cycle on
                delay.store(25, Ordering::SeqCst);
                if flagged.len() == 3 {
                    stop.cancel();
                }
            })
            .await;

        assert_eq!(cycles, 3);
        assert_eq!(flagged, vec![false, true, true]);
        assert_eq!(store.history("render").len(), 3);
    }
}
