//! Command-line interface for the benchmark engine

use std::{hint::black_box, path::PathBuf, time::Duration};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::BenchConfig,
    monitor::RegressionMonitor,
    regression::RegressionDetector,
    report::ReportGenerator,
    runner::{BenchmarkCase, BenchmarkConfig, BenchmarkRunner, BenchmarkSuiteResult},
    store::BenchmarkStore,
    workload::{from_fn, workload},
};

#[derive(Parser)]
#[command(name = "warmstart-bench")]
#[command(about = "Benchmark runner and performance regression checks")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Snapshot file holding history and baselines
    #[arg(short, long, global = true, default_value = "warmstart-bench.json")]
    pub snapshot: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Synthetic workloads shipped with the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuiltinWorkload {
    /// Async sleep
    Sleep,
    /// Busy arithmetic loop
    Spin,
    /// Heap allocation
    Alloc,
}

impl BuiltinWorkload {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinWorkload::Sleep => "sleep",
            BuiltinWorkload::Spin => "spin",
            BuiltinWorkload::Alloc => "alloc",
        }
    }

    fn case(&self, args: &WorkloadArgs, config: BenchmarkConfig) -> BenchmarkCase {
        let work = match self {
            BuiltinWorkload::Sleep => {
                let delay = Duration::from_millis(args.sleep_ms);
                workload(move || async move {
                    tokio::time::sleep(delay).await;
                    Ok::<_, anyhow::Error>(())
                })
            }
            BuiltinWorkload::Spin => {
                let rounds = args.spin_rounds;
                from_fn(move || {
                    let mut acc = 0u64;
                    for i in 0..rounds {
                        acc = acc.wrapping_mul(31).wrapping_add(black_box(i));
                    }
                    black_box(acc);
                    Ok(())
                })
            }
            BuiltinWorkload::Alloc => {
                let bytes = args.alloc_bytes;
                from_fn(move || {
                    black_box(vec![1u8; bytes]);
                    Ok(())
                })
            }
        };
        BenchmarkCase::new(self.name(), work, config)
    }
}

/// Shared options for commands that execute workloads
#[derive(clap::Args, Debug, Clone)]
pub struct WorkloadArgs {
    /// Workloads to run
    #[arg(short, long, value_enum, value_delimiter = ',', default_value = "sleep,spin,alloc")]
    pub workloads: Vec<BuiltinWorkload>,

    /// Measured iterations (overrides config)
    #[arg(short, long)]
    pub iterations: Option<usize>,

    /// Warmup iterations (overrides config)
    #[arg(long)]
    pub warmup: Option<usize>,

    /// Per-iteration timeout in milliseconds (overrides config)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[arg(long, default_value = "1")]
    pub sleep_ms: u64,

    #[arg(long, default_value = "100000")]
    pub spin_rounds: u64,

    #[arg(long, default_value = "1048576")]
    pub alloc_bytes: usize,
}

impl WorkloadArgs {
    /// Apply the overrides on top of `defaults` and build one case per
    /// distinct workload
    fn cases(&self, defaults: &BenchmarkConfig) -> crate::Result<Vec<BenchmarkCase>> {
        let mut config = defaults.clone();
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(warmup) = self.warmup {
            config.warmup_iterations = warmup;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        config.validate()?;

        let mut seen = Vec::new();
        Ok(self
            .workloads
            .iter()
            .filter(|w| {
                let fresh = !seen.contains(*w);
                seen.push(**w);
                fresh
            })
            .map(|w| w.case(self, config.clone()))
            .collect())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run workloads and append the results to the snapshot
    Run {
        #[command(flatten)]
        workloads: WorkloadArgs,

        /// Suite name
        #[arg(long, default_value = "builtin")]
        suite: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report the latest stored results against their baselines
    Report {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Regression threshold as a fraction (overrides config)
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Run workloads and exit non-zero on any regression
    Check {
        #[command(flatten)]
        workloads: WorkloadArgs,

        /// Regression threshold as a fraction (overrides config)
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Promote the latest result of each name to baseline
    SetBaseline {
        /// Benchmark names (default: every stored name)
        names: Vec<String>,
    },

    /// Show the stored history for a benchmark
    Show {
        name: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-run workloads periodically until interrupted
    Monitor {
        #[command(flatten)]
        workloads: WorkloadArgs,

        /// Interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Execute a parsed command. Returns `false` when the command should exit
/// with a failure status.
pub async fn run_cli(cli: Cli) -> anyhow::Result<bool> {
    let config = BenchConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let store = BenchmarkStore::open(&cli.snapshot, config.history_capacity)
        .with_context(|| format!("opening snapshot {}", cli.snapshot.display()))?;

    match cli.command {
        Commands::Run {
            workloads,
            suite,
            json,
        } => {
            let runner = build_runner(&store);
            let cases = workloads.cases(&config.defaults)?;
            let result = runner.run_suite(&suite, &cases).await;
            store.save(&cli.snapshot)?;

            let detector =
                RegressionDetector::with_threshold(store.clone(), config.regression_threshold);
            let report = ReportGenerator::new(detector).generate(&result);
            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{report}");
            }
            Ok(result.all_passed())
        }

        Commands::Report { json, threshold } => {
            let threshold = threshold.unwrap_or(config.regression_threshold);
            let suite = latest_suite(&store);
            if suite.results.is_empty() {
                println!("No stored results in {}", cli.snapshot.display());
                return Ok(true);
            }

            let detector = RegressionDetector::with_threshold(store.clone(), threshold);
            let report = ReportGenerator::new(detector).generate(&suite);
            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{report}");
            }
            Ok(true)
        }

        Commands::Check {
            workloads,
            threshold,
        } => {
            let threshold = threshold.unwrap_or(config.regression_threshold);
            let runner = build_runner(&store);
            let cases = workloads.cases(&config.defaults)?;
            let result = runner.run_suite("check", &cases).await;
            store.save(&cli.snapshot)?;

            let detector = RegressionDetector::with_threshold(store.clone(), threshold);
            let report = ReportGenerator::new(detector).generate(&result);
            println!("{report}");

            println!("\n=== Summary ===");
            if !result.all_passed() {
                println!("❌ {} benchmark(s) failed", result.failed_tests);
                return Ok(false);
            }
            let regressions = report.regressions();
            if regressions.is_empty() {
                println!("✅ No performance regressions detected!");
                Ok(true)
            } else {
                println!("❌ Performance regressions detected:");
                for (name, finding) in regressions {
                    println!(
                        "  {}: {} {:+.2}% [{}]",
                        name, finding.metric, finding.change_percent, finding.severity
                    );
                }
                Ok(false)
            }
        }

        Commands::SetBaseline { names } => {
            let names = if names.is_empty() { store.names() } else { names };
            if names.is_empty() {
                println!("No stored results in {}", cli.snapshot.display());
                return Ok(false);
            }

            for name in &names {
                let promoted = store.promote_latest(name)?;
                println!(
                    "✅ Baseline for {} set to {:.3}ms average",
                    name, promoted.average_time_ms
                );
            }
            store.save(&cli.snapshot)?;
            Ok(true)
        }

        Commands::Show { name, json } => {
            let history = store.history(&name);
            if history.is_empty() {
                println!("No history for {name}");
                return Ok(false);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
                return Ok(true);
            }

            let baseline = store.baseline(&name);
            println!("=== History: {name} ===");
            for result in &history {
                let marker = match &baseline {
                    Some(b) if b.timestamp == result.timestamp => " (baseline)",
                    _ => "",
                };
                let status = if result.success { "✅" } else { "❌" };
                println!(
                    "{} {}  avg {:.3}ms  min {:.3}ms  max {:.3}ms  {:.1} ops/s{}",
                    status,
                    result.timestamp.to_rfc3339(),
                    result.average_time_ms,
                    result.min_time_ms,
                    result.max_time_ms,
                    result.ops_per_second,
                    marker
                );
            }
            Ok(true)
        }

        Commands::Monitor {
            workloads,
            interval,
        } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.monitor_interval());
            let detector =
                RegressionDetector::with_threshold(store.clone(), config.regression_threshold);
            let monitor = RegressionMonitor::new(
                build_runner(&store),
                detector,
                "monitor",
                workloads.cases(&config.defaults)?,
                interval,
            );

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            info!(interval_secs = interval.as_secs(), "Starting regression monitor");
            let snapshot = cli.snapshot.clone();
            let cycles = monitor
                .run(cancel, |cycle| {
                    for (name, finding) in &cycle.regressions {
                        println!(
                            "⚠️  {}: {} {:+.2}% [{}]",
                            name, finding.metric, finding.change_percent, finding.severity
                        );
                    }
                    if let Err(err) = store.save(&snapshot) {
                        tracing::error!(error = %err, "Failed to save snapshot");
                    }
                })
                .await;
            println!("Monitor stopped after {cycles} cycle(s)");
            Ok(true)
        }
    }
}

fn build_runner(store: &BenchmarkStore) -> BenchmarkRunner {
    BenchmarkRunner::new(store.clone())
}

/// Latest stored result per name, as a suite
fn latest_suite(store: &BenchmarkStore) -> BenchmarkSuiteResult {
    let results: Vec<_> = store
        .names()
        .iter()
        .filter_map(|name| store.latest(name))
        .collect();
    let passed_tests = results.iter().filter(|r| r.success).count();
    BenchmarkSuiteResult {
        run_id: Uuid::new_v4(),
        name: "latest".to_string(),
        total_time_ms: results.iter().map(|r| r.total_time_ms).sum(),
        failed_tests: results.len() - passed_tests,
        passed_tests,
        results,
        timestamp: Utc::now(),
    }
}
