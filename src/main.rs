//! CLI Entry Point for power_bench
//!
//! Provides command-line interface for:
//! - Analyzing a recorded raw sample log against the configured windows and criteria
//! - Simulating a full acquisition cycle against the mock monitor, including link failures
//!
//! # Usage
//!
//! ```bash
//! power_bench analyze --config config/power_bench.toml --samples raw.txt --output results/
//! power_bench simulate --config config/power_bench.toml --fail-first 2 --seed 7
//! ```
//!
//! The exit status is non-zero unless every scenario passes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use power_bench::acquisition::{cancel_pair, AcquisitionEngine};
use power_bench::config::BenchConfig;
use power_bench::hardware::{FaultPlan, MockDevice, MockMonitor};
use power_bench::logging::{self, OutputFormat, TracingConfig};
use power_bench::sink::{JsonFileSink, ResultSink};
use power_bench::validator::{validate_all, SuiteOutcome};
use power_bench::window::{segment_partial, MeasurementWindow, RawSample};
use power_bench::{sample_log, AggregatedMetrics};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "power_bench")]
#[command(about = "Power measurement acquisition and threshold validation", long_about = None)]
struct Cli {
    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a recorded raw sample log
    Analyze {
        /// Bench configuration file
        #[arg(long)]
        config: PathBuf,

        /// Raw sample log ("<t>s <amps>" per line)
        #[arg(long)]
        samples: PathBuf,

        /// Directory for per-scenario JSON results
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run an acquisition cycle against the mock monitor
    Simulate {
        /// Bench configuration file
        #[arg(long)]
        config: PathBuf,

        /// Drop the monitor link on the first N measurements
        #[arg(long, default_value_t = 0)]
        fail_first: u32,

        /// Seed for the simulated noise
        #[arg(long)]
        seed: Option<u64>,

        /// Simulated base current in amps
        #[arg(long, default_value_t = 0.2)]
        current: f64,

        /// Simulated noise amplitude in amps
        #[arg(long, default_value_t = 0.01)]
        noise: f64,

        /// Directory for raw samples and per-scenario JSON results
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let format: OutputFormat = cli.log_format.parse()?;

    let suite = match cli.command {
        Commands::Analyze {
            config,
            samples,
            output,
        } => {
            let config = load_config(&config, format)?;
            analyze(&config, &samples, output.as_deref())?
        }
        Commands::Simulate {
            config,
            fail_first,
            seed,
            current,
            noise,
            output,
        } => {
            let config = load_config(&config, format)?;
            let mut monitor = MockMonitor::new(current)
                .with_noise(noise)
                .with_plan(FaultPlan::fail_first(fail_first));
            if let Some(seed) = seed {
                monitor = monitor.with_seed(seed);
            }
            simulate(&config, monitor, output.as_deref()).await?
        }
    };

    for outcome in &suite.outcomes {
        println!("{}", outcome.summary());
    }
    println!("verdict: {}", suite.verdict);

    Ok(if suite.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn load_config(path: &Path, format: OutputFormat) -> Result<BenchConfig> {
    let config = BenchConfig::load_from(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    config.validate()?;
    let level = logging::parse_log_level(&config.application.log_level)?;
    logging::init(TracingConfig::new(level).with_format(format))?;
    info!(name = %config.application.name, path = %path.display(), "configuration loaded");
    Ok(config)
}

fn analyze(config: &BenchConfig, samples: &Path, output: Option<&Path>) -> Result<SuiteOutcome> {
    let samples = sample_log::read_file(samples)
        .with_context(|| format!("reading sample log {}", samples.display()))?;
    info!(samples = samples.len(), "sample log parsed");

    let span_ms = samples.last().map_or(0.0, |s| s.timestamp_sec * 1000.0);
    let windows = windows_or_full_run(config, span_ms);
    let mut sink = output.map(JsonFileSink::create).transpose()?;
    evaluate(config, &samples, &windows, sink.as_mut())
}

async fn simulate(
    config: &BenchConfig,
    monitor: MockMonitor,
    output: Option<&Path>,
) -> Result<SuiteOutcome> {
    let request = config.measurement.request();
    let mut engine = AcquisitionEngine::new(
        monitor,
        MockDevice::new(),
        config.acquisition.clone(),
        config.monitor,
    );

    let (handle, cancel) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, canceling acquisition");
            handle.cancel();
        }
    });

    let acquisition = engine.acquire_with_cancel(&request, cancel).await?;
    info!(
        samples = acquisition.samples.len(),
        attempts = acquisition.report.attempts.len(),
        recovery_cycles = acquisition.report.recovery_cycles,
        backoff_sleeps = acquisition.report.backoff_sleeps,
        "acquisition complete"
    );

    let mut sink = output.map(JsonFileSink::create).transpose()?;
    if let Some(sink) = sink.as_ref() {
        sink.write_samples("raw", &acquisition.samples)?;
    }
    let span_ms = (request.duration_sec + request.offset_sec) * 1000.0;
    let windows = windows_or_full_run(config, span_ms);
    evaluate(config, &acquisition.samples, &windows, sink.as_mut())
}

/// Configured windows, or a single `full_run` window covering `[0, span_ms]`.
fn windows_or_full_run(config: &BenchConfig, span_ms: f64) -> Vec<MeasurementWindow> {
    if config.windows.is_empty() {
        vec![MeasurementWindow::new("full_run", 0.0, span_ms)]
    } else {
        config.windows.clone()
    }
}

fn evaluate(
    config: &BenchConfig,
    samples: &[RawSample],
    windows: &[MeasurementWindow],
    sink: Option<&mut JsonFileSink>,
) -> Result<SuiteOutcome> {
    let mut metrics: HashMap<String, AggregatedMetrics> = HashMap::new();
    for (scenario, result) in segment_partial(samples, windows, config.monitor.voltage)? {
        match result {
            Ok(m) => {
                metrics.insert(scenario, m);
            }
            Err(err) => error!(scenario = %scenario, error = %err, "scenario window unusable"),
        }
    }

    let suite = validate_all(&metrics, &config.criteria);
    if let Some(sink) = sink {
        sink.record_suite(&metrics, &suite)?;
        info!(dir = %sink.dir().display(), "results written");
    }
    Ok(suite)
}
