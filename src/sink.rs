//! Result sinks: hand per-scenario results to the reporting layer.
//!
//! Every record gets a number from an explicit [`SequenceNumber`] service owned by
//! the sink, so file names never collide even when several sinks share one output
//! directory through a cloned `Arc<SequenceNumber>`.

use crate::aggregator::AggregatedMetrics;
use crate::error::BenchResult;
use crate::sample_log;
use crate::validator::{SuiteOutcome, ValidationOutcome};
use crate::window::RawSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Monotonic record counter.
#[derive(Debug, Default)]
pub struct SequenceNumber {
    next: AtomicU64,
}

impl SequenceNumber {
    /// Counter whose first number is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Take the next number.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The number the next call to [`next`](Self::next) returns.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// One scenario's results as handed to a sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    /// Number assigned by the sink
    pub sequence: u64,
    /// Wall-clock time the record was stored
    pub recorded_at: DateTime<Utc>,
    /// Scenario name as configured
    pub scenario: String,
    /// Absent when the scenario's window could not be aggregated
    pub metrics: Option<AggregatedMetrics>,
    /// Verdict and per-check detail
    pub outcome: ValidationOutcome,
}

/// Destination for per-scenario results.
pub trait ResultSink: Send {
    /// Store one scenario's metrics and outcome, returning the assigned sequence number.
    fn record(
        &mut self,
        metrics: Option<&AggregatedMetrics>,
        outcome: &ValidationOutcome,
    ) -> BenchResult<u64>;

    /// Store every scenario of a suite in outcome order.
    fn record_suite(
        &mut self,
        metrics: &HashMap<String, AggregatedMetrics>,
        suite: &SuiteOutcome,
    ) -> BenchResult<()> {
        for outcome in &suite.outcomes {
            self.record(metrics.get(&outcome.scenario), outcome)?;
        }
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    sequence: SequenceNumber,
    records: Vec<ScenarioRecord>,
}

impl MemorySink {
    /// Empty sink numbering from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records in the order they were stored.
    pub fn records(&self) -> &[ScenarioRecord] {
        &self.records
    }
}

impl ResultSink for MemorySink {
    fn record(
        &mut self,
        metrics: Option<&AggregatedMetrics>,
        outcome: &ValidationOutcome,
    ) -> BenchResult<u64> {
        let sequence = self.sequence.next();
        self.records.push(ScenarioRecord {
            sequence,
            recorded_at: Utc::now(),
            scenario: outcome.scenario.clone(),
            metrics: metrics.cloned(),
            outcome: outcome.clone(),
        });
        Ok(sequence)
    }
}

/// Writes `<seq>_<scenario>.json` files into an output directory.
#[derive(Debug)]
pub struct JsonFileSink {
    dir: PathBuf,
    sequence: Arc<SequenceNumber>,
}

impl JsonFileSink {
    /// Create the sink, creating `dir` if needed.
    pub fn create(dir: impl Into<PathBuf>) -> BenchResult<Self> {
        Self::with_sequence(dir, Arc::new(SequenceNumber::default()))
    }

    /// Create a sink drawing numbers from a shared counter.
    pub fn with_sequence(dir: impl Into<PathBuf>, sequence: Arc<SequenceNumber>) -> BenchResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, sequence })
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save raw samples as `<seq>_<name>.txt` in the sample log format.
    pub fn write_samples(&self, name: &str, samples: &[RawSample]) -> BenchResult<PathBuf> {
        let path = self.path_for(self.sequence.next(), name, "txt");
        sample_log::write_file(&path, samples)?;
        info!(path = %path.display(), samples = samples.len(), "raw samples written");
        Ok(path)
    }

    fn path_for(&self, sequence: u64, name: &str, extension: &str) -> PathBuf {
        let name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{sequence:04}_{name}.{extension}"))
    }
}

impl ResultSink for JsonFileSink {
    fn record(
        &mut self,
        metrics: Option<&AggregatedMetrics>,
        outcome: &ValidationOutcome,
    ) -> BenchResult<u64> {
        let sequence = self.sequence.next();
        let record = ScenarioRecord {
            sequence,
            recorded_at: Utc::now(),
            scenario: outcome.scenario.clone(),
            metrics: metrics.cloned(),
            outcome: outcome.clone(),
        };
        let path = self.path_for(sequence, &outcome.scenario, "json");
        std::fs::write(&path, serde_json::to_string_pretty(&record)?)?;
        debug!(path = %path.display(), scenario = %outcome.scenario, "result written");
        Ok(sequence)
    }
}
