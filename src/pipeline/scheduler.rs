//! Pipeline Scheduler
//!
//! One pass = enumerate batch keys, then run the [`BatchProcessor`] over each
//! of them, either one at a time or on a bounded rayon pool.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

use super::batch::{BatchOutcome, BatchProcessor};
use crate::config::AppConfig;
use crate::storage::{KeyValueStore, StoreError};

/// Errors that end a pass early
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to enumerate batch keys: {0}")]
    Enumeration(#[source] StoreError),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// How batches are dispatched within a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
    /// Glob selecting batch keys
    pub key_pattern: String,
    /// Suffix of result keys, excluded from the batch list
    pub result_suffix: String,
    /// Process on a worker pool instead of sequentially
    pub threaded: bool,
    /// Worker pool size
    pub core_count: usize,
    /// Spectrum magnitudes kept per metric
    pub spectrum_bins: usize,
}

impl From<&AppConfig> for SchedulerOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            key_pattern: config.store.key_pattern.clone(),
            result_suffix: config.store.result_suffix.clone(),
            threaded: config.workers.threaded,
            core_count: config.workers.core_count,
            spectrum_bins: config.analysis.spectrum_bins,
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Counts for one completed pass.
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    /// Batch keys found (result keys excluded)
    pub found: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl PassSummary {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            found: 0,
            written: 0,
            skipped: 0,
            failed: 0,
            elapsed: Duration::ZERO,
        }
    }

    fn record(&mut self, outcome: &BatchOutcome) {
        match outcome {
            BatchOutcome::Written { .. } => self.written += 1,
            BatchOutcome::Skipped(_) => self.skipped += 1,
            BatchOutcome::Failed(_) => self.failed += 1,
        }
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Runs analysis passes over every batch in the store.
pub struct Scheduler {
    store: Arc<dyn KeyValueStore>,
    processor: BatchProcessor,
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(store: Arc<dyn KeyValueStore>, options: SchedulerOptions) -> Self {
        let processor =
            BatchProcessor::new(store.clone(), &options.result_suffix, options.spectrum_bins);
        Self {
            store,
            processor,
            options,
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Current batch keys, in store order, without result keys.
    pub fn batch_keys(&self) -> Result<Vec<String>, StoreError> {
        let keys = self.store.list_keys(&self.options.key_pattern)?;
        Ok(keys
            .into_iter()
            .filter(|k| !self.processor.is_result_key(k))
            .collect())
    }

    /// Run one full pass. Blocks until every batch has been processed.
    ///
    /// # Errors
    /// Only if the key listing fails or the worker pool cannot be built;
    /// individual batch failures are counted in the summary instead.
    pub fn run_pass(&self) -> Result<PassSummary, SchedulerError> {
        let started = Instant::now();
        let mut summary = PassSummary::new(Utc::now());

        let keys = self.batch_keys().map_err(|e| {
            error!(
                backend = self.store.backend_name(),
                error = %e,
                "Key enumeration failed, aborting pass"
            );
            SchedulerError::Enumeration(e)
        })?;
        summary.found = keys.len();

        if keys.is_empty() {
            info!(pattern = %self.options.key_pattern, "No batches found");
            summary.elapsed = started.elapsed();
            return Ok(summary);
        }

        info!(
            batches = keys.len(),
            threaded = self.options.threaded,
            workers = self.worker_count(),
            "Starting analysis pass"
        );

        let outcomes = if self.options.threaded {
            self.run_parallel(&keys)?
        } else {
            keys.iter().map(|k| self.processor.process(k)).collect()
        };

        for outcome in &outcomes {
            summary.record(outcome);
        }
        summary.elapsed = started.elapsed();

        info!(
            found = summary.found,
            written = summary.written,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Analysis pass complete"
        );
        Ok(summary)
    }

    fn worker_count(&self) -> usize {
        if self.options.threaded {
            self.options.core_count.max(1)
        } else {
            1
        }
    }

    fn run_parallel(&self, keys: &[String]) -> Result<Vec<BatchOutcome>, SchedulerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count())
            .thread_name(|i| format!("batch-worker-{i}"))
            .build()
            .map_err(|e| SchedulerError::WorkerPool(e.to_string()))?;

        Ok(pool.install(|| {
            keys.par_iter()
                .map(|k| self.processor.process(k))
                .collect()
        }))
    }
}
