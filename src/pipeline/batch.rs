//! Batch Processor
//!
//! Reads one stored batch, computes [`Stats`] for every tracked metric and
//! writes the [`ResultRecord`] under `<key><result_suffix>`.
//!
//! Failures are contained here. [`BatchProcessor::process`] reports what
//! happened as a [`BatchOutcome`] and never returns an error, so one bad
//! batch cannot abort a pass.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, trace};

use crate::processing::{Sample, SignalAnalyzer};
use crate::storage::{KeyValueStore, StoreError};
use crate::types::{Metric, ResultRecord, RECORD_TIMESTAMP_FIELD};

/// Errors that leave a batch without a result
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("result encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a batch produced no result without failing
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Key vanished between listing and reading
    Missing,
    /// Payload is not valid JSON
    Malformed(String),
    /// Payload is JSON but not an array of records
    NotASequence,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Missing => write!(f, "batch not found"),
            SkipReason::Malformed(e) => write!(f, "malformed payload: {e}"),
            SkipReason::NotASequence => write!(f, "payload is not a sequence"),
        }
    }
}

/// Result of processing one batch
#[derive(Debug)]
pub enum BatchOutcome {
    /// Result record written under this key
    Written { result_key: String },
    Skipped(SkipReason),
    Failed(BatchError),
}

impl BatchOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, BatchOutcome::Written { .. })
    }
}

/// Early exit from [`BatchProcessor::try_process`]
enum Halt {
    Skip(SkipReason),
    Fail(BatchError),
}

// ============================================================================
// Record Extraction
// ============================================================================

/// Pull the `(timestamp, value)` series for `metric` out of raw records.
///
/// Records that are not objects, lack either field, hold a non-numeric value
/// or a non-finite number are skipped individually.
pub fn extract_samples(records: &[Value], metric: Metric) -> Vec<Sample> {
    let field = metric.field_name();
    records
        .iter()
        .filter_map(|record| {
            let time = finite_field(record, RECORD_TIMESTAMP_FIELD)?;
            let value = finite_field(record, field)?;
            Some(Sample::new(time, value))
        })
        .collect()
}

fn finite_field(record: &Value, field: &str) -> Option<f64> {
    let v = record.get(field)?.as_f64()?;
    if v.is_finite() {
        Some(v)
    } else {
        trace!(field, "Skipping non-finite value");
        None
    }
}

/// Compute the result record for a parsed batch. Every tracked metric is
/// present in the output, undefined when it has too few samples.
pub fn analyze_records(records: &[Value], analyzer: &mut SignalAnalyzer) -> ResultRecord {
    let mut result = ResultRecord::default();
    for metric in Metric::ALL {
        let samples = extract_samples(records, metric);
        debug!(%metric, samples = samples.len(), "Analyzing metric");
        result.insert(metric, analyzer.analyze(&samples));
    }
    result
}

/// Parse a stored payload into its records.
pub fn parse_batch(payload: &[u8]) -> Result<Vec<Value>, SkipReason> {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(_) => Err(SkipReason::NotASequence),
        Err(e) => Err(SkipReason::Malformed(e.to_string())),
    }
}

// ============================================================================
// Batch Processor
// ============================================================================

/// Processes individual batches against a store.
#[derive(Clone)]
pub struct BatchProcessor {
    store: Arc<dyn KeyValueStore>,
    result_suffix: String,
    spectrum_bins: usize,
}

impl BatchProcessor {
    pub fn new(store: Arc<dyn KeyValueStore>, result_suffix: &str, spectrum_bins: usize) -> Self {
        Self {
            store,
            result_suffix: result_suffix.to_string(),
            spectrum_bins,
        }
    }

    /// Key the result for `batch_key` is written under.
    pub fn result_key(&self, batch_key: &str) -> String {
        format!("{batch_key}{}", self.result_suffix)
    }

    /// Whether `key` names a result record rather than a batch.
    pub fn is_result_key(&self, key: &str) -> bool {
        key.ends_with(&self.result_suffix)
    }

    /// Process one batch, logging and containing every failure.
    pub fn process(&self, batch_key: &str) -> BatchOutcome {
        match self.try_process(batch_key) {
            Ok(result_key) => {
                debug!(key = %batch_key, result = %result_key, "Result written");
                BatchOutcome::Written { result_key }
            }
            Err(Halt::Skip(reason)) => {
                info!(key = %batch_key, %reason, "Skipping batch");
                BatchOutcome::Skipped(reason)
            }
            Err(Halt::Fail(e)) => {
                error!(key = %batch_key, error = %e, "Batch processing failed");
                BatchOutcome::Failed(e)
            }
        }
    }

    fn try_process(&self, batch_key: &str) -> Result<String, Halt> {
        let payload = self
            .store
            .get(batch_key)
            .map_err(|e| Halt::Fail(e.into()))?
            .ok_or(Halt::Skip(SkipReason::Missing))?;

        let records = parse_batch(&payload).map_err(Halt::Skip)?;
        trace!(key = %batch_key, records = records.len(), "Parsed batch");

        let mut analyzer = SignalAnalyzer::new(self.spectrum_bins);
        let result = analyze_records(&records, &mut analyzer);
        let bytes = result
            .to_json_bytes()
            .map_err(|e| Halt::Fail(e.into()))?;

        let result_key = self.result_key(batch_key);
        self.store
            .set(&result_key, &bytes)
            .map_err(|e| Halt::Fail(e.into()))?;

        Ok(result_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use serde_json::json;

    fn processor(store: &Arc<InMemoryStore>) -> BatchProcessor {
        BatchProcessor::new(store.clone(), "_processed", 10)
    }

    #[test]
    fn test_extract_skips_bad_records() {
        let records = vec![
            json!({"timestamp": 1.0, "avg_speed": 10.0}),
            json!({"timestamp": 2.0}),
            json!({"avg_speed": 30.0}),
            json!({"timestamp": 3.0, "avg_speed": "fast"}),
            json!({"timestamp": 4.0, "avg_speed": true}),
            json!([1, 2, 3]),
            json!({"timestamp": 5.0, "avg_speed": 50}),
        ];

        let samples = extract_samples(&records, Metric::AvgSpeed);
        assert_eq!(samples, vec![Sample::new(1.0, 10.0), Sample::new(5.0, 50.0)]);
    }

    #[test]
    fn test_parse_batch() {
        assert_eq!(parse_batch(b"[]").unwrap().len(), 0);
        assert_eq!(parse_batch(br#"{"a": 1}"#), Err(SkipReason::NotASequence));
        assert!(matches!(parse_batch(b"not json"), Err(SkipReason::Malformed(_))));
    }

    #[test]
    fn test_process_writes_every_metric() {
        let store = Arc::new(InMemoryStore::new());
        let batch = json!([
            {"timestamp": 0.0, "vehicle_count": 3, "avg_speed": 50.0},
            {"timestamp": 1.0, "vehicle_count": 5, "avg_speed": 55.0},
        ]);
        store.set("telemetry_0_1", batch.to_string().as_bytes()).unwrap();

        let outcome = processor(&store).process("telemetry_0_1");
        assert!(outcome.is_written());

        let bytes = store.get("telemetry_0_1_processed").unwrap().unwrap();
        let result: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result["vehicle_count"]["mean"], json!(4.0));
        assert_eq!(result["avg_speed"]["max"], json!(55.0));
        assert_eq!(result["occupancy"]["mean"], Value::Null);
        assert_eq!(result["occupancy"]["spectrum"], json!([]));
    }

    #[test]
    fn test_malformed_and_missing_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        store.set("telemetry_bad", b"{{{").unwrap();
        store.set("telemetry_obj", br#"{"timestamp": 1}"#).unwrap();
        let p = processor(&store);

        assert!(matches!(p.process("telemetry_bad"), BatchOutcome::Skipped(SkipReason::Malformed(_))));
        assert!(matches!(p.process("telemetry_obj"), BatchOutcome::Skipped(SkipReason::NotASequence)));
        assert!(matches!(p.process("telemetry_gone"), BatchOutcome::Skipped(SkipReason::Missing)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_out_of_range_literal_skips_batch() {
        let store = Arc::new(InMemoryStore::new());
        let payload = br#"[
            {"timestamp": 0.0, "vehicle_count": 3, "avg_speed": 50.0, "occupancy": 0.2},
            {"timestamp": 1.0, "vehicle_count": 5, "avg_speed": 1e400, "occupancy": 0.3}
        ]"#;
        store.set("telemetry_huge", payload).unwrap();
        let p = processor(&store);

        assert!(matches!(
            p.process("telemetry_huge"),
            BatchOutcome::Skipped(SkipReason::Malformed(_))
        ));
        assert!(store.get("telemetry_huge_processed").unwrap().is_none());
    }

    #[test]
    fn test_store_failure_is_contained() {
        let store = Arc::new(InMemoryStore::new());
        store.set("telemetry_0", b"[]").unwrap();
        store.set_unavailable(true);

        let outcome = processor(&store).process("telemetry_0");
        assert!(matches!(outcome, BatchOutcome::Failed(BatchError::Store(_))));
    }

    #[test]
    fn test_result_key_naming() {
        let store = Arc::new(InMemoryStore::new());
        let p = processor(&store);
        assert_eq!(p.result_key("telemetry_7_99"), "telemetry_7_99_processed");
        assert!(p.is_result_key("telemetry_7_99_processed"));
        assert!(!p.is_result_key("telemetry_7_99"));
    }
}
