//! Pipeline Regression Tests
//!
//! End-to-end scenarios through `Scheduler` and `RunStateController` with the
//! in-memory store standing in for Redis. Asserts on the stored result
//! records exactly as a downstream consumer would read them.

use serde_json::{json, Value};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use telemetry_analyzer::pipeline::{
    BatchOutcome, BatchProcessor, RunStateController, Scheduler, SchedulerError, SchedulerOptions,
    TriggerOutcome,
};
use telemetry_analyzer::storage::{InMemoryStore, KeyValueStore};
use telemetry_analyzer::types::{ResultRecord, RunState};

fn store_batch(store: &InMemoryStore, key: &str, records: &[Value]) {
    store
        .set(key, serde_json::to_string(records).unwrap().as_bytes())
        .unwrap();
}

fn read_result(store: &InMemoryStore, key: &str) -> ResultRecord {
    let bytes = store
        .get(&format!("{key}_processed"))
        .unwrap()
        .expect("result record written");
    serde_json::from_slice(&bytes).unwrap()
}

/// 50 records, 1 s apart, vehicle_count = 10 + 5 sin(2 pi 0.1 t).
fn sine_batch() -> Vec<Value> {
    (0..50)
        .map(|i| {
            let t = 1_700_000_000.0 + i as f64;
            json!({
                "sensor_id": 1001,
                "timestamp": t,
                "vehicle_count": 10.0 + 5.0 * (2.0 * PI * 0.1 * i as f64).sin(),
                "avg_speed": 60.0,
                "occupancy": 20.0 + i as f64,
            })
        })
        .collect()
}

async fn wait_for_done(controller: &RunStateController) {
    for _ in 0..500 {
        if controller.status() == RunState::Done {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("pass did not finish, state {}", controller.status());
}

/// Scenario A: a single record leaves every metric undefined, but the result
/// record is still written with all three metrics present.
#[test]
fn test_single_record_batch_written_undefined() {
    let store = Arc::new(InMemoryStore::new());
    store_batch(
        &store,
        "telemetry_0_1",
        &[json!({"timestamp": 1.0, "vehicle_count": 4, "avg_speed": 50.0, "occupancy": 10.0})],
    );

    let summary = Scheduler::new(store.clone(), SchedulerOptions::default())
        .run_pass()
        .unwrap();
    assert_eq!(summary.written, 1);

    let bytes = store.get("telemetry_0_1_processed").unwrap().unwrap();
    let raw: Value = serde_json::from_slice(&bytes).unwrap();
    let metrics = raw.as_object().unwrap();
    assert_eq!(metrics.len(), 3);
    for (name, stats) in metrics {
        for field in ["dominant_freq_hz", "mean", "std_dev", "min", "max"] {
            assert!(stats[field].is_null(), "{name}.{field} should be null");
        }
        assert_eq!(stats["spectrum"], json!([]), "{name}.spectrum");
    }
}

/// Scenario B: a clean 0.1 Hz sine is recovered within one bin.
#[test]
fn test_sine_batch_dominant_frequency() {
    let store = Arc::new(InMemoryStore::new());
    store_batch(&store, "telemetry_0_1", &sine_batch());

    Scheduler::new(store.clone(), SchedulerOptions::default())
        .run_pass()
        .unwrap();

    let result = read_result(&store, "telemetry_0_1");
    let vehicles = &result.metrics["vehicle_count"];
    let bin_width = 1.0 / (1.0 * 50.0);
    let peak = vehicles.dominant_freq_hz.unwrap();
    assert!((peak - 0.1).abs() <= bin_width, "peak {peak}");
    assert!((vehicles.mean.unwrap() - 10.0).abs() < 1e-6);
    assert_eq!(vehicles.spectrum.len(), 10);

    let speed = &result.metrics["avg_speed"];
    assert_eq!(speed.std_dev, Some(0.0));
    assert_eq!(speed.mean, Some(60.0));

    let occupancy = &result.metrics["occupancy"];
    assert_eq!(occupancy.min, Some(20.0));
    assert_eq!(occupancy.max, Some(69.0));
}

/// Scenario C: an empty store is a completed no-op pass.
#[tokio::test]
async fn test_empty_store_pass_reaches_done() {
    let store = Arc::new(InMemoryStore::new());
    let scheduler = Arc::new(Scheduler::new(store.clone(), SchedulerOptions::default()));
    let controller = Arc::new(RunStateController::new());

    assert_eq!(controller.trigger(scheduler), TriggerOutcome::Started);
    wait_for_done(&controller).await;

    let summary = controller.last_pass().unwrap();
    assert_eq!(summary.found, 0);
    assert_eq!(summary.written, 0);
    assert!(store.is_empty());
}

/// A listing failure aborts the pass but still completes the transition.
#[tokio::test]
async fn test_enumeration_failure_still_done() {
    let store = Arc::new(InMemoryStore::new());
    store_batch(&store, "telemetry_0_1", &sine_batch());
    store.set_unavailable(true);

    let scheduler = Arc::new(Scheduler::new(store.clone(), SchedulerOptions::default()));
    assert!(matches!(scheduler.run_pass(), Err(SchedulerError::Enumeration(_))));

    let controller = Arc::new(RunStateController::new());
    controller.trigger(scheduler);
    wait_for_done(&controller).await;
    assert!(controller.last_pass().is_none());

    store.set_unavailable(false);
    assert!(store.get("telemetry_0_1_processed").unwrap().is_none());
}

/// Re-processing an unchanged batch yields byte-identical output.
#[test]
fn test_reprocessing_is_byte_identical() {
    let store = Arc::new(InMemoryStore::new());
    store_batch(&store, "telemetry_0_1", &sine_batch());
    let processor = BatchProcessor::new(store.clone(), "_processed", 10);

    assert!(processor.process("telemetry_0_1").is_written());
    let first = store.get("telemetry_0_1_processed").unwrap().unwrap();
    assert!(processor.process("telemetry_0_1").is_written());
    let second = store.get("telemetry_0_1_processed").unwrap().unwrap();

    assert_eq!(first, second);
}

/// Unordered, jittered input with junk records still produces a result.
#[test]
fn test_unsorted_batch_with_bad_records() {
    let mut records = sine_batch();
    records.reverse();
    records.push(json!({"timestamp": "yesterday", "vehicle_count": 3}));
    records.push(json!({"vehicle_count": 3}));
    records.push(json!("not a record"));

    let store = Arc::new(InMemoryStore::new());
    store_batch(&store, "telemetry_sorted", &sine_batch());
    store_batch(&store, "telemetry_shuffled", &records);

    Scheduler::new(store.clone(), SchedulerOptions::default())
        .run_pass()
        .unwrap();

    assert_eq!(
        read_result(&store, "telemetry_sorted"),
        read_result(&store, "telemetry_shuffled")
    );
}

/// Parallel mode processes every key exactly once.
#[test]
fn test_parallel_pass_processes_each_key_once() {
    let store = Arc::new(InMemoryStore::new());
    for i in 0..40 {
        store_batch(&store, &format!("telemetry_{i}_0"), &sine_batch());
    }
    store.set("telemetry_broken_0", b"[1, 2,").unwrap();

    let options = SchedulerOptions {
        threaded: true,
        core_count: 8,
        ..SchedulerOptions::default()
    };
    let summary = Scheduler::new(store.clone(), options).run_pass().unwrap();

    assert_eq!(summary.found, 41);
    assert_eq!(summary.written, 40);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    // 41 inputs + 40 results
    assert_eq!(store.len(), 81);
}

/// A store failure on one key does not stop the others.
#[test]
fn test_store_failure_isolated_to_batch() {
    struct FlakyStore {
        inner: InMemoryStore,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, telemetry_analyzer::StoreError> {
            if key.contains("flaky") {
                return Err(telemetry_analyzer::StoreError::Connection("reset".into()));
            }
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &[u8]) -> Result<(), telemetry_analyzer::StoreError> {
            self.inner.set(key, value)
        }
        fn list_keys(&self, pattern: &str) -> Result<Vec<String>, telemetry_analyzer::StoreError> {
            self.inner.list_keys(pattern)
        }
        fn delete(&self, keys: &[String]) -> Result<usize, telemetry_analyzer::StoreError> {
            self.inner.delete(keys)
        }
        fn backend_name(&self) -> &'static str {
            "Flaky"
        }
    }

    let inner = InMemoryStore::new();
    store_batch(&inner, "telemetry_a", &sine_batch());
    store_batch(&inner, "telemetry_flaky", &sine_batch());
    store_batch(&inner, "telemetry_z", &sine_batch());
    let store = Arc::new(FlakyStore { inner });

    let scheduler = Scheduler::new(store.clone(), SchedulerOptions::default());
    let summary = scheduler.run_pass().unwrap();
    assert_eq!(summary.written, 2);
    assert_eq!(summary.failed, 1);

    let processor = BatchProcessor::new(store.clone(), "_processed", 10);
    assert!(matches!(processor.process("telemetry_flaky"), BatchOutcome::Failed(_)));
    assert!(store.inner.get("telemetry_z_processed").unwrap().is_some());
}
