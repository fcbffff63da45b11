//! Telemetry Batch Generator
//!
//! Fills the store with synthetic traffic-sensor batches for the analyzer.
//! Existing `telemetry_*` keys are deleted first.
//!
//! Two waveforms:
//! - `random`: every field drawn uniformly, ~1 s jittered spacing
//! - `sine`: 0.1 Hz oscillation on exact 1 s spacing plus Gaussian noise,
//!   so the analyzer should report a dominant frequency near 0.1 Hz
//!
//! # Usage
//! ```bash
//! ./telemetry-generator 500 8 --threaded --waveform sine
//! ./telemetry-generator 50 --dry-run --seed 7
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde_json::{json, Value};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use telemetry_analyzer::config::{defaults, StoreConfig};
use telemetry_analyzer::storage::{InMemoryStore, KeyValueStore, RedisStore};

// ============================================================================
// Record Constants
// ============================================================================

const SENSOR_IDS: [u32; 3] = [1001, 1002, 1003];
const MAX_VEHICLE_COUNT: i64 = 20;
const MAX_SPEED: f64 = 120.0;
const MAX_OCCUPANCY: f64 = 100.0;
/// Frequency of the `sine` waveform (Hz)
const SINE_FREQUENCY_HZ: f64 = 0.1;
/// Spacing between records (seconds)
const RECORD_SPACING_SECS: f64 = 1.0;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Waveform {
    Random,
    Sine,
}

#[derive(Parser, Debug)]
#[command(name = "telemetry-generator")]
#[command(about = "Synthetic telemetry batch generator for the telemetry analyzer")]
#[command(version)]
struct Args {
    /// Records per batch
    #[arg(default_value = "1000")]
    records: usize,

    /// Number of batches to generate
    #[arg(default_value = "1")]
    batches: usize,

    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = defaults::STORE_HOST)]
    redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value_t = defaults::STORE_PORT)]
    redis_port: u16,

    /// Generate batches in parallel
    #[arg(
        long,
        env = "THREADED",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value = "false",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    threaded: bool,

    /// Signal shape of the generated metrics
    #[arg(long, value_enum, default_value_t = Waveform::Random)]
    waveform: Waveform,

    /// Random seed for reproducibility (batch i uses seed + i)
    #[arg(long)]
    seed: Option<u64>,

    /// Generate into an in-memory store and print a sample instead of writing to Redis
    #[arg(long)]
    dry_run: bool,
}

// ============================================================================
// Record Generation
// ============================================================================

fn round_tenth(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round_millis(t: f64) -> f64 {
    (t * 1000.0).round() / 1000.0
}

/// One batch of `count` records starting at `start` (seconds since epoch).
fn generate_batch<R: Rng>(
    rng: &mut R,
    count: usize,
    start: f64,
    waveform: Waveform,
) -> Result<Vec<Value>> {
    let records = match waveform {
        Waveform::Random => (0..count).map(|i| random_record(rng, start, i)).collect(),
        Waveform::Sine => {
            // Zero-mean noise, 5% of each field's range
            let noise = Normal::new(0.0, 0.05).context("Invalid noise distribution")?;
            (0..count).map(|i| sine_record(rng, &noise, start, i)).collect()
        }
    };
    Ok(records)
}

fn random_record<R: Rng>(rng: &mut R, start: f64, i: usize) -> Value {
    let jitter = rng.gen_range(-0.3..0.3);
    let offset = if i == 0 { 0.0 } else { i as f64 * RECORD_SPACING_SECS + jitter };

    json!({
        "sensor_id": SENSOR_IDS[rng.gen_range(0..SENSOR_IDS.len())],
        "vehicle_count": rng.gen_range(0..=MAX_VEHICLE_COUNT),
        "avg_speed": round_tenth(rng.gen_range(0.0..MAX_SPEED)),
        "occupancy": round_tenth(rng.gen_range(0.0..MAX_OCCUPANCY)),
        "timestamp": round_millis(start + offset),
    })
}

fn sine_record<R: Rng>(rng: &mut R, noise: &Normal<f64>, start: f64, i: usize) -> Value {
    let t = i as f64 * RECORD_SPACING_SECS;
    let phase = (2.0 * PI * SINE_FREQUENCY_HZ * t).sin();
    // Each field oscillates around mid-range with 40% amplitude
    let level = |max: f64, rng: &mut R| {
        (max * (0.5 + 0.4 * phase + noise.sample(rng))).clamp(0.0, max)
    };

    let vehicles = level(MAX_VEHICLE_COUNT as f64, &mut *rng).round() as i64;
    let speed = round_tenth(level(MAX_SPEED, &mut *rng)).min(MAX_SPEED - 0.1);
    let occupancy = round_tenth(level(MAX_OCCUPANCY, &mut *rng)).min(MAX_OCCUPANCY - 0.1);

    json!({
        "sensor_id": SENSOR_IDS[rng.gen_range(0..SENSOR_IDS.len())],
        "vehicle_count": vehicles,
        "avg_speed": speed,
        "occupancy": occupancy,
        "timestamp": round_millis(start + t),
    })
}

fn rng_for_batch(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s.wrapping_add(index as u64)),
        None => StdRng::from_entropy(),
    }
}

fn now_parts() -> (f64, u128) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_millis() as f64 / 1000.0, now.as_nanos())
}

// ============================================================================
// Store Writes
// ============================================================================

fn generate_and_store(store: &dyn KeyValueStore, args: &Args, index: usize) -> Result<String> {
    let mut rng = rng_for_batch(args.seed, index);
    let (start, nanos) = now_parts();
    let batch = generate_batch(&mut rng, args.records, start, args.waveform)?;

    let key = format!("telemetry_{index}_{nanos}");
    let payload = serde_json::to_vec(&batch).context("Failed to encode batch")?;
    store
        .set(&key, &payload)
        .with_context(|| format!("Failed to store {key}"))?;

    info!(key = %key, records = args.records, "Stored batch");
    Ok(key)
}

fn clear_existing(store: &dyn KeyValueStore) -> Result<()> {
    let keys = store
        .list_keys(defaults::BATCH_KEY_PATTERN)
        .context("Failed to list existing telemetry keys")?;
    if keys.is_empty() {
        return Ok(());
    }
    let removed = store
        .delete(&keys)
        .context("Failed to delete existing telemetry keys")?;
    info!(removed, "Deleted existing telemetry keys");
    Ok(())
}

fn run(store: Arc<dyn KeyValueStore>, args: &Args) -> Result<Vec<String>> {
    clear_existing(store.as_ref())?;

    let keys = if args.threaded {
        (0..args.batches)
            .into_par_iter()
            .map(|i| generate_and_store(store.as_ref(), args, i))
            .collect::<Result<Vec<_>>>()?
    } else {
        (0..args.batches)
            .map(|i| generate_and_store(store.as_ref(), args, i))
            .collect::<Result<Vec<_>>>()?
    };

    info!(batches = keys.len(), threaded = args.threaded, "Generation done");
    Ok(keys)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    if args.dry_run {
        let memory = Arc::new(InMemoryStore::new());
        let keys = run(memory.clone(), &args)?;
        if let Some(first) = keys.first() {
            let payload = memory.get(first)?.unwrap_or_default();
            let records: Vec<Value> = serde_json::from_slice(&payload)?;
            for record in records.iter().take(3) {
                println!("{record}");
            }
        }
        return Ok(());
    }

    let config = StoreConfig {
        host: args.redis_host.clone(),
        port: args.redis_port,
        ..StoreConfig::default()
    };
    let store = RedisStore::open(&config)?;
    info!(store = store.url(), "Connecting to store");
    run(Arc::new(store), &args)?;
    Ok(())
}
