//! Shared data structures for telemetry batch analysis
//!
//! This module defines the values that flow between pipeline stages:
//! - Stage 1: raw batches (JSON arrays of sensor records, see [`RECORD_TIMESTAMP_FIELD`])
//! - Stage 2: per-metric [`Stats`] from resampling + spectral analysis
//! - Stage 3: [`ResultRecord`] persisted under `<batch-key>_processed`
//! - Run control: [`RunState`] reported by the service surface

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Raw Records
// ============================================================================

/// Name of the mandatory time field in every raw sensor record (seconds).
pub const RECORD_TIMESTAMP_FIELD: &str = "timestamp";

/// Traffic metrics analyzed for every batch.
///
/// Each variant maps to one numeric field of the raw sensor record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Vehicles counted in the sampling interval
    VehicleCount,
    /// Mean vehicle speed (km/h)
    AvgSpeed,
    /// Lane occupancy (percent)
    Occupancy,
}

impl Metric {
    /// Every tracked metric, in the order they are analyzed.
    pub const ALL: [Metric; 3] = [Metric::VehicleCount, Metric::AvgSpeed, Metric::Occupancy];

    /// Record field holding this metric's value.
    pub fn field_name(&self) -> &'static str {
        match self {
            Metric::VehicleCount => "vehicle_count",
            Metric::AvgSpeed => "avg_speed",
            Metric::Occupancy => "occupancy",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

// ============================================================================
// Analysis Output
// ============================================================================

/// Analysis output for one metric of one batch.
///
/// Every numeric field is independently `None` when the input was
/// insufficient; `None` serializes as JSON `null`, never as `0` or `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Stats {
    /// Frequency (Hz) of the strongest non-DC spectral bin
    pub dominant_freq_hz: Option<f64>,
    /// Magnitudes of the first bins of the one-sided spectrum, DC included
    pub spectrum: Vec<f64>,
    /// Mean of the uniform series
    pub mean: Option<f64>,
    /// Population standard deviation of the uniform series
    pub std_dev: Option<f64>,
    /// Minimum of the uniform series
    pub min: Option<f64>,
    /// Maximum of the uniform series
    pub max: Option<f64>,
}

impl Stats {
    /// Stats with every field undefined and an empty spectrum.
    pub fn undefined() -> Self {
        Self::default()
    }

    /// True when no field carries a value.
    pub fn is_undefined(&self) -> bool {
        self.dominant_freq_hz.is_none()
            && self.spectrum.is_empty()
            && self.mean.is_none()
            && self.std_dev.is_none()
            && self.min.is_none()
            && self.max.is_none()
    }
}

/// Combined analysis of one batch, keyed by metric field name.
///
/// Backed by a `BTreeMap` so the serialized form has a stable key order and
/// re-processing an unchanged batch yields byte-identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ResultRecord {
    pub metrics: BTreeMap<String, Stats>,
}

impl ResultRecord {
    /// Record the stats for one metric, replacing any previous entry.
    pub fn insert(&mut self, metric: Metric, stats: Stats) {
        self.metrics.insert(metric.field_name().to_string(), stats);
    }

    /// Look up the stats for one metric.
    pub fn get(&self, metric: Metric) -> Option<&Stats> {
        self.metrics.get(metric.field_name())
    }

    /// Serialize to the JSON bytes written to the store.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// ============================================================================
// Run State
// ============================================================================

/// Process-wide status of the analysis pass.
///
/// `Idle` at startup, `Processing` while a pass runs, `Done` once the most
/// recent pass finished. Never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Processing,
    Done,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Processing => "processing",
            RunState::Done => "done",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
