//! Telemetry Analyzer: spectral statistics over stored sensor batches
//!
//! Irregularly sampled traffic-sensor records are resampled onto a uniform
//! grid, normalized and transformed, and the per-metric statistics are
//! written back next to the batch they came from.
//!
//! ## Architecture
//!
//! - **Processing**: resampler and spectral analyzer (`processing`)
//! - **Storage**: key-value backends, Redis in production (`storage`)
//! - **Pipeline**: batch processor, scheduler and run-state controller (`pipeline`)
//! - **API**: `POST /run` / `GET /status` for service mode (`api`)

pub mod api;
pub mod config;
pub mod pipeline;
pub mod processing;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::{AppConfig, ConfigError, ExecutionMode};

// Re-export commonly used types
pub use types::{Metric, ResultRecord, RunState, Stats};

// Re-export pipeline components
pub use pipeline::{
    BatchOutcome, BatchProcessor, PassSummary, RunStateController, Scheduler, SchedulerError,
    SchedulerOptions, TriggerOutcome,
};

// Re-export storage
pub use storage::{InMemoryStore, KeyValueStore, RedisStore, StoreError};
