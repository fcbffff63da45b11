//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Values match the deployment
//! defaults of the telemetry stack (Redis on localhost, HTTP trigger on 8000).

// ============================================================================
// Store
// ============================================================================

/// Default store host.
pub const STORE_HOST: &str = "127.0.0.1";

/// Default store port (Redis).
pub const STORE_PORT: u16 = 6379;

/// Glob selecting batch keys in the store.
pub const BATCH_KEY_PATTERN: &str = "telemetry_*";

/// Suffix appended to a batch key to form its result key.
pub const RESULT_KEY_SUFFIX: &str = "_processed";

/// Timeout for establishing a store connection (seconds).
pub const STORE_CONNECT_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Workers
// ============================================================================

/// Worker-pool size when none is configured.
pub const CORE_COUNT: usize = 1;

// ============================================================================
// Server
// ============================================================================

/// Execution-mode label used when none is configured (direct mode).
pub const EXECUTION_MODE: &str = "native_st";

/// HTTP listen address for service mode.
pub const HTTP_ADDR: &str = "0.0.0.0:8000";

// ============================================================================
// Analysis
// ============================================================================

/// Number of leading spectrum magnitudes kept per metric.
pub const SPECTRUM_PREFIX_BINS: usize = 10;

// ============================================================================
// Process
// ============================================================================

/// Exit status for an invalid configuration file (sysexits `EX_CONFIG`).
pub const EXIT_CONFIG_ERROR: u8 = 78;
