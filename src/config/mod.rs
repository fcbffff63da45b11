//! Processor Configuration Module
//!
//! ## Loading Order
//!
//! 1. `TELEMETRY_CONFIG` environment variable (path to TOML file)
//! 2. `telemetry.toml` in the current working directory
//! 3. Built-in defaults ([`defaults`])
//!
//! Environment variables and CLI flags (`REDIS_HOST`, `REDIS_PORT`,
//! `CORE_COUNT`, `THREADED`, `MODE`, `HTTP_ADDR`) are applied last through
//! [`AppConfig::apply_overrides`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut config = AppConfig::load()?;
//! config.apply_overrides(overrides_from_cli);
//! config.validate()?;
//! ```

mod app_config;
pub mod defaults;

pub use app_config::*;
