//! Telemetry Analyzer - batch spectral analysis over a Redis store
//!
//! # Usage
//!
//! ```bash
//! # One pass over every telemetry_* batch, then exit
//! MODE=native_st ./telemetry-analyzer
//!
//! # Parallel pass on 4 workers
//! MODE=native_mt THREADED=true CORE_COUNT=4 ./telemetry-analyzer
//!
//! # Service mode: POST /run to start a pass, GET /status to poll
//! MODE=serverless_st ./telemetry-analyzer
//! ```
//!
//! # Environment Variables
//!
//! - `MODE`: execution mode label (`native*`/`container*` direct, `serverless*` service)
//! - `REDIS_HOST`, `REDIS_PORT`: store address (default 127.0.0.1:6379)
//! - `CORE_COUNT`: worker pool size (default 1)
//! - `THREADED`: process batches in parallel (default false)
//! - `HTTP_ADDR`: service-mode listen address (default 0.0.0.0:8000)
//! - `TELEMETRY_CONFIG`: path to a TOML config file
//! - `RUST_LOG`: logging level (default: info)
//! - `LOG_FORMAT`: `json` for JSON log lines

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use telemetry_analyzer::api::{create_app, ServiceState};
use telemetry_analyzer::config::{defaults, AppConfig, ConfigOverrides, ExecutionMode};
use telemetry_analyzer::pipeline::{PassSummary, Scheduler, SchedulerError, SchedulerOptions};
use telemetry_analyzer::storage::{KeyValueStore, RedisStore};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "telemetry-analyzer")]
#[command(about = "Spectral analysis of telemetry batches stored in Redis")]
#[command(version)]
struct CliArgs {
    /// Execution mode label (native_st, native_mt, container_*, serverless_*)
    #[arg(long, env = "MODE")]
    mode: Option<String>,

    /// Redis host
    #[arg(long, env = "REDIS_HOST")]
    redis_host: Option<String>,

    /// Redis port
    #[arg(long, env = "REDIS_PORT")]
    redis_port: Option<u16>,

    /// Worker pool size for parallel passes
    #[arg(long, env = "CORE_COUNT")]
    core_count: Option<usize>,

    /// Process batches in parallel (true/false, yes/no, 1/0)
    #[arg(
        long,
        env = "THREADED",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    threaded: Option<bool>,

    /// Listen address in service mode
    #[arg(long, env = "HTTP_ADDR", value_name = "HOST:PORT")]
    http_addr: Option<String>,
}

impl CliArgs {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            store_host: self.redis_host,
            store_port: self.redis_port,
            core_count: self.core_count,
            threaded: self.threaded,
            mode: self.mode,
            http_addr: self.http_addr,
        }
    }
}

// ============================================================================
// Startup
// ============================================================================

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Resolve the layered configuration. Errors here are misconfiguration.
fn load_config(args: CliArgs) -> Result<AppConfig> {
    let mut config = AppConfig::load()?;
    config.apply_overrides(args.overrides());
    config.validate()?;
    Ok(config)
}

// ============================================================================
// Execution Modes
// ============================================================================

/// Run one pass to completion on the blocking pool.
async fn run_direct(scheduler: Scheduler) -> Result<()> {
    let outcome = tokio::task::spawn_blocking(move || scheduler.run_pass())
        .await
        .context("Analysis pass panicked")?;
    finish_direct(outcome)
}

/// A pass that could not list its keys still completed; only a pass that
/// could not start its workers is fatal.
fn finish_direct(outcome: Result<PassSummary, SchedulerError>) -> Result<()> {
    match outcome {
        Ok(summary) => {
            info!(
                written = summary.written,
                skipped = summary.skipped,
                failed = summary.failed,
                "Direct run finished"
            );
            Ok(())
        }
        Err(e @ SchedulerError::Enumeration(_)) => {
            error!("Direct run finished with errors: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Serve the trigger API until Ctrl+C.
async fn run_service(scheduler: Scheduler, addr: SocketAddr) -> Result<()> {
    let app = create_app(ServiceState::new(scheduler));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("HTTP server listening on {}", addr);

    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
        shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel_token.cancelled().await;
        })
        .await
        .context("HTTP server error")?;

    info!("Graceful shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::from(defaults::EXIT_CONFIG_ERROR);
        }
    };

    let store = match RedisStore::open(&config.store) {
        Ok(store) => store,
        Err(e) => {
            error!("Invalid store address: {}", e);
            return ExitCode::from(defaults::EXIT_CONFIG_ERROR);
        }
    };

    let mode = config.execution_mode();
    info!(
        mode = %mode,
        label = %config.server.mode,
        store = store.url(),
        threaded = config.workers.threaded,
        core_count = config.workers.core_count,
        "Telemetry analyzer starting"
    );

    if mode == ExecutionMode::Service {
        if let Err(e) = store.ping() {
            warn!("Store not reachable yet, runs will fail until it is: {}", e);
        }
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(store);
    let scheduler = Scheduler::new(store, SchedulerOptions::from(&config));

    let result = match mode {
        ExecutionMode::Direct => run_direct(scheduler).await,
        ExecutionMode::Service => match config.server.addr.parse::<SocketAddr>() {
            Ok(addr) => run_service(scheduler, addr).await,
            Err(e) => {
                error!("Invalid listen address {}: {}", config.server.addr, e);
                return ExitCode::from(defaults::EXIT_CONFIG_ERROR);
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Fatal: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
