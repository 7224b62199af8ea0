// # cdnrangesd - CDN IP range daemon
//
// Thin host around `cdnranges-core`: it reads configuration, starts the
// background refresh for one HTTP range source and logs what happens until
// it is told to stop. Parsing, scheduling and snapshot handling all live in
// the core crate.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `CDNRANGES_URL`: URL of the plain-text range list (default: ParsPack IPv4)
// - `CDNRANGES_CONFIG`: Path to a block-form config file, e.g.
//   `parspack { interval 2h timeout 30s }` split over lines
// - `CDNRANGES_INTERVAL`: Refresh interval, overrides the file (e.g. `90m`)
// - `CDNRANGES_TIMEOUT`: Per-fetch timeout, overrides the file (e.g. `30s`)
// - `CDNRANGES_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export CDNRANGES_INTERVAL=2h
// export CDNRANGES_TIMEOUT=30s
//
// cdnrangesd
// ```

use anyhow::{Context, Result};
use cdnranges_core::config::parse_duration;
use cdnranges_core::{CdnRanges, RefreshConfig, RefreshEvent};
use cdnranges_http::{HttpRangeSource, HttpSourceConfig, PARSPACK_IPV4_URL};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    source: HttpSourceConfig,
    config_path: Option<String>,
    interval: Option<String>,
    timeout: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            source: HttpSourceConfig {
                url: non_empty("CDNRANGES_URL").unwrap_or_else(|| PARSPACK_IPV4_URL.to_string()),
                ..HttpSourceConfig::default()
            },
            config_path: non_empty("CDNRANGES_CONFIG"),
            interval: non_empty("CDNRANGES_INTERVAL"),
            timeout: non_empty("CDNRANGES_TIMEOUT"),
            log_level: non_empty("CDNRANGES_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.source
            .validate()
            .context("CDNRANGES_URL is not usable")?;

        if self.source.url.starts_with("http://") {
            eprintln!(
                "WARNING: CDNRANGES_URL uses HTTP (not HTTPS). \
                 The range list can be tampered with in transit."
            );
        }

        self.refresh_config()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "CDNRANGES_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the refresh settings: file first, then environment overrides
    fn refresh_config(&self) -> Result<RefreshConfig> {
        let mut config = match &self.config_path {
            Some(path) => RefreshConfig::from_block_file(path)
                .with_context(|| format!("failed to load CDNRANGES_CONFIG from {}", path))?,
            None => RefreshConfig::default(),
        };

        if let Some(interval) = &self.interval {
            let interval = parse_duration(interval).context("CDNRANGES_INTERVAL")?;
            config = config.with_interval(interval);
        }
        if let Some(timeout) = &self.timeout {
            let timeout = parse_duration(timeout).context("CDNRANGES_TIMEOUT")?;
            config = config.with_timeout(timeout);
        }

        let config = config.with_defaults();
        config.validate()?;
        Ok(config)
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn main() -> ExitCode {
    let config = Config::from_env();

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting cdnrangesd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: Config) -> DaemonExitCode {
    let refresh = match config.refresh_config() {
        Ok(refresh) => refresh,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DaemonExitCode::ConfigError;
        }
    };

    let source = match HttpRangeSource::from_config(&config.source) {
        Ok(source) => source,
        Err(e) => {
            error!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError;
        }
    };
    info!(url = source.url(), "Using HTTP range source");

    let (ranges, events) = CdnRanges::new(Arc::new(source));
    if let Err(e) = ranges.provision(refresh) {
        error!("Failed to provision range refresher: {}", e);
        return DaemonExitCode::ConfigError;
    }

    let logger = tokio::spawn(log_events(events));

    let exit = match wait_for_shutdown().await {
        Ok(signal) => {
            info!("Received shutdown signal: {}", signal);
            DaemonExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Shutdown error: {:#}", e);
            DaemonExitCode::RuntimeError
        }
    };

    info!("Shutting down daemon");
    if let Err(e) = ranges.shutdown().await {
        error!("Cleanup failed: {}", e);
        return DaemonExitCode::RuntimeError;
    }

    // The event channel closes once the refresh task has exited
    match logger.await {
        Ok(seen) => debug!(events = seen, "event logger finished"),
        Err(e) => warn!("Event logger ended abnormally: {}", e),
    }

    exit
}

/// Trace refresh events until the channel closes
///
/// The scheduler already logs every outcome at its proper level; this only
/// adds the structured event at debug for troubleshooting.
async fn log_events(mut events: mpsc::Receiver<RefreshEvent>) -> usize {
    let mut seen = 0;
    while let Some(event) = events.recv().await {
        seen += 1;
        debug!(?event, "refresh event");
    }
    seen
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
