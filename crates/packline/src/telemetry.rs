//! Process-wide tracing setup.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::ConfigError;

/// Overrides the configured level when set, in `EnvFilter` syntax.
pub const LOG_ENV: &str = "PACKLINE_LOG";

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs the global subscriber and the `log` bridge.
///
/// Returns `Ok(false)` without touching anything when telemetry is already
/// installed.
pub fn init(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let level = config.level.to_ascii_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::Validation {
            message: format!("Unknown log level: {}", config.level),
        });
    }

    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&level));

    let fmt_layer = match config.format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(fmt_layer).with(filter);

    // Another subscriber (a test harness, an embedding app) may own the
    // globals already.
    if let Err(e) = tracing_log::LogTracer::init() {
        log::debug!("log bridge not installed: {}", e);
    }
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        tracing::debug!("tracing subscriber not installed: {}", e);
        return Ok(false);
    }

    tracing::info!(level = %level, format = ?config.format, "Telemetry initialized");
    Ok(true)
}
