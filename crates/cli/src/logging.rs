//! Logging setup from the `[logging]` section

use anyhow::{Context, Result};
use config::LoggingConfig;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};
use types::{LogFormat, LogLevel};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Targets of this toolkit, always logged alongside the configured loggers
const OWN_TARGETS: [&str; 2] = ["ktbs_config", "config"];

/// Filter directives for the configured loggers at `level`
pub fn directives(loggers: &[String], level: LogLevel) -> String {
    if loggers.is_empty() {
        return "off".to_string();
    }
    loggers
        .iter()
        .map(String::as_str)
        .chain(OWN_TARGETS)
        .map(|target| format!("{}={}", target, level.as_directive()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize console and file logging
///
/// `RUST_LOG`, when set, replaces the console filter built from the
/// configuration.
pub fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let console_directives = directives(&logging.loggers, logging.console_level);
    let console_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&console_directives))
    };

    let console: BoxedLayer = match logging.console_format {
        LogFormat::Full => fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(console_filter())
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(console_filter())
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_filter(console_filter())
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter())
            .boxed(),
    };
    let mut layers = vec![console];

    if let Some(ref filename) = logging.filename {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(filename)
            .with_context(|| format!("Failed to open log file {}", filename))?;
        let file_filter = EnvFilter::new(directives(&logging.loggers, logging.file_level));
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(file_filter)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .context("Failed to initialize logging")?;

    debug!("Logging initialized");
    debug!("Console level: {}", logging.console_level);
    debug!("Console format: {}", logging.console_format);
    if let Some(ref filename) = logging.filename {
        debug!("Log file: {} at level {}", filename, logging.file_level);
    }
    if let Some(ref url) = logging.ktbs_logurl {
        warn!(
            "ktbs-logurl is set to {} ({}); events are only forwarded by the kTBS server",
            url, logging.ktbs_level
        );
    }

    Ok(())
}
