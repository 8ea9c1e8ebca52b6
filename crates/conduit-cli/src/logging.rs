//! Logging and tracing setup for the `conduit` binary
//!
//! Console output is pretty-printed to stderr so that command results on
//! stdout stay machine-readable. A daily-rolling JSON file under the local
//! data directory keeps the full structured trace for bug reports.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const CRATES: [&str; 5] = [
    "conduit",
    "conduit_core",
    "conduit_connection",
    "conduit_providers",
    "conduit_tunnel",
];

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where log files should be written
    pub log_dir: PathBuf,

    /// JSON output to a rolling file
    pub enable_json_logs: bool,

    /// Pretty output on stderr
    pub enable_console_logs: bool,

    /// Include file/line information in console logs
    pub include_location: bool,

    /// Log span open/close events
    pub enable_spans: bool,

    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

/// Filter string giving every conduit crate `level` and everything else `base`
fn crate_filter(base: &str, level: &str) -> String {
    std::iter::once(base.to_string())
        .chain(CRATES.iter().map(|c| format!("{}={}", c, level)))
        .collect::<Vec<_>>()
        .join(",")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: cfg!(debug_assertions),
            default_filter: crate_filter("info", "debug"),
        }
    }
}

impl LoggingConfig {
    /// Warnings on the console, info-level JSON logs for bug reports
    pub fn production() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: true,
            enable_console_logs: true,
            include_location: false,
            enable_spans: false,
            default_filter: crate_filter("warn", "info"),
        }
    }

    /// Verbose console output
    pub fn development() -> Self {
        Self::default()
    }

    /// Console only, no files
    pub fn testing() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("conduit-tests"),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
        }
    }

    /// Replace the default filter with one level for every conduit crate
    pub fn with_level(mut self, level: &str) -> Self {
        self.default_filter = crate_filter("warn", level);
        self
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global subscriber
///
/// `RUST_LOG` wins over `config.default_filter`. The returned guard flushes
/// the file writer on drop and must be held for the life of the process.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let console = config
        .enable_console_logs
        .then(|| stderr_layer(&config, filter.clone()));
    let (file, guard) = if config.enable_json_logs {
        let (layer, guard) = json_file_layer(&config, filter)?;
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let layers: Vec<BoxedLayer> = console.into_iter().chain(file).collect();
    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        log_dir = %config.log_dir.display(),
        json = config.enable_json_logs,
        console = config.enable_console_logs,
        "logging initialized"
    );
    Ok(guard)
}

// NEW rather than ENTER: async spans are re-entered on every poll
fn span_events(config: &LoggingConfig) -> FmtSpan {
    if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

fn stderr_layer(config: &LoggingConfig, filter: EnvFilter) -> BoxedLayer {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(span_events(config))
        .pretty()
        .with_filter(filter)
        .boxed()
}

fn json_file_layer(
    config: &LoggingConfig,
    filter: EnvFilter,
) -> anyhow::Result<(BoxedLayer, WorkerGuard)> {
    std::fs::create_dir_all(&config.log_dir)?;
    let appender = tracing_appender::rolling::daily(&config.log_dir, "conduit.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events(config))
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter)
        .boxed();
    Ok((layer, guard))
}

/// `<local data dir>/conduit/logs`
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("conduit")
        .join("logs")
}
