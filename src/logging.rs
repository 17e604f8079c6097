//! Logging infrastructure - structured tracing for binding and calls
//!
//! Design: the crate only emits `tracing` events; installing a subscriber is
//! the host's choice. [`init`] installs one for hosts that have none:
//! - Per-target filtering through `RUST_LOG`, defaulting to `pylink=<level>`
//! - Human-readable or JSON output
//! - Optional non-blocking file output
//!
//! Native calls log at `trace`, binding and lifecycle transitions at `info`.

use crate::config::LoggingConfig;
use once_cell::sync::OnceCell;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

// Flushes buffered file output; held until exit
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    pub level: Level,
    /// Write here instead of stderr
    pub log_path: Option<PathBuf>,
    pub json_format: bool,
    /// Show span enter/close events
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // PYLINK_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("PYLINK_LOG_LEVEL") {
            config.level = parse_level(&level);
        }

        // PYLINK_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("PYLINK_LOG_FILE") {
            config.log_path = Some(PathBuf::from(path));
        }

        config.json_format = std::env::var("PYLINK_LOG_JSON").is_ok();
        config.show_spans = std::env::var("PYLINK_LOG_SPANS").is_ok();

        config
    }

    /// Create config from the `[logging]` section of `pylink.toml`
    pub fn from_config(logging: &LoggingConfig) -> Self {
        Self {
            level: parse_level(&logging.level),
            log_path: logging.file.clone(),
            json_format: logging.json,
            show_spans: logging.spans,
        }
    }

    /// Verbose config for debugging binding problems
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            show_spans: true,
            ..Self::default()
        }
    }
}

/// Unknown names fall back to `info`
fn parse_level(level: &str) -> Level {
    Level::from_str(level.trim()).unwrap_or(Level::INFO)
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call in a process has any effect. If the host already
/// installed a global subscriber, that one is kept.
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("pylink={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = config
            .log_path
            .as_deref()
            .and_then(file_writer)
            .unwrap_or_else(|| BoxMakeWriter::new(io::stderr));

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions));

        let installed = if config.json_format {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer.json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(layer)
                .try_init()
        };

        if installed.is_ok() {
            tracing::debug!(
                event = "logging_initialized",
                level = %config.level,
                json = config.json_format,
                "logging initialized"
            );
        }
    });
}

fn file_writer(path: &Path) -> Option<BoxMakeWriter> {
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let appender = match RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
    {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("pylink: cannot open log file {}: {}", path.display(), e);
            return None;
        }
    };

    let (writer, guard) = tracing_appender::non_blocking(appender);
    FILE_GUARD.set(guard).ok()?;
    Some(BoxMakeWriter::new(writer))
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}
