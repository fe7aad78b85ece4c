//! Structured logging foundation for gk-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for daemon/agent hosts
//!
//! # Usage
//!
//! ```ignore
//! use gk_core::logging::{init_logging, LogConfig};
//!
//! // Initialize at startup
//! let config = LogConfig::from_env();
//! init_logging(&config);
//! ```
//!
//! # Design Notes
//!
//! - stderr receives all log output (human or JSONL)
//! - acquisition decisions emit one structured [`events::LockEvent`] each
//! - invariant violations route through the swappable issue reporter

pub mod events;

pub use events::{event_names, Level, LockEvent};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::IsTerminal;
use std::sync::{Arc, PoisonError, RwLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

/// Host-supplied sink for non-fatal diagnostics (broken invariants,
/// unresolvable victims). Defaults to a `tracing` warning plus stderr in
/// debug builds.
pub type IssueReporter = Arc<dyn Fn(&str) + Send + Sync>;

static ISSUE_REPORTER: RwLock<Option<IssueReporter>> = RwLock::new(None);

/// Install a host issue reporter, replacing any previous one.
pub fn set_issue_reporter(reporter: impl Fn(&str) + Send + Sync + 'static) {
    let mut slot = ISSUE_REPORTER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = Some(Arc::new(reporter));
}

/// Revert to the default reporter.
pub fn clear_issue_reporter() {
    let mut slot = ISSUE_REPORTER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = None;
}

/// Surface a non-fatal diagnostic through the active reporter.
pub fn report_issue(message: &str) {
    let slot = ISSUE_REPORTER
        .read()
        .unwrap_or_else(PoisonError::into_inner);
    match slot.as_ref() {
        Some(reporter) => reporter(message),
        None => {
            tracing::warn!(target: "gk_core::issue", "{}", message);
            #[cfg(debug_assertions)]
            eprintln!("gatekeep issue: {}", message);
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Human,
    Jsonl,
}

/// Logging configuration, resolvable from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: LogLevel::Info,
            format: LogFormat::Human,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Resolve from `GK_LOG` (level) and `GK_LOG_FORMAT` (`human`/`jsonl`).
    pub fn from_env() -> Self {
        let mut config = LogConfig::default();
        if let Ok(level) = std::env::var("GK_LOG") {
            config.level = match level.to_ascii_lowercase().as_str() {
                "trace" => LogLevel::Trace,
                "debug" => LogLevel::Debug,
                "warn" => LogLevel::Warn,
                "error" => LogLevel::Error,
                _ => LogLevel::Info,
            };
        }
        if let Ok(format) = std::env::var("GK_LOG_FORMAT") {
            if format.eq_ignore_ascii_case("jsonl") {
                config.format = LogFormat::Jsonl;
            }
        }
        config
    }
}

/// Initialize the logging subsystem.
///
/// Safe to call more than once; later calls are no-ops. Respects
/// `RUST_LOG` when set, falling back to the configured level.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gk_core={}", config.level)));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = tracing_fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init();
            } else {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init();
            }
        }
        LogFormat::Jsonl => {
            let fmt_layer = tracing_fmt::layer()
                .with_writer(std::io::stderr)
                .json();
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init();
        }
    }
}
