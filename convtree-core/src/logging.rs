//! Logging infrastructure for convtree
//!
//! Logs go to `$XDG_STATE_HOME/convtree/` (~/.local/state/convtree/). Files
//! rotate daily and are named `convtree.log.<YYYY-MM-DD>` (UTC date); only
//! the newest `max_files` are kept. Stdout stays reserved for tree output.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Prefix of every rotated log file; the appender appends `.<date>`.
pub const LOG_FILE_PREFIX: &str = "convtree.log";

/// Initialize the logging system
///
/// Sets up tracing with:
/// - A daily-rotated file in the XDG state directory
/// - Configurable log level via config or RUST_LOG env var
///
/// The returned guard must be held until exit so buffered lines are flushed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&log_dir)
        .map_err(|e| Error::Config(format!("failed to create log file: {e}")))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))?;

    let log_file = log_file_path_in(&log_dir, Utc::now().date_naive());
    tracing::info!(
        log_file = %log_file.display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        log_file,
        _guard: guard,
    })
}

/// Initialize logging for tests (logs to the test writer).
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Keeps the background log writer alive; dropping it flushes pending lines.
pub struct LoggingGuard {
    log_file: PathBuf,
    _guard: WorkerGuard,
}

impl LoggingGuard {
    /// The file receiving today's log lines.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

/// Path of the rotated log file for `date` inside `dir`.
pub fn log_file_path_in(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d")))
}

/// Path of today's log file in the state directory.
pub fn log_file_path() -> PathBuf {
    log_file_path_in(&Config::state_dir(), Utc::now().date_naive())
}
