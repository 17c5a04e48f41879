//! Logging setup.
//!
//! Human-readable events go to stderr; with file logging enabled a JSON copy
//! is written to a daily rolling file under the data directory.

use std::fs;
use std::io;
use std::path::Path;

use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE_NAME: &str = "form-wizard.log";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Stderr Layer: compact human-readable format
fn stderr_layer<S>(default_level: &str) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(env_filter(default_level))
}

/// Initialize the logging system.
///
/// Returns a `WorkerGuard` when file logging is enabled. It must be kept alive
/// for the duration of the program so buffered logs are flushed on shutdown.
pub fn init(config: &LoggingConfig, log_dir: &Path) -> Option<WorkerGuard> {
    if !config.file_logging {
        tracing_subscriber::registry().with(stderr_layer(&config.level)).init();
        return None;
    }

    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Failed to create logs directory {}: {}", log_dir.display(), e);
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // File Layer: JSON format for easy parsing/ingestion
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .json()
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .with_filter(env_filter(&config.level));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer(&config.level))
        .init();

    tracing::info!("Logging initialized. Writing to: {:?} (daily rolling)", log_dir.join(LOG_FILE_NAME));

    Some(guard)
}

/// Route events to the test harness' captured output. Safe to call repeatedly.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}
