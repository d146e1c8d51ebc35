//! Logging configuration with rotation support
//!
//! # Example
//!
//! ```no_run
//! use mmrag_store::logging::init_logging;
//!
//! init_logging("logs", "mmrag.log", "info").unwrap();
//! ```

use crate::error::{Result, StoreError};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging to stdout and a daily rotated file
///
/// - `directory`: Directory to store logs
/// - `filename_prefix`: Prefix for log files (e.g. "mmrag.log")
/// - `level`: Default log level (e.g. "info", "debug"), overridden by `RUST_LOG`
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(directory: &str, filename_prefix: &str, level: &str) -> Result<()> {
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(filename_prefix)
        .build(directory)
        .map_err(|e| StoreError::Config(format!("Failed to create log appender: {}", e)))?;

    let stdout_layer = fmt::layer().with_target(false).compact();
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| StoreError::Config(format!("Invalid log level '{}': {}", level, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| StoreError::Config(format!("Failed to init tracing: {}", e)))?;

    Ok(())
}
