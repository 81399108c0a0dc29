//! Console and rotating-file logging.
//!
//! Logs go to stderr and to two daily-rotating files in the platform data
//! directory: `report-builder.log` (everything the filter lets through) and
//! `error.log` (warnings and errors only).
//!
//! ```no_run
//! report_builder::logging::init().expect("Failed to initialize logging");
//! tracing::info!("Started");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

/// Log directory under the platform data dir, e.g. `~/.local/share/report-builder/logs`.
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;

    let log_dir = base_dir.join("report-builder").join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

fn file_appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(10)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} log appender"))
}

/// Install the global subscriber. `default_level` applies unless `RUST_LOG` is set.
///
/// # Errors
///
/// Returns error if the log directory or file appenders cannot be created.
pub fn init_with_level(default_level: &str) -> Result<()> {
    let log_dir = get_log_dir()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Failed to create env filter")?;

    // Console output shares stdout with command results, so it goes to stderr.
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_appender(&log_dir, "report-builder")?);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(file_appender(&log_dir, "error")?)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Logging already initialized")?;

    tracing::debug!("Logging initialized, log directory: {}", log_dir.display());

    Ok(())
}

/// [`init_with_level`] at `warn`, so command output stays readable.
pub fn init() -> Result<()> {
    init_with_level("warn")
}

/// Path of today's main log file.
pub fn get_current_log_path() -> Result<PathBuf> {
    let log_dir = get_log_dir()?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(log_dir.join(format!("report-builder.{today}.log")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_log_dir() {
        let log_dir = get_log_dir().expect("Failed to get log dir");
        assert!(log_dir.ends_with("report-builder/logs") || log_dir.ends_with("report-builder\\logs"));
    }

    #[test]
    fn test_current_log_path_is_dated() {
        let path = get_current_log_path().unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("report-builder.") && name.ends_with(".log"), "{name}");
    }
}
