//! Logging infrastructure for quotascan.
//!
//! Diagnostics go to stderr in a compact single-line format so they never
//! interleave with report output on stdout. An optional log file gets the
//! same stream through a non-blocking writer. Verbosity is configured via
//! the RUST_LOG environment variable and defaults to `info`.

use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global logging subscriber.
///
/// Always logs to stderr; when `log_file` is given the same stream is also
/// appended to that file (ANSI-free). May only be called once per process.
///
/// # Errors
///
/// Returns an error if the log file's parent directory does not exist or
/// the file cannot be opened for append.
pub fn init_logging(log_file: Option<&Path>) -> Result<LoggingGuard, io::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .compact();

    let mut file_guard = None;
    let file_layer = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;
            // Open eagerly so a bad path fails here instead of inside the
            // background writer.
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .compact(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
