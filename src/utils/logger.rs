use std::fs;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "audio-extract.log";

/// Installs the global subscriber: stdout plus a daily rolling file in `log_dir`.
///
/// `RUST_LOG` wins over `level` when set. Keep the returned guard alive for
/// the lifetime of the process or buffered file output is lost.
pub fn init(log_dir: String, level: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()?;

    Ok(guard)
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
