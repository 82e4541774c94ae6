use crate::config::HostConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    prelude::*,
    EnvFilter,
};

pub const DEFAULT_LOG_FILTER: &str = "jsbridge=debug,warn";
pub const DEFAULT_LOG_PREFIX: &str = "jsbridge-host";

/// `RUST_LOG` when set, otherwise the configured filter. A malformed
/// configured filter is an error rather than a silent fallback.
pub fn log_filter(config: &HostConfig) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(&config.log_filter)?),
    }
}

/// Installs the process-wide subscriber: RFC 3339 stamped lines on stderr,
/// plus a daily rolling file under `config.log_dir` when one is set.
///
/// The returned guard flushes the file writer when dropped; hold it for the
/// life of the process.
pub fn init_logging(config: &HostConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = log_filter(config)?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(&config.log_prefix)
                .build(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(log_dir = ?config.log_dir, "Logging initialized");
    Ok(guard)
}

/// Console-only logging for tests. Safe to call more than once.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jsbridge=trace,debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_filter_is_validated() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = HostConfig {
            log_filter: "jsbridge_host=info".into(),
            ..HostConfig::default()
        };
        assert!(log_filter(&config).is_ok());

        let config = HostConfig {
            log_filter: "jsbridge_host=loud".into(),
            ..HostConfig::default()
        };
        assert!(log_filter(&config).is_err());
    }
}
