use crate::logging::{DEFAULT_LOG_FILTER, DEFAULT_LOG_PREFIX};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const EVAL_TIMEOUT_ENV: &str = "JSBRIDGE_EVAL_TIMEOUT_MS";
pub const LOG_FILTER_ENV: &str = "JSBRIDGE_LOG";
pub const LOG_DIR_ENV: &str = "JSBRIDGE_LOG_DIR";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    /// Default timeout for script evaluation. `None` waits forever.
    pub evaluation_timeout: Option<Duration>,
    pub log_filter: String,
    /// Directory for rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
    pub log_prefix: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            evaluation_timeout: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_dir: None,
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
        }
    }
}

impl HostConfig {
    /// Defaults overridden by `JSBRIDGE_EVAL_TIMEOUT_MS` (0 disables the
    /// timeout), `JSBRIDGE_LOG` and `JSBRIDGE_LOG_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = HostConfig::default();
        if let Some(raw) = lookup(EVAL_TIMEOUT_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: EVAL_TIMEOUT_ENV,
                value: raw.clone(),
            })?;
            config.evaluation_timeout = (millis > 0).then(|| Duration::from_millis(millis));
        }
        if let Some(filter) = lookup(LOG_FILTER_ENV) {
            config.log_filter = filter;
        }
        if let Some(dir) = lookup(LOG_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }
}
