use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

pub const ARGUMENT_ENCODING_ENV: &str = "JSBRIDGE_ARGUMENT_ENCODING";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// How call stubs put script arguments on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentEncoding {
    /// One carrier value per argument.
    #[default]
    Values,
    /// All arguments as one reference-preserving JSON array.
    Json,
}

impl FromStr for ArgumentEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "values" => Ok(ArgumentEncoding::Values),
            "json" => Ok(ArgumentEncoding::Json),
            _ => Err(ConfigError::Invalid {
                name: ARGUMENT_ENCODING_ENV,
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RendererConfig {
    pub argument_encoding: ArgumentEncoding,
}

impl RendererConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = RendererConfig::default();
        if let Some(raw) = lookup(ARGUMENT_ENCODING_ENV) {
            config.argument_encoding = raw.parse()?;
        }
        Ok(config)
    }
}
