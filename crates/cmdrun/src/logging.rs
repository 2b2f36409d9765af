//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `CMDRUN_LOG` environment variable (any `EnvFilter` directive)
//! 2. `LogConfig::level`
//!
//! Logs go to stderr so stdout stays free for captured command output.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured filter
pub const LOG_ENV: &str = "CMDRUN_LOG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            with_target: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl LogConfig {
    fn filter(&self) -> Result<EnvFilter> {
        match std::env::var(LOG_ENV) {
            Ok(directives) if !directives.trim().is_empty() => Ok(EnvFilter::try_new(directives)?),
            _ => Ok(EnvFilter::try_new(&self.level)?),
        }
    }
}

/// Install the global subscriber.
///
/// Fails instead of panicking when a subscriber is already installed, so
/// tests can call it repeatedly.
pub fn init_tracing(config: &LogConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter()?)
        .with_target(config.with_target)
        .with_writer(std::io::stderr);

    match config.format {
        LogFormat::Text => builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?,
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?,
    }

    tracing::debug!(level = %config.level, format = ?config.format, "tracing initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: LogConfig = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.with_target);
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let config = LogConfig {
            level: "cmdrun=loud".to_string(),
            ..Default::default()
        };
        if std::env::var(LOG_ENV).is_err() {
            assert!(config.filter().is_err());
        }
    }
}
