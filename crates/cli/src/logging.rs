//! Logging bootstrap for the `shift` binary
//!
//! Log lines go to stderr so the status table on stdout stays clean.

use std::io;

use clap::ValueEnum;
use serde_json::{json, Value};
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::CliError;

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration for the CLI
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. "info" or "shift_migrate=debug"
    pub level: String,
    pub format: LogFormat,
    /// Fields attached to the initialization message, such as the action being run
    pub global_fields: serde_json::Map<String, Value>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            global_fields: serde_json::Map::new(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: impl Into<String>, format: LogFormat) -> Self {
        Self {
            level: level.into(),
            format,
            ..Self::default()
        }
    }

    pub fn with_global_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.global_fields.insert(key.into(), value.into());
        self
    }

    /// Build the filter from the configured level
    pub fn env_filter(&self) -> Result<EnvFilter, CliError> {
        EnvFilter::try_new(&self.level).map_err(|e| CliError::Logging(format!("invalid log filter '{}': {}", self.level, e)))
    }
}

/// Install the global subscriber
pub fn init_logging(config: LoggingConfig) -> Result<(), CliError> {
    let filter = config.env_filter()?;

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).with_target(false))
            .try_init(),
    };
    installed.map_err(|e| CliError::Logging(e.to_string()))?;

    if config.global_fields.is_empty() {
        tracing::debug!(target: "shift::logging", level = %config.level, "Logging initialized");
    } else {
        let mut init_msg = json!({ "message": "Logging initialized", "level": config.level });
        for (key, value) in config.global_fields {
            init_msg[key] = value;
        }
        tracing::info!(target: "shift::logging", "{}", init_msg);
    }

    Ok(())
}
