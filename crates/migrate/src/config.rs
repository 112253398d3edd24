//! Connection configuration loaded from the environment

use std::collections::HashMap;
use std::env;

use crate::backends::{redact_url, DatabaseBackendType};
use crate::error::{MigrationError, MigrationResult};

/// Where a configuration value came from, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value loaded from environment variable
    EnvVar(String),
    /// Default value used
    Default,
    /// Value provided programmatically
    Programmatic,
}

/// How to reach the target database
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub database_url: String,
    pub source: ConfigSource,
}

impl ConnectionConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            source: ConfigSource::Programmatic,
        }
    }

    /// Load from `DATABASE_URL`, or compose a MySQL URL from the `DB_*` variables
    pub fn from_env() -> MigrationResult<Self> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Same as [`from_env`](Self::from_env) but reads from the given map
    pub fn from_vars(vars: &HashMap<String, String>) -> MigrationResult<Self> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let config = if let Some(url) = get("DATABASE_URL") {
            Self {
                database_url: url,
                source: ConfigSource::EnvVar("DATABASE_URL".to_string()),
            }
        } else {
            let user = get("DB_USER").unwrap_or_else(|| "root".to_string());
            let password = get("DB_PASSWORD").unwrap_or_else(|| "password".to_string());
            let host = get("DB_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
            let port = get("DB_PORT").unwrap_or_else(|| "3306".to_string());
            let name = get("DB_NAME").unwrap_or_else(|| "graphql_db".to_string());

            let mut url = url::Url::parse(&format!("mysql://{}:{}/{}", host, port, name))
                .map_err(|e| MigrationError::Configuration(format!("Invalid DB_HOST/DB_PORT/DB_NAME: {}", e)))?;
            url.set_username(&user)
                .and_then(|_| url.set_password(Some(&password)))
                .map_err(|_| MigrationError::Configuration("Invalid DB_USER/DB_PASSWORD".to_string()))?;

            let source = if ["DB_USER", "DB_PASSWORD", "DB_HOST", "DB_PORT", "DB_NAME"]
                .iter()
                .any(|key| get(key).is_some())
            {
                ConfigSource::EnvVar("DB_*".to_string())
            } else {
                ConfigSource::Default
            };

            Self {
                database_url: url.to_string(),
                source,
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Check that the URL names a supported backend
    pub fn validate(&self) -> MigrationResult<()> {
        DatabaseBackendType::detect(&self.database_url).map(|_| ())
    }

    pub fn backend(&self) -> MigrationResult<DatabaseBackendType> {
        DatabaseBackendType::detect(&self.database_url)
    }

    /// URL safe for logging
    pub fn redacted_url(&self) -> String {
        redact_url(&self.database_url)
    }
}
