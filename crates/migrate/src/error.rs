//! Error types for the migration engine
//!
//! Every fallible operation returns [`MigrationResult`]. Parse failures on a
//! single file are reported as [`ParseError`] and recovered by the loader; all
//! other variants abort the current action.

use std::fmt;
use std::path::PathBuf;

use crate::backends::QueryError;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Direction a migration body was executed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum MigrationDirection {
    /// Apply the migration (run UP statements)
    Up,
    /// Revert the migration (run DOWN statements)
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// A migration file whose name or content could not be understood
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("migration filename '{file}' must follow <version>_<name>.sql")]
    MissingSeparator { file: String },

    #[error("migration filename '{file}' has a non-integer version '{token}'")]
    InvalidVersion { file: String, token: String },
}

/// Errors raised by the migration engine
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("duplicate migration version {version} in '{first}' and '{second}'")]
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },

    #[error("ledger {operation} failed{}: {message}", .version.map(|v| format!(" for version {}", v)).unwrap_or_default())]
    Storage {
        operation: &'static str,
        version: Option<i64>,
        message: String,
    },

    #[error("migration {version} ({name}) failed while running {direction}: {message}")]
    Execution {
        version: i64,
        name: String,
        direction: MigrationDirection,
        message: String,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid migration name: {0}")]
    InvalidName(String),
}

impl MigrationError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrationError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn storage(operation: &'static str, version: Option<i64>, err: QueryError) -> Self {
        MigrationError::Storage {
            operation,
            version,
            message: err.to_string(),
        }
    }

    /// Version of the migration this error is about, if any
    pub fn version(&self) -> Option<i64> {
        match self {
            MigrationError::Execution { version, .. } => Some(*version),
            MigrationError::DuplicateVersion { version, .. } => Some(*version),
            MigrationError::Storage { version, .. } => *version,
            _ => None,
        }
    }
}
