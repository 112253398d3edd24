//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system including
//! MigrationDefinition, LedgerEntry, MigrationConfig and the per-action reports.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::{MigrationError, MigrationResult};

/// Suffix every migration file must carry
pub const MIGRATION_SUFFIX: &str = ".sql";

/// Marker line opening the "up" section of a migration file
pub const UP_MARKER: &str = "-- +migrate Up";

/// Marker line separating the "up" and "down" sections of a migration file
pub const DOWN_MARKER: &str = "-- +migrate Down";

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// A versioned pair of forward and reverse statements parsed from one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationDefinition {
    /// Integer version taken from the filename prefix
    pub version: i64,
    /// Human-readable name, the rest of the filename
    pub name: String,
    /// SQL statements to apply the migration
    pub up_sql: String,
    /// SQL statements to revert the migration; empty when not revertible
    pub down_sql: String,
    /// File the definition was read from
    pub file_name: String,
}

impl MigrationDefinition {
    /// Whether the migration carries DOWN statements
    pub fn is_revertible(&self) -> bool {
        !self.down_sql.is_empty()
    }

    pub fn summary(&self) -> MigrationSummary {
        MigrationSummary {
            version: self.version,
            name: self.name.clone(),
        }
    }
}

/// One row of the ledger table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub version: i64,
    pub name: String,
    /// When the store recorded the migration, if it could be read back
    pub executed_at: Option<NaiveDateTime>,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking migrations
    pub migrations_table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: "migrations".to_string(),
        }
    }
}

impl MigrationConfig {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    /// The ledger table name is interpolated into SQL, so it must be a plain identifier
    pub fn validate(&self) -> MigrationResult<()> {
        validate_table_name(&self.migrations_table)
    }
}

pub(crate) fn validate_table_name(table: &str) -> MigrationResult<()> {
    if IDENTIFIER.is_match(table) {
        Ok(())
    } else {
        Err(MigrationError::Configuration(format!(
            "'{}' is not a valid migrations table name",
            table
        )))
    }
}

/// Version and name of a migration, as carried in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationSummary {
    pub version: i64,
    pub name: String,
}

/// Result of running migrations
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRunResult {
    /// Migrations applied by this run, in order
    pub applied: Vec<MigrationSummary>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Result of rolling back migrations
#[derive(Debug, Clone, Serialize)]
pub struct RollbackResult {
    /// Migrations reverted by this run, most recent first
    pub rolled_back: Vec<MigrationSummary>,
    /// Applied migrations passed over because they have no DOWN statements
    pub irreversible: Vec<MigrationSummary>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl RollbackResult {
    pub fn rolled_back_count(&self) -> usize {
        self.rolled_back.len()
    }
}

/// Migration status relative to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MigrationState {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        executed_at: Option<NaiveDateTime>,
    },
}

impl MigrationState {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationState::Applied { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            MigrationState::Pending => "Pending",
            MigrationState::Applied { .. } => "Applied",
        }
    }
}

/// One line of a status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub version: i64,
    pub name: String,
    pub state: MigrationState,
}

/// Applied/pending classification of every known migration
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Every definition, ascending by version
    pub entries: Vec<StatusEntry>,
    /// Ledger rows with no matching migration file
    pub orphaned: Vec<LedgerEntry>,
}

impl StatusReport {
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.state.is_applied()).count()
    }

    pub fn applied_count(&self) -> usize {
        self.entries.iter().filter(|e| e.state.is_applied()).count()
    }
}
