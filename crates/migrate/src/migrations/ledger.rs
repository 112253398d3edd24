//! Migration Ledger - The persisted record of applied migrations
//!
//! One row per applied version. The table is created lazily and every
//! statement is built for the dialect of the connection it runs on.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use super::definitions::{validate_table_name, LedgerEntry};
use crate::backends::{DatabaseConnection, DatabaseValue, SqlDialect};
use crate::error::{MigrationError, MigrationResult};

/// Text formats `executed_at` may come back in across backends
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Ledger table accessor
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    pub fn new(table: impl Into<String>) -> MigrationResult<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it does not exist yet
    pub async fn ensure_table(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<()> {
        conn.execute(&self.create_table_sql(), &[])
            .await
            .map_err(|e| MigrationError::storage("create table", None, e))?;
        Ok(())
    }

    /// Whether the ledger table is already present, without creating it
    pub async fn exists(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<bool> {
        let dialect = conn.dialect();
        let table = match dialect {
            // unquoted identifiers are folded to lower case
            SqlDialect::PostgreSQL => self.table.to_lowercase(),
            SqlDialect::MySQL | SqlDialect::SQLite => self.table.clone(),
        };

        let rows = conn
            .fetch_all(&Self::table_exists_sql(dialect), &[DatabaseValue::String(table)])
            .await
            .map_err(|e| MigrationError::storage("query", None, e))?;
        Ok(!rows.is_empty())
    }

    /// Every recorded version
    pub async fn applied_versions(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<HashSet<i64>> {
        let sql = self.applied_versions_sql(conn.dialect());
        let rows = conn
            .fetch_all(&sql, &[])
            .await
            .map_err(|e| MigrationError::storage("query", None, e))?;

        rows.iter()
            .map(|row| row.get_i64("version"))
            .collect::<Result<HashSet<_>, _>>()
            .map_err(|e| MigrationError::storage("query", None, e))
    }

    /// Every recorded row, ascending by version
    pub async fn entries(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<Vec<LedgerEntry>> {
        let sql = self.entries_sql(conn.dialect());
        let rows = conn
            .fetch_all(&sql, &[])
            .await
            .map_err(|e| MigrationError::storage("query", None, e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let version = row
                .get_i64("version")
                .map_err(|e| MigrationError::storage("query", None, e))?;
            let name = row
                .get_string("name")
                .map_err(|e| MigrationError::storage("query", Some(version), e))?
                .unwrap_or_default();
            let executed_at = row
                .get_string("executed_at")
                .map_err(|e| MigrationError::storage("query", Some(version), e))?
                .and_then(|raw| parse_timestamp(&raw));

            entries.push(LedgerEntry {
                version,
                name,
                executed_at,
            });
        }

        Ok(entries)
    }

    /// Record a migration as applied
    pub async fn record(&self, conn: &mut dyn DatabaseConnection, version: i64, name: &str) -> MigrationResult<()> {
        let sql = self.record_sql(conn.dialect());
        conn.execute(&sql, &[DatabaseValue::Int64(version), DatabaseValue::from(name)])
            .await
            .map_err(|e| MigrationError::storage("insert", Some(version), e))?;
        Ok(())
    }

    /// Remove a migration record; a missing row is not an error
    pub async fn remove(&self, conn: &mut dyn DatabaseConnection, version: i64) -> MigrationResult<()> {
        let sql = self.remove_sql(conn.dialect());
        let affected = conn
            .execute(&sql, &[DatabaseValue::Int64(version)])
            .await
            .map_err(|e| MigrationError::storage("delete", Some(version), e))?;

        if affected == 0 {
            tracing::debug!(version, "No ledger row to remove");
        }
        Ok(())
    }

    /// SQL to create the migrations tracking table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                version BIGINT PRIMARY KEY,\n    \
                name VARCHAR(255) NOT NULL,\n    \
                executed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP\n\
            )",
            self.table
        )
    }

    /// SQL listing a table by name in the current schema
    pub fn table_exists_sql(dialect: SqlDialect) -> String {
        match dialect {
            SqlDialect::SQLite => "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?".to_string(),
            SqlDialect::PostgreSQL => "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1"
                .to_string(),
            SqlDialect::MySQL => "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?"
                .to_string(),
        }
    }

    /// SQL to get applied versions
    ///
    /// Versions are read back as text: sqlx's `Any` driver narrows SQLite
    /// integers to 32 bits, which corrupts timestamp versions.
    pub fn applied_versions_sql(&self, dialect: SqlDialect) -> String {
        format!(
            "SELECT CAST(version AS {cast}) AS version FROM {table} ORDER BY {table}.version",
            cast = dialect.text_cast_type(),
            table = self.table
        )
    }

    /// SQL to get every ledger row, versions and timestamps read back as text
    pub fn entries_sql(&self, dialect: SqlDialect) -> String {
        format!(
            "SELECT CAST(version AS {cast}) AS version, name, CAST(executed_at AS {cast}) AS executed_at \
             FROM {table} ORDER BY {table}.version",
            cast = dialect.text_cast_type(),
            table = self.table
        )
    }

    /// SQL to record a migration as applied
    pub fn record_sql(&self, dialect: SqlDialect) -> String {
        format!(
            "INSERT INTO {} (version, name) VALUES ({}, {})",
            self.table,
            dialect.parameter_placeholder(0),
            dialect.parameter_placeholder(1)
        )
    }

    /// SQL to remove a migration record (for rollback)
    pub fn remove_sql(&self, dialect: SqlDialect) -> String {
        format!(
            "DELETE FROM {} WHERE version = {}",
            self.table,
            dialect.parameter_placeholder(0)
        )
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    // PostgreSQL may append a UTC offset when the column is TIMESTAMPTZ
    let raw = raw.split_once('+').map(|(ts, _)| ts).unwrap_or(raw);

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}
