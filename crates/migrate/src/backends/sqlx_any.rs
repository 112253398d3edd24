//! sqlx Backend Implementation
//!
//! Implements [`DatabaseConnection`] on top of `sqlx::AnyConnection`, which
//! dispatches to the PostgreSQL, MySQL or SQLite driver at runtime based on the
//! connection URL.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::{Any, AnyConnection, Column, Connection, Row};

use super::core::*;
use super::DatabaseBackendType;
use crate::error::{MigrationError, MigrationResult};

/// A single live connection to the target database
pub struct SqlxConnection {
    conn: AnyConnection,
    backend: DatabaseBackendType,
}

impl SqlxConnection {
    /// Open one connection, without retrying
    pub async fn connect(database_url: &str) -> MigrationResult<Self> {
        let backend = DatabaseBackendType::detect(database_url)?;
        sqlx::any::install_default_drivers();

        let conn = AnyConnection::connect(database_url).await.map_err(|e| {
            MigrationError::Connection(format!(
                "Failed to connect to {}: {}",
                super::redact_url(database_url),
                e
            ))
        })?;

        Ok(Self { conn, backend })
    }

    /// Open a connection, retrying with exponential backoff
    pub async fn connect_with_retry(database_url: &str, policy: &RetryPolicy) -> MigrationResult<Self> {
        let mut delay = policy.initial_delay;
        let mut attempt = 1;

        loop {
            match Self::connect(database_url).await {
                Ok(conn) => {
                    tracing::info!(backend = %conn.backend, attempt, "Database connection established");
                    return Ok(conn);
                }
                // A bad URL will not get better by waiting
                Err(err @ MigrationError::Configuration(_)) => return Err(err),
                Err(err) if attempt >= policy.max_attempts => {
                    return Err(MigrationError::Connection(format!(
                        "giving up after {} attempts: {}",
                        attempt, err
                    )));
                }
                Err(err) => {
                    tracing::warn!(attempt, retry_in_ms = delay.as_millis() as u64, "Connection attempt failed: {}", err);
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }

    pub fn backend(&self) -> &DatabaseBackendType {
        &self.backend
    }

    /// Close the connection gracefully
    pub async fn close(self) -> MigrationResult<()> {
        self.conn
            .close()
            .await
            .map_err(|e| MigrationError::Connection(format!("Failed to close connection: {}", e)))
    }
}

#[async_trait]
impl DatabaseConnection for SqlxConnection {
    fn dialect(&self) -> SqlDialect {
        self.backend.dialect()
    }

    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64, QueryError> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_database_value(query, param);
        }

        let result = query.execute(&mut self.conn).await?;

        Ok(result.rows_affected())
    }

    async fn execute_script(&mut self, sql: &str) -> Result<(), QueryError> {
        // Unprepared execution so that multi-statement bodies are accepted
        sqlx::Executor::execute(&mut self.conn, sql).await?;
        Ok(())
    }

    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<Vec<DatabaseRow>, QueryError> {
        let mut query = sqlx::query(sql);

        for param in params {
            query = bind_database_value(query, param);
        }

        let rows = query.fetch_all(&mut self.conn).await?;

        Ok(rows.iter().map(any_row_to_database_row).collect())
    }
}

/// Connection retry settings
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Fail on the first error
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
        }
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Any, AnyArguments<'a>>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Any, AnyArguments<'a>> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::String(s) => query.bind(s.clone()),
    }
}

fn any_row_to_database_row(row: &AnyRow) -> DatabaseRow {
    let columns = row
        .columns()
        .iter()
        .enumerate()
        .map(|(index, column)| (column.name().to_string(), any_value_to_database_value(row, index)))
        .collect();

    DatabaseRow::new(columns)
}

/// Convert a column value to DatabaseValue, trying integer before text
fn any_value_to_database_value(row: &AnyRow, index: usize) -> DatabaseValue {
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return value.map(DatabaseValue::Int64).unwrap_or(DatabaseValue::Null);
    }

    match row.try_get::<Option<String>, _>(index) {
        Ok(Some(value)) => DatabaseValue::String(value),
        Ok(None) => DatabaseValue::Null,
        Err(e) => {
            tracing::debug!(index, "Unsupported column type, reading as NULL: {}", e);
            DatabaseValue::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let mut conn = SqlxConnection::connect("sqlite::memory:").await.unwrap();
        assert_eq!(conn.dialect(), SqlDialect::SQLite);

        conn.execute_script("CREATE TABLE t (id BIGINT, label TEXT); CREATE TABLE u (id BIGINT);")
            .await
            .unwrap();

        let affected = conn
            .execute(
                "INSERT INTO t (id, label) VALUES (?, ?)",
                &[DatabaseValue::Int64(7), DatabaseValue::from("seven")],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = conn.fetch_all("SELECT id, label FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id").unwrap(), 7);
        assert_eq!(rows[0].get_string("label").unwrap().as_deref(), Some("seven"));

        // both statements of the script ran
        conn.fetch_all("SELECT id FROM u", &[]).await.unwrap();

        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_statement_reports_error() {
        let mut conn = SqlxConnection::connect("sqlite::memory:").await.unwrap();
        let err = conn.execute_script("CREATE TABLE broken (").await.unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_not_retried() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(60),
        };
        let result = SqlxConnection::connect_with_retry("oracle://db/app", &policy).await;
        assert!(matches!(result, Err(MigrationError::Configuration(_))));
    }
}
