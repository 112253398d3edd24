//! Shared helpers for the SQLite-backed integration tests

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use shift_migrate::backends::{DatabaseRow, DatabaseValue, QueryError};
use shift_migrate::{DatabaseConnection, MigrationConfig, Migrator, SqlDialect, SqlxConnection};

/// Wraps a real connection and remembers every migration body it executes
pub struct RecordingConnection {
    inner: SqlxConnection,
    pub scripts: Vec<String>,
}

impl RecordingConnection {
    pub async fn sqlite() -> Self {
        let inner = SqlxConnection::connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        Self {
            inner,
            scripts: Vec::new(),
        }
    }

    pub fn take_scripts(&mut self) -> Vec<String> {
        std::mem::take(&mut self.scripts)
    }

    /// Names of user tables currently present, ledger excluded
    pub async fn tables(&mut self) -> Vec<String> {
        let rows = self
            .inner
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name <> 'migrations' ORDER BY name",
                &[],
            )
            .await
            .expect("list tables");
        rows.iter()
            .map(|row| row.get_string("name").unwrap().unwrap())
            .collect()
    }

    /// Whether the ledger table has been created
    pub async fn has_ledger(&mut self) -> bool {
        let rows = self
            .inner
            .fetch_all(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'migrations'",
                &[],
            )
            .await
            .expect("list tables");
        !rows.is_empty()
    }

    /// Versions recorded in the ledger, ascending
    pub async fn recorded_versions(&mut self) -> Vec<i64> {
        let rows = self
            .inner
            .fetch_all(
                "SELECT CAST(version AS TEXT) AS version FROM migrations ORDER BY migrations.version",
                &[],
            )
            .await
            .expect("read ledger");
        rows.iter().map(|row| row.get_i64("version").unwrap()).collect()
    }
}

#[async_trait]
impl DatabaseConnection for RecordingConnection {
    fn dialect(&self) -> SqlDialect {
        self.inner.dialect()
    }

    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64, QueryError> {
        self.inner.execute(sql, params).await
    }

    async fn execute_script(&mut self, sql: &str) -> Result<(), QueryError> {
        self.scripts.push(sql.to_string());
        self.inner.execute_script(sql).await
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<Vec<DatabaseRow>, QueryError> {
        self.inner.fetch_all(sql, params).await
    }
}

/// Refuses to record one version in the ledger; everything else passes through
pub struct RejectRecordConnection {
    pub inner: RecordingConnection,
    pub reject_version: i64,
}

#[async_trait]
impl DatabaseConnection for RejectRecordConnection {
    fn dialect(&self) -> SqlDialect {
        self.inner.dialect()
    }

    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64, QueryError> {
        let rejected = sql.starts_with("INSERT INTO migrations")
            && params.first().and_then(DatabaseValue::as_i64) == Some(self.reject_version);
        if rejected {
            return Err(QueryError::new("disk I/O error"));
        }
        self.inner.execute(sql, params).await
    }

    async fn execute_script(&mut self, sql: &str) -> Result<(), QueryError> {
        self.inner.execute_script(sql).await
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<Vec<DatabaseRow>, QueryError> {
        self.inner.fetch_all(sql, params).await
    }
}

/// Write `<version>_<name>.sql` with the given sections
pub fn write_migration(dir: &Path, version: i64, name: &str, up: &str, down: &str) {
    let content = format!("-- +migrate Up\n{}\n\n-- +migrate Down\n{}\n", up, down);
    fs::write(dir.join(format!("{}_{}.sql", version, name)), content).expect("write migration");
}

/// A migration creating table `t<version>` and dropping it on the way down
pub fn write_table_migration(dir: &Path, version: i64) {
    write_migration(
        dir,
        version,
        &format!("create_t{}", version),
        &format!("CREATE TABLE t{} (id INTEGER PRIMARY KEY);", version),
        &format!("DROP TABLE t{};", version),
    );
}

pub fn migrator(dir: &Path) -> Migrator {
    Migrator::new(MigrationConfig::new(dir)).expect("valid config")
}
