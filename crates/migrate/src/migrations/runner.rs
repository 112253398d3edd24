//! Migration Runner - Executes migrations against the database
//!
//! The [`Migrator`] combines a [`MigrationSource`] with a [`Ledger`]. Each
//! action borrows the caller's connection, runs to completion one statement at
//! a time and records progress in the ledger after every successful step.
//! Nothing already applied is undone when a later step fails.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use super::definitions::{
    LedgerEntry, MigrationConfig, MigrationDefinition, MigrationRunResult, MigrationState, StatusEntry,
    StatusReport,
};
use super::ledger::Ledger;
use super::source::MigrationSource;
use crate::backends::DatabaseConnection;
use crate::error::{MigrationDirection, MigrationError, MigrationResult};

/// Migration runner that executes migrations against a database
#[derive(Debug, Clone)]
pub struct Migrator {
    source: MigrationSource,
    ledger: Ledger,
}

impl Migrator {
    /// Create a new migrator; fails if the ledger table name is not a plain identifier
    pub fn new(config: MigrationConfig) -> MigrationResult<Self> {
        config.validate()?;
        Ok(Self {
            source: MigrationSource::new(config.migrations_dir),
            ledger: Ledger::new(config.migrations_table)?,
        })
    }

    pub fn source(&self) -> &MigrationSource {
        &self.source
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Apply every pending migration in ascending version order
    pub async fn up(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();

        let (migrations, applied) = self.prepare(conn).await?;
        let pending = pending_migrations(&migrations, &applied);

        if pending.is_empty() {
            tracing::info!("No pending migrations");
        }

        let mut result = MigrationRunResult {
            applied: Vec::with_capacity(pending.len()),
            skipped_count: migrations.len() - pending.len(),
            execution_time_ms: 0,
        };

        for migration in pending {
            tracing::info!(version = migration.version, name = %migration.name, "Applying migration");

            self.execute_body(conn, migration, MigrationDirection::Up).await?;

            if let Err(err) = self.ledger.record(conn, migration.version, &migration.name).await {
                tracing::error!(
                    version = migration.version,
                    "Migration {} was applied to the schema but could not be recorded; the ledger needs manual repair",
                    migration.version
                );
                return Err(err);
            }

            tracing::info!(version = migration.version, "Migration applied successfully");
            result.applied.push(migration.summary());
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        tracing::info!(
            applied = result.applied.len(),
            skipped = result.skipped_count,
            elapsed_ms = result.execution_time_ms as u64,
            "All migrations applied successfully"
        );

        Ok(result)
    }

    /// Migrations [`up`](Self::up) would apply, without executing anything
    ///
    /// Leaves the database untouched: a missing ledger table means nothing
    /// has been applied yet and is not created here.
    pub async fn pending(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<Vec<MigrationDefinition>> {
        let migrations = self.source.load()?;
        let applied = if self.ledger.exists(conn).await? {
            self.ledger.applied_versions(conn).await?
        } else {
            HashSet::new()
        };
        Ok(pending_migrations(&migrations, &applied).into_iter().cloned().collect())
    }

    /// Classify every known migration as applied or pending
    pub async fn status(&self, conn: &mut dyn DatabaseConnection) -> MigrationResult<StatusReport> {
        self.ledger.ensure_table(conn).await?;
        let migrations = self.source.load()?;
        let entries = self.ledger.entries(conn).await?;

        let report = build_status(&migrations, entries);
        for orphan in &report.orphaned {
            tracing::warn!(
                version = orphan.version,
                name = %orphan.name,
                "Ledger records a migration with no matching file"
            );
        }

        Ok(report)
    }

    /// Ensure the ledger exists, then load definitions and the applied set
    pub(crate) async fn prepare(
        &self,
        conn: &mut dyn DatabaseConnection,
    ) -> MigrationResult<(Vec<MigrationDefinition>, HashSet<i64>)> {
        self.ledger.ensure_table(conn).await?;
        let migrations = self.source.load()?;
        let applied = self.ledger.applied_versions(conn).await?;
        Ok((migrations, applied))
    }

    /// Run the UP or DOWN body of a migration; an empty body runs nothing
    pub(crate) async fn execute_body(
        &self,
        conn: &mut dyn DatabaseConnection,
        migration: &MigrationDefinition,
        direction: MigrationDirection,
    ) -> MigrationResult<()> {
        let sql = match direction {
            MigrationDirection::Up => &migration.up_sql,
            MigrationDirection::Down => &migration.down_sql,
        };

        if sql.trim().is_empty() {
            tracing::debug!(version = migration.version, %direction, "Empty migration body, nothing to execute");
            return Ok(());
        }

        tracing::debug!(version = migration.version, %direction, sql = %sql, "Executing migration body");
        conn.execute_script(sql)
            .await
            .map_err(|e| MigrationError::Execution {
                version: migration.version,
                name: migration.name.clone(),
                direction,
                message: e.to_string(),
            })
    }
}

/// Definitions not yet in the applied set, keeping the ascending order
pub fn pending_migrations<'a>(
    migrations: &'a [MigrationDefinition],
    applied: &HashSet<i64>,
) -> Vec<&'a MigrationDefinition> {
    migrations
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect()
}

/// Pair each definition with its ledger row and collect rows without a file
pub fn build_status(migrations: &[MigrationDefinition], entries: Vec<LedgerEntry>) -> StatusReport {
    let mut by_version: HashMap<i64, LedgerEntry> = entries.into_iter().map(|e| (e.version, e)).collect();

    let entries = migrations
        .iter()
        .map(|migration| {
            let state = match by_version.remove(&migration.version) {
                Some(entry) => MigrationState::Applied {
                    executed_at: entry.executed_at,
                },
                None => MigrationState::Pending,
            };
            StatusEntry {
                version: migration.version,
                name: migration.name.clone(),
                state,
            }
        })
        .collect();

    let mut orphaned: Vec<LedgerEntry> = by_version.into_values().collect();
    orphaned.sort_by_key(|e| e.version);

    StatusReport { entries, orphaned }
}
