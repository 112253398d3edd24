//! Migration Rollback - Reverts the most recently applied migrations
//!
//! Applied migrations are walked from the highest version down. Migrations
//! without DOWN statements cannot be reverted: they are reported, stay
//! recorded, and do not count against the requested number of steps.

use std::collections::HashSet;
use std::time::Instant;

use super::definitions::{MigrationDefinition, RollbackResult};
use super::runner::Migrator;
use crate::backends::DatabaseConnection;
use crate::error::{MigrationDirection, MigrationResult};

/// What a rollback of `steps` migrations will touch
#[derive(Debug, Default)]
pub struct RollbackPlan<'a> {
    /// Revertible migrations to run DOWN for, highest version first
    pub revert: Vec<&'a MigrationDefinition>,
    /// Applied migrations passed over on the way because they lack DOWN statements
    pub irreversible: Vec<&'a MigrationDefinition>,
}

/// Collect up to `steps` revertible applied migrations, newest first
pub fn plan_rollback<'a>(
    migrations: &'a [MigrationDefinition],
    applied: &HashSet<i64>,
    steps: usize,
) -> RollbackPlan<'a> {
    let mut plan = RollbackPlan::default();
    if steps == 0 {
        return plan;
    }

    for migration in migrations.iter().rev().filter(|m| applied.contains(&m.version)) {
        if migration.is_revertible() {
            plan.revert.push(migration);
            if plan.revert.len() >= steps {
                break;
            }
        } else {
            plan.irreversible.push(migration);
        }
    }

    plan
}

impl Migrator {
    /// Revert the `steps` most recent revertible migrations
    pub async fn down(&self, conn: &mut dyn DatabaseConnection, steps: usize) -> MigrationResult<RollbackResult> {
        let start_time = Instant::now();

        let (migrations, applied) = self.prepare(conn).await?;
        let plan = plan_rollback(&migrations, &applied, steps);

        for migration in &plan.irreversible {
            tracing::warn!(
                version = migration.version,
                name = %migration.name,
                "No down migration; it stays applied"
            );
        }

        let mut rolled_back = Vec::with_capacity(plan.revert.len());
        for migration in &plan.revert {
            tracing::info!(version = migration.version, name = %migration.name, "Rolling back migration");

            self.execute_body(conn, migration, MigrationDirection::Down).await?;
            self.ledger().remove(conn, migration.version).await?;

            tracing::info!(version = migration.version, "Migration rolled back successfully");
            rolled_back.push(migration.summary());
        }

        let result = RollbackResult {
            rolled_back,
            irreversible: plan.irreversible.iter().map(|m| m.summary()).collect(),
            execution_time_ms: start_time.elapsed().as_millis(),
        };

        tracing::info!(
            rolled_back = result.rolled_back.len(),
            irreversible = result.irreversible.len(),
            "Rolled back {} migrations",
            result.rolled_back.len()
        );

        Ok(result)
    }
}
