use std::fmt::Write as _;
use std::path::Path;

use shift_migrate::{
    create_migration, ConnectionConfig, MigrationConfig, Migrator, RetryPolicy, SqlxConnection, StatusReport,
};

use crate::error::CliError;

/// Where migrations live and how to reach the database
#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub config: MigrationConfig,
    /// `None` falls back to the `DB_*` environment variables
    pub database_url: Option<String>,
}

impl MigrateOptions {
    fn connection_config(&self) -> Result<ConnectionConfig, CliError> {
        let config = match &self.database_url {
            Some(url) => ConnectionConfig::new(url.clone()),
            None => ConnectionConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    async fn connect(&self) -> Result<(Migrator, SqlxConnection), CliError> {
        let migrator = Migrator::new(self.config.clone())?;
        let connection = self.connection_config()?;
        tracing::info!(database = %connection.redacted_url(), "Connecting to database");

        let conn = SqlxConnection::connect_with_retry(&connection.database_url, &RetryPolicy::default()).await?;
        Ok((migrator, conn))
    }
}

pub async fn create(dir: &Path, name: Option<&str>) -> Result<(), CliError> {
    let name = name.filter(|n| !n.trim().is_empty()).ok_or(CliError::MissingName)?;

    let path = create_migration(dir, name)?;
    println!("Created migration: {}", path.display());
    Ok(())
}

pub async fn up(options: &MigrateOptions, dry_run: bool) -> Result<(), CliError> {
    let (migrator, mut conn) = options.connect().await?;

    if dry_run {
        let pending = migrator.pending(&mut conn).await?;
        print!("{}", format_pending(&pending));
    } else {
        let result = migrator.up(&mut conn).await?;
        println!("Applied {} migration(s)", result.applied_count());
    }

    conn.close().await?;
    Ok(())
}

pub async fn down(options: &MigrateOptions, steps: usize) -> Result<(), CliError> {
    let (migrator, mut conn) = options.connect().await?;

    let result = migrator.down(&mut conn, steps).await?;
    println!("Rolled back {} migration(s)", result.rolled_back_count());
    for skipped in &result.irreversible {
        println!("Skipped {} ({}): no down migration", skipped.version, skipped.name);
    }

    conn.close().await?;
    Ok(())
}

pub async fn status(options: &MigrateOptions) -> Result<(), CliError> {
    let (migrator, mut conn) = options.connect().await?;

    let report = migrator.status(&mut conn).await?;
    print!("{}", format_status(&report));

    conn.close().await?;
    Ok(())
}

/// Render a status report as the tab separated table printed by `status`
pub fn format_status(report: &StatusReport) -> String {
    let mut out = String::from("Migration Status:\n================\n");

    if report.entries.is_empty() {
        out.push_str("No migrations found\n");
    }
    for entry in &report.entries {
        let _ = writeln!(out, "{}\t{}\t{}", entry.version, entry.state.label(), entry.name);
    }

    if !report.orphaned.is_empty() {
        out.push_str("\nApplied but missing from the migrations directory:\n");
        for orphan in &report.orphaned {
            let _ = writeln!(out, "{}\tOrphaned\t{}", orphan.version, orphan.name);
        }
    }

    out
}

fn format_pending(pending: &[shift_migrate::MigrationDefinition]) -> String {
    if pending.is_empty() {
        return "No pending migrations\n".to_string();
    }

    let mut out = format!("{} pending migration(s) would be applied:\n", pending.len());
    for migration in pending {
        let _ = writeln!(out, "{}\t{}", migration.version, migration.name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shift_migrate::{LedgerEntry, MigrationDefinition, MigrationState, StatusEntry};
    use tempfile::TempDir;

    #[test]
    fn test_format_status_empty() {
        assert_eq!(
            format_status(&StatusReport::default()),
            "Migration Status:\n================\nNo migrations found\n"
        );
    }

    #[test]
    fn test_format_status_rows_and_orphans() {
        let report = StatusReport {
            entries: vec![
                StatusEntry {
                    version: 1001,
                    name: "create_users".to_string(),
                    state: MigrationState::Applied { executed_at: None },
                },
                StatusEntry {
                    version: 1002,
                    name: "add_index".to_string(),
                    state: MigrationState::Pending,
                },
            ],
            orphaned: vec![LedgerEntry {
                version: 900,
                name: "old".to_string(),
                executed_at: None,
            }],
        };

        let out = format_status(&report);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[2], "1001\tApplied\tcreate_users");
        assert_eq!(lines[3], "1002\tPending\tadd_index");
        assert_eq!(lines.last(), Some(&"900\tOrphaned\told"));
    }

    #[test]
    fn test_format_pending() {
        assert_eq!(format_pending(&[]), "No pending migrations\n");

        let pending = vec![MigrationDefinition {
            version: 7,
            name: "seven".to_string(),
            up_sql: "SELECT 7".to_string(),
            down_sql: String::new(),
            file_name: "7_seven.sql".to_string(),
        }];
        assert_eq!(format_pending(&pending), "1 pending migration(s) would be applied:\n7\tseven\n");
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(create(temp_dir.path(), None).await, Err(CliError::MissingName)));
        assert!(matches!(create(temp_dir.path(), Some("  ")).await, Err(CliError::MissingName)));
    }

    #[tokio::test]
    async fn test_create_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        create(temp_dir.path(), Some("add users")).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    fn write_table_migration(dir: &Path, version: i64) {
        std::fs::write(
            dir.join(format!("{}_create_t{}.sql", version, version)),
            format!(
                "-- +migrate Up\nCREATE TABLE t{v} (id INTEGER);\n-- +migrate Down\nDROP TABLE t{v};\n",
                v = version
            ),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_up_and_dry_run_against_sqlite_file() {
        let temp_dir = TempDir::new().unwrap();
        let migrations_dir = temp_dir.path().join("migrations");
        std::fs::create_dir(&migrations_dir).unwrap();
        write_table_migration(&migrations_dir, 20240102030405);

        let database = temp_dir.path().join("shift.db");
        let options = MigrateOptions {
            config: MigrationConfig::new(&migrations_dir),
            database_url: Some(format!("sqlite://{}?mode=rwc", database.display())),
        };

        up(&options, false).await.unwrap();
        write_table_migration(&migrations_dir, 20240102030406);
        up(&options, true).await.unwrap();

        let (migrator, mut conn) = options.connect().await.unwrap();
        let report = migrator.status(&mut conn).await.unwrap();
        let states: Vec<(i64, &str)> = report.entries.iter().map(|e| (e.version, e.state.label())).collect();
        assert_eq!(states, vec![(20240102030405, "Applied"), (20240102030406, "Pending")]);
        conn.close().await.unwrap();

        down(&options, 1).await.unwrap();
        let (migrator, mut conn) = options.connect().await.unwrap();
        let pending = migrator.pending(&mut conn).await.unwrap();
        assert_eq!(pending.len(), 2);
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_scheme_is_configuration_error() {
        let options = MigrateOptions {
            config: MigrationConfig::default(),
            database_url: Some("oracle://db".to_string()),
        };
        assert!(matches!(
            status(&options).await,
            Err(CliError::Migration(shift_migrate::MigrationError::Configuration(_)))
        ));
    }
}
