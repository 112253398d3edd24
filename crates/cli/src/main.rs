mod commands;
mod error;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use commands::migrate::{self, MigrateOptions};
use error::CliError;
use logging::{init_logging, LogFormat, LoggingConfig};
use shift_migrate::MigrationConfig;

#[derive(Parser, Debug)]
#[command(name = "shift")]
#[command(about = "Apply, roll back, inspect and create versioned SQL schema migrations")]
#[command(version)]
struct Cli {
    /// Migration action to run
    #[arg(long, value_enum, default_value_t = Action::Up)]
    action: Action,

    /// Number of migrations to roll back (down only)
    #[arg(long, default_value_t = 1)]
    steps: usize,

    /// Name for the new migration (required for create)
    #[arg(long)]
    name: Option<String>,

    /// Directory containing migration files
    #[arg(long, default_value = "migrations")]
    dir: PathBuf,

    /// Database URL; when unset, composed from DB_USER, DB_PASSWORD, DB_HOST, DB_PORT and DB_NAME
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Ledger table name
    #[arg(long, env = "SHIFT_MIGRATIONS_TABLE", default_value = "migrations")]
    table: String,

    /// List pending migrations without applying them (up only)
    #[arg(long)]
    dry_run: bool,

    /// Log filter, e.g. "info" or "shift_migrate=debug"
    #[arg(long, env = "SHIFT_LOG", default_value = "info")]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Apply every pending migration
    Up,
    /// Roll back the most recent migrations
    Down,
    /// Show applied and pending migrations
    Status,
    /// Create a new, empty migration file
    Create,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Status => "status",
            Action::Create => "create",
        }
    }
}

impl Cli {
    fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::new(&self.log_level, self.log_format)
            .with_global_field("action", self.action.as_str())
            .with_global_field("dir", self.dir.display().to_string())
    }

    fn migrate_options(&self) -> MigrateOptions {
        MigrateOptions {
            config: MigrationConfig::new(&self.dir).with_table(&self.table),
            database_url: self.database_url.clone(),
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    init_logging(cli.logging_config())?;

    match cli.action {
        Action::Up => migrate::up(&cli.migrate_options(), cli.dry_run).await,
        Action::Down => migrate::down(&cli.migrate_options(), cli.steps).await,
        Action::Status => migrate::status(&cli.migrate_options()).await,
        Action::Create => migrate::create(&cli.dir, cli.name.as_deref()).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    #[serial_test::serial]
    fn test_defaults() {
        std::env::remove_var("SHIFT_MIGRATIONS_TABLE");
        std::env::remove_var("SHIFT_LOG");

        let cli = Cli::try_parse_from(["shift"]).unwrap();
        assert_eq!(cli.action, Action::Up);
        assert_eq!(cli.steps, 1);
        assert_eq!(cli.dir, PathBuf::from("migrations"));
        assert_eq!(cli.table, "migrations");
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.log_format, LogFormat::Text);
        assert!(!cli.dry_run);
        assert!(cli.name.is_none());
    }

    #[test]
    fn test_parses_every_action() {
        let cli = Cli::try_parse_from(["shift", "--action", "down", "--steps", "3"]).unwrap();
        assert_eq!(cli.action, Action::Down);
        assert_eq!(cli.steps, 3);

        let cli = Cli::try_parse_from(["shift", "--action", "create", "--name", "add_users", "--dir", "db"]).unwrap();
        assert_eq!(cli.action, Action::Create);
        assert_eq!(cli.name.as_deref(), Some("add_users"));
        assert_eq!(cli.dir, PathBuf::from("db"));

        let cli = Cli::try_parse_from(["shift", "--action", "status", "--log-format", "json"]).unwrap();
        assert_eq!(cli.action, Action::Status);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_unknown_action_and_bad_steps() {
        assert!(Cli::try_parse_from(["shift", "--action", "sideways"]).is_err());
        assert!(Cli::try_parse_from(["shift", "--action", "down", "--steps", "-1"]).is_err());
        assert!(Cli::try_parse_from(["shift", "--action", "down", "--steps", "two"]).is_err());
    }

    #[test]
    fn test_logging_config_tags_action() {
        let cli = Cli::try_parse_from(["shift", "--action", "down", "--log-level", "debug"]).unwrap();
        let config = cli.logging_config();

        assert_eq!(config.level, "debug");
        assert_eq!(config.global_fields["action"], "down");
        assert_eq!(config.global_fields["dir"], "migrations");
    }

    #[test]
    fn test_migrate_options_carry_dir_and_table() {
        let cli = Cli::try_parse_from([
            "shift",
            "--dir",
            "db/migrations",
            "--table",
            "ledger",
            "--database-url",
            "sqlite::memory:",
        ])
        .unwrap();

        let options = cli.migrate_options();
        assert_eq!(options.config.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(options.config.migrations_table, "ledger");
        assert_eq!(options.database_url.as_deref(), Some("sqlite::memory:"));
    }
}
