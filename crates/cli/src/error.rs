use shift_migrate::MigrationError;
use thiserror::Error;

/// Errors surfaced by the `shift` binary
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("--name is required for the create action")]
    MissingName,

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
