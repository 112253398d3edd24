//! # shift-migrate: versioned SQL schema migrations
//!
//! Tracks which migrations have been applied in a ledger table, applies the
//! pending ones in version order and rolls back a bounded number of them.
//!
//! ```no_run
//! use shift_migrate::{MigrationConfig, Migrator, RetryPolicy, SqlxConnection};
//!
//! # async fn run() -> shift_migrate::MigrationResult<()> {
//! let mut conn = SqlxConnection::connect_with_retry("sqlite::memory:", &RetryPolicy::default()).await?;
//! let migrator = Migrator::new(MigrationConfig::new("migrations"))?;
//! let result = migrator.up(&mut conn).await?;
//! println!("applied {} migrations", result.applied_count());
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod migrations;

pub use backends::{DatabaseBackendType, DatabaseConnection, RetryPolicy, SqlDialect, SqlxConnection};
pub use config::ConnectionConfig;
pub use error::*;
pub use migrations::*;
