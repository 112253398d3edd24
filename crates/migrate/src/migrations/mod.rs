//! Migration System
//!
//! - [`source`]: reads and parses migration files
//! - [`ledger`]: the table of applied versions
//! - [`runner`]: the [`Migrator`] and its apply/status actions
//! - [`rollback`]: bounded rollback
//! - [`authoring`]: new migration files

pub mod authoring;
pub mod definitions;
pub mod ledger;
pub mod rollback;
pub mod runner;
pub mod source;

pub use authoring::{create_migration, create_migration_at};
pub use definitions::*;
pub use ledger::Ledger;
pub use rollback::{plan_rollback, RollbackPlan};
pub use runner::Migrator;
pub use source::MigrationSource;
