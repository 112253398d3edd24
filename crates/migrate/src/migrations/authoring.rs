//! Migration Authoring - Generates new, empty migration files

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::definitions::{DOWN_MARKER, MIGRATION_SUFFIX, UP_MARKER};
use super::source::{parse_file_name, VERSION_SEPARATOR};
use crate::error::{MigrationError, MigrationResult};

/// Fixed-width timestamp used as the version of new migrations
pub const VERSION_FORMAT: &str = "%Y%m%d%H%M%S";

/// Create a new migration file in `dir` stamped with the current time
pub fn create_migration(dir: impl AsRef<Path>, name: &str) -> MigrationResult<PathBuf> {
    create_migration_at(dir, name, Utc::now())
}

/// Create a new migration file in `dir` stamped with `now`
///
/// If a migration in the directory already uses a version at or above the
/// timestamp, the new version is one past the highest existing one.
pub fn create_migration_at(dir: impl AsRef<Path>, name: &str, now: DateTime<Utc>) -> MigrationResult<PathBuf> {
    let dir = dir.as_ref();
    let file_stem_name = normalize_name(name)?;

    fs::create_dir_all(dir).map_err(|e| MigrationError::io(dir, e))?;

    let stamped: i64 = now
        .format(VERSION_FORMAT)
        .to_string()
        .parse()
        .map_err(|e| MigrationError::Configuration(format!("Unusable clock value {}: {}", now, e)))?;
    let version = match highest_version(dir)? {
        Some(highest) if highest >= stamped => highest.checked_add(1).ok_or_else(|| {
            MigrationError::Configuration(format!(
                "{} already holds version {}, no higher version is available",
                dir.display(),
                highest
            ))
        })?,
        _ => stamped,
    };

    let filename = format!("{}{}{}{}", version, VERSION_SEPARATOR, file_stem_name, MIGRATION_SUFFIX);
    let filepath = dir.join(&filename);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&filepath)
        .map_err(|e| MigrationError::io(&filepath, e))?;
    file.write_all(migration_template().as_bytes())
        .map_err(|e| MigrationError::io(&filepath, e))?;

    tracing::info!(path = %filepath.display(), version, "Migration created");
    Ok(filepath)
}

/// Template content: empty UP and DOWN sections
pub fn migration_template() -> String {
    format!("{}\n\n\n{}\n\n", UP_MARKER, DOWN_MARKER)
}

/// Replace spaces with underscores and refuse names that cannot be a file name
fn normalize_name(name: &str) -> MigrationResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MigrationError::InvalidName("name must not be empty".to_string()));
    }
    if trimmed.contains(|c: char| c == '/' || c == '\\') || trimmed.contains("..") {
        return Err(MigrationError::InvalidName(format!(
            "'{}' must not contain path separators",
            name
        )));
    }

    Ok(trimmed.replace(' ', "_"))
}

/// Highest version among well-formed migration files already in `dir`
fn highest_version(dir: &Path) -> MigrationResult<Option<i64>> {
    let entries = fs::read_dir(dir).map_err(|e| MigrationError::io(dir, e))?;

    let mut highest = None;
    for entry in entries {
        let entry = entry.map_err(|e| MigrationError::io(dir, e))?;
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !file_name.ends_with(MIGRATION_SUFFIX) {
            continue;
        }
        if let Ok((version, _)) = parse_file_name(file_name) {
            highest = highest.max(Some(version));
        }
    }

    Ok(highest)
}
