//! Migration Source - Loads migration definitions from a directory
//!
//! Filename and content parsing are pure functions so they can be exercised
//! without a filesystem; [`MigrationSource::load`] only adds the directory scan.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::definitions::{MigrationDefinition, DOWN_MARKER, MIGRATION_SUFFIX, UP_MARKER};
use crate::error::{MigrationError, MigrationResult, ParseError};

/// Separator between the version and the name in a migration filename
pub const VERSION_SEPARATOR: char = '_';

/// Reads migration definitions from one directory
#[derive(Debug, Clone)]
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every migration in the directory, ascending by version
    ///
    /// Files with a malformed name are logged and skipped. Two files sharing a
    /// version abort the load.
    pub fn load(&self) -> MigrationResult<Vec<MigrationDefinition>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| MigrationError::io(&self.dir, e))?;

        let mut migrations = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MigrationError::io(&self.dir, e))?;
            let path = entry.path();

            let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                tracing::warn!(path = %path.display(), "Skipping migration file with a non UTF-8 name");
                continue;
            };
            if !file_name.ends_with(MIGRATION_SUFFIX) {
                continue;
            }

            let file_type = entry.file_type().map_err(|e| MigrationError::io(&path, e))?;
            if !file_type.is_file() {
                continue;
            }

            // Check the name before reading so a bad name never costs a read
            if let Err(err) = parse_file_name(&file_name) {
                tracing::warn!("Skipping migration: {}", err);
                continue;
            }

            let content = fs::read_to_string(&path).map_err(|e| MigrationError::io(&path, e))?;
            match parse_definition(&file_name, &content) {
                Ok(Some(migration)) => migrations.push(migration),
                Ok(None) => {}
                Err(err) => tracing::warn!("Skipping migration: {}", err),
            }
        }

        sort_and_check(migrations)
    }
}

/// Sort ascending by version and reject duplicate versions
pub fn sort_and_check(mut migrations: Vec<MigrationDefinition>) -> MigrationResult<Vec<MigrationDefinition>> {
    migrations.sort_by(|a, b| a.version.cmp(&b.version).then_with(|| a.file_name.cmp(&b.file_name)));

    let mut seen: HashMap<i64, &str> = HashMap::with_capacity(migrations.len());
    for migration in &migrations {
        if let Some(first) = seen.insert(migration.version, &migration.file_name) {
            return Err(MigrationError::DuplicateVersion {
                version: migration.version,
                first: first.to_string(),
                second: migration.file_name.clone(),
            });
        }
    }

    Ok(migrations)
}

/// Split `<version>_<name>.sql` into its version and name
///
/// The caller is expected to have checked the suffix already.
pub fn parse_file_name(file_name: &str) -> Result<(i64, String), ParseError> {
    let stem = file_name.strip_suffix(MIGRATION_SUFFIX).unwrap_or(file_name);

    let (version_token, name) = stem
        .split_once(VERSION_SEPARATOR)
        .ok_or_else(|| ParseError::MissingSeparator {
            file: file_name.to_string(),
        })?;

    let version = version_token
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidVersion {
            file: file_name.to_string(),
            token: version_token.to_string(),
        })?;

    Ok((version, name.to_string()))
}

/// Split file content into trimmed UP and DOWN statements
///
/// Everything before the DOWN marker is the UP section, with the first UP
/// marker removed. Everything after the DOWN marker is the DOWN section, which
/// is empty when the marker is missing.
pub fn parse_content(content: &str) -> (String, String) {
    let (up_part, down_part) = match content.split_once(DOWN_MARKER) {
        Some((up, down)) => (up, down),
        None => (content, ""),
    };

    let up_sql = up_part.replacen(UP_MARKER, "", 1).trim().to_string();
    let down_sql = down_part.trim().to_string();

    (up_sql, down_sql)
}

/// Build a definition from a file name and its content
///
/// Returns `Ok(None)` for files that are not migrations at all.
pub fn parse_definition(file_name: &str, content: &str) -> Result<Option<MigrationDefinition>, ParseError> {
    if !file_name.ends_with(MIGRATION_SUFFIX) {
        return Ok(None);
    }

    let (version, name) = parse_file_name(file_name)?;
    let (up_sql, down_sql) = parse_content(content);

    Ok(Some(MigrationDefinition {
        version,
        name,
        up_sql,
        down_sql,
        file_name: file_name.to_string(),
    }))
}
