//! Core Database Backend Traits
//!
//! The migration engine talks to the target database exclusively through
//! [`DatabaseConnection`]. The caller owns the connection; every engine
//! operation only borrows it for the duration of one action.

use async_trait::async_trait;

/// Driver-neutral failure reported by a [`DatabaseConnection`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        QueryError::new(err.to_string())
    }
}

/// Abstract database connection trait
#[async_trait]
pub trait DatabaseConnection: Send {
    /// SQL dialect spoken by this connection
    fn dialect(&self) -> SqlDialect;

    /// Execute a single parameterised statement and return the affected rows count
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> Result<u64, QueryError>;

    /// Execute raw SQL text that may contain several statements
    async fn execute_script(&mut self, sql: &str) -> Result<(), QueryError>;

    /// Execute a query and return the result rows
    async fn fetch_all(
        &mut self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> Result<Vec<DatabaseRow>, QueryError>;
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Int64(i64),
    String(String),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int64(v) => Some(*v),
            DatabaseValue::String(s) => s.trim().parse().ok(),
            DatabaseValue::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// A fetched row, decoded eagerly into [`DatabaseValue`]s
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatabaseRow {
    columns: Vec<(String, DatabaseValue)>,
}

impl DatabaseRow {
    pub fn new(columns: Vec<(String, DatabaseValue)>) -> Self {
        Self { columns }
    }

    /// Get a column value by name
    pub fn get_by_name(&self, name: &str) -> Result<&DatabaseValue, QueryError> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
            .ok_or_else(|| QueryError::new(format!("Column '{}' not found", name)))
    }

    /// Integer column, also accepting integers read back as decimal text
    pub fn get_i64(&self, name: &str) -> Result<i64, QueryError> {
        let value = self.get_by_name(name)?;
        match value {
            DatabaseValue::Int64(i) => Ok(*i),
            DatabaseValue::String(s) => s
                .trim()
                .parse()
                .map_err(|_| QueryError::new(format!("Column '{}' is not an integer: {:?}", name, value))),
            DatabaseValue::Null => Err(QueryError::new(format!("Column '{}' is NULL", name))),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<Option<String>, QueryError> {
        match self.get_by_name(name)? {
            DatabaseValue::Null => Ok(None),
            DatabaseValue::String(s) => Ok(Some(s.clone())),
            DatabaseValue::Int64(i) => Ok(Some(i.to_string())),
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder style for this dialect
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Type name to CAST a timestamp into so it can be read back as text
    pub fn text_cast_type(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => "TEXT",
            SqlDialect::MySQL => "CHAR",
        }
    }
}
