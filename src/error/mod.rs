mod db_error;
mod parser;

use thiserror::Error;

pub use db_error::{DatabaseError, DatabaseErrorKind};
pub use parser::{parse_sqlite_error, ErrorContext};

#[derive(Error, Debug)]
pub enum SqlDriftError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid version format '{0}': version must be exactly 3 digits like 001")]
    InvalidVersionFormat(String),

    #[error("SQL migration filename must start with exactly 3 digits: {0}")]
    InvalidFilename(String),

    #[error("Invalid migration source {path}: {reason}")]
    InvalidMigrationSource { path: String, reason: String },

    #[error("Duplicate migration version {version}: {first} and {second}")]
    DuplicateVersion {
        version: String,
        first: String,
        second: String,
    },

    #[error("Ledger already has an entry for version {0}")]
    DuplicateKeyViolation(String),

    #[error("No ledger entry for version {0}")]
    NotFound(String),

    #[error("Migration {version} failed: {source}")]
    MigrationExecutionFailed {
        version: String,
        #[source]
        source: Box<SqlDriftError>,
    },

    #[error("Failed to update migration {version}: {source}")]
    MigrationUpdateFailed {
        version: String,
        #[source]
        source: Box<SqlDriftError>,
    },

    #[error("Integrity drift: {count} applied migration(s) no longer match their source")]
    IntegrityDrift { count: usize },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SqlDriftError {
    /// The driver error at the bottom of a wrapped migration failure, if any.
    pub fn database_error(&self) -> Option<&DatabaseError> {
        match self {
            SqlDriftError::Database(e) => Some(e),
            SqlDriftError::MigrationExecutionFailed { source, .. }
            | SqlDriftError::MigrationUpdateFailed { source, .. } => source.database_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SqlDriftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_unwraps_nested_failures() {
        let db = DatabaseError::new(
            DatabaseErrorKind::Syntax,
            "near \"SELEC\": syntax error",
            ErrorContext::new().with_operation("execute_batch"),
        );
        let err = SqlDriftError::MigrationUpdateFailed {
            version: "001".to_string(),
            source: Box::new(SqlDriftError::Database(db)),
        };

        let inner = err.database_error().unwrap();
        assert_eq!(inner.kind(), DatabaseErrorKind::Syntax);
        assert!(err.to_string().contains("Failed to update migration 001"));
    }

    #[test]
    fn test_database_error_absent_for_validation_errors() {
        let err = SqlDriftError::InvalidVersionFormat("1".to_string());
        assert!(err.database_error().is_none());
    }
}
