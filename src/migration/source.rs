use crate::drift::digest;
use crate::error::{Result, SqlDriftError};

pub const DEFAULT_DESCRIPTION: &str = "SQL Migration";

const INLINE_ORIGIN: &str = "<inline>";

/// Exactly three ASCII digits, zero-padded.
pub fn is_valid_version(version: &str) -> bool {
    version.len() == 3 && version.bytes().all(|b| b.is_ascii_digit())
}

/// One migration as found on disk or registered in code.
///
/// The checksum is computed once from the SQL body and never recomputed;
/// there are no mutators, so it always matches the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSource {
    version: String,
    description: String,
    sql: String,
    checksum: String,
    origin: String,
}

impl MigrationSource {
    pub fn new(
        version: impl Into<String>,
        description: impl Into<String>,
        sql: impl Into<String>,
    ) -> Result<Self> {
        let version = version.into();
        if !is_valid_version(&version) {
            return Err(SqlDriftError::InvalidVersionFormat(version));
        }

        let sql = sql.into();
        let checksum = digest(&sql);

        Ok(Self {
            version,
            description: description.into(),
            sql,
            checksum,
            origin: INLINE_ORIGIN.to_string(),
        })
    }

    /// Records where the migration came from (a file path), for error messages.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_versions_accepted() {
        for version in ["000", "001", "042", "999"] {
            let source = MigrationSource::new(version, "desc", "SELECT 1").unwrap();
            assert_eq!(source.version(), version);
        }
    }

    #[test]
    fn test_invalid_versions_rejected() {
        for version in ["", "1", "01", "0001", "abc", "01a", " 001", "001 ", "١٢٣"] {
            let err = MigrationSource::new(version, "desc", "SELECT 1").unwrap_err();
            assert!(
                matches!(err, SqlDriftError::InvalidVersionFormat(ref v) if v == version),
                "expected InvalidVersionFormat for {:?}, got {:?}",
                version,
                err
            );
        }
    }

    #[test]
    fn test_checksum_matches_sql() {
        let sql = "CREATE TABLE users (id INTEGER PRIMARY KEY)";
        let source = MigrationSource::new("001", "create users", sql).unwrap();
        assert_eq!(source.checksum(), digest(sql));
        assert_eq!(source.sql(), sql);
        assert_eq!(source.description(), "create users");
    }

    #[test]
    fn test_origin_does_not_affect_checksum() {
        let source = MigrationSource::new("001", "d", "SELECT 1").unwrap();
        let checksum = source.checksum().to_string();
        assert_eq!(source.origin(), "<inline>");

        let source = source.with_origin("migrations/001_init.sql");
        assert_eq!(source.checksum(), checksum);
        assert_eq!(source.origin(), "migrations/001_init.sql");
    }
}
