use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, SqlDriftError};
use crate::executor::{Database, Row};

pub const DEFAULT_TABLE: &str = "migrations";

const BACKUP_INFIX: &str = "_backup_";
// Leaves room for `_backup_<version>_<8 hex>` within a 64 character identifier.
const MAX_TABLE_NAME_LEN: usize = 44;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub table: String,
}

impl LedgerConfig {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}

fn validate_identifier(name: &str) -> Result<()> {
    if is_plain_identifier(name) && name.len() <= MAX_TABLE_NAME_LEN {
        Ok(())
    } else {
        Err(SqlDriftError::InvalidIdentifier(name.to_string()))
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub version: String,
    pub description: Option<String>,
    pub executed_at: NaiveDateTime,
    pub checksum: String,
}

impl LedgerEntry {
    fn from_row(row: &Row) -> Result<Self> {
        let version = row
            .get(0)
            .ok_or_else(|| SqlDriftError::Ledger("row without version".to_string()))?
            .to_string();

        let executed_at = row
            .get(2)
            .ok_or_else(|| SqlDriftError::Ledger(format!("version {version} has no executed_at")))
            .and_then(parse_timestamp)?;

        let checksum = row
            .get(3)
            .ok_or_else(|| SqlDriftError::Ledger(format!("version {version} has no checksum")))?
            .to_string();

        Ok(Self {
            description: row.get(1).map(|d| d.to_string()),
            version,
            executed_at,
            checksum,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| SqlDriftError::Ledger(format!("unreadable executed_at timestamp: {value}")))
}

/// The persisted record of applied migrations, one row per version.
///
/// Nothing is cached: every call reads or writes through the database.
pub struct Ledger<'a> {
    db: &'a dyn Database,
    table: String,
}

impl<'a> Ledger<'a> {
    pub fn new(db: &'a dyn Database, config: &LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            db,
            table: config.table.clone(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(name: &str) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {name} (
                version VARCHAR(180) PRIMARY KEY,
                description VARCHAR(255),
                executed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                checksum VARCHAR(64)
            )
            "#,
            name = name,
        )
    }

    /// Creates the ledger table if absent. Safe to call on every start.
    pub fn ensure_schema(&self) -> Result<()> {
        debug!("Ensuring ledger table {}", self.table);
        self.db.execute_batch(&Self::create_table_sql(&self.table))
    }

    pub fn exists(&self) -> Result<bool> {
        self.db.table_exists(&self.table)
    }

    pub fn get_checksum(&self, version: &str) -> Result<Option<String>> {
        let sql = format!("SELECT checksum FROM {} WHERE version = ?", self.table);
        match self.db.query_row(&sql, &[version])? {
            None => Ok(None),
            Some(row) => row.get(0).map(|c| Some(c.to_string())).ok_or_else(|| {
                SqlDriftError::Ledger(format!("version {version} is recorded without a checksum"))
            }),
        }
    }

    pub fn get_entry(&self, version: &str) -> Result<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT version, description, executed_at, checksum FROM {} WHERE version = ?",
            self.table
        );
        self.db
            .query_row(&sql, &[version])?
            .map(|row| LedgerEntry::from_row(&row))
            .transpose()
    }

    /// Inserts a row for a newly applied version. An existing row is an
    /// invariant violation, since callers check for one first.
    pub fn record_new(&self, version: &str, description: &str, checksum: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (version, description, checksum) VALUES (?, ?, ?)",
            self.table
        );

        match self.db.execute(&sql, &[version, description, checksum]) {
            Ok(_) => Ok(()),
            Err(SqlDriftError::Database(e)) if e.is_constraint_violation() => {
                Err(SqlDriftError::DuplicateKeyViolation(version.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Stores a new checksum and refreshes `executed_at`.
    pub fn record_update(&self, version: &str, checksum: &str) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET checksum = ?, executed_at = CURRENT_TIMESTAMP WHERE version = ?",
            self.table
        );

        match self.db.execute(&sql, &[checksum, version])? {
            0 => Err(SqlDriftError::NotFound(version.to_string())),
            _ => Ok(()),
        }
    }

    pub fn list_all(&self) -> Result<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT version, description, executed_at, checksum FROM {} ORDER BY version",
            self.table
        );
        self.db
            .query(&sql, &[])?
            .iter()
            .map(LedgerEntry::from_row)
            .collect()
    }

    fn backup_prefix(&self) -> String {
        format!("{}{}", self.table, BACKUP_INFIX)
    }

    /// A fresh backup table name for one re-apply attempt of `version`.
    pub fn backup_table_name(&self, version: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}{}_{}", self.backup_prefix(), version, &suffix[..8])
    }

    /// Copies the whole ledger, structure and rows, into `backup`. The
    /// structure is taken from the live table, so columns added to the
    /// ledger later are carried over.
    pub fn backup_to(&self, backup: &str) -> Result<()> {
        validate_backup_name(backup)?;
        debug!("Backing up ledger {} to {}", self.table, backup);

        let ddl = self
            .db
            .table_definition(&self.table)?
            .ok_or_else(|| SqlDriftError::Ledger(format!("ledger table {} not found", self.table)))?;
        let columns = ddl
            .find('(')
            .map(|start| &ddl[start..])
            .ok_or_else(|| SqlDriftError::Ledger(format!("unreadable definition of {}: {ddl}", self.table)))?;

        self.db.execute_batch(&format!("CREATE TABLE {backup} {columns}"))?;
        self.db
            .execute_batch(&format!("INSERT INTO {} SELECT * FROM {}", backup, self.table))
    }

    /// Replaces the live ledger with `backup`.
    pub fn restore_from(&self, backup: &str) -> Result<()> {
        validate_backup_name(backup)?;
        info!("Restoring ledger {} from {}", self.table, backup);
        self.db.drop_table(&self.table)?;
        self.db.rename_table(backup, &self.table)
    }

    /// Backup tables left behind by an earlier attempt whose restore did not
    /// complete.
    pub fn orphaned_backups(&self) -> Result<Vec<String>> {
        self.db.list_tables(&self.backup_prefix())
    }

    pub fn prune_backups(&self) -> Result<Vec<String>> {
        let orphans = self.orphaned_backups()?;
        for name in &orphans {
            info!("Dropping backup table {}", name);
            self.db.drop_table(name)?;
        }
        Ok(orphans)
    }
}

fn validate_backup_name(name: &str) -> Result<()> {
    if is_plain_identifier(name) {
        Ok(())
    } else {
        Err(SqlDriftError::InvalidIdentifier(name.to_string()))
    }
}
