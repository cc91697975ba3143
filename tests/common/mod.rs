#![allow(dead_code)]

use sqldrift::{
    Database, Ledger, LedgerConfig, LedgerEntry, MigrationSource, Result, Row, SqlDriftError,
    SqliteDatabase,
};

/// SQLite with transaction control turned into no-ops, standing in for
/// backends whose DDL commits implicitly.
pub struct AutocommitDatabase(pub SqliteDatabase);

impl AutocommitDatabase {
    pub fn in_memory() -> Self {
        Self(SqliteDatabase::in_memory().unwrap())
    }
}

impl Database for AutocommitDatabase {
    fn execute_batch(&self, sql: &str) -> Result<()> {
        self.0.execute_batch(sql)
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize> {
        self.0.execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        self.0.query(sql, params)
    }

    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        self.0.table_exists(name)
    }

    fn table_definition(&self, name: &str) -> Result<Option<String>> {
        self.0.table_definition(name)
    }

    fn list_tables(&self, prefix: &str) -> Result<Vec<String>> {
        self.0.list_tables(prefix)
    }
}

/// Autocommit backend that rejects any batch containing `fail_on`.
pub struct FailingDatabase {
    pub inner: AutocommitDatabase,
    pub fail_on: &'static str,
}

impl FailingDatabase {
    pub fn new(inner: AutocommitDatabase, fail_on: &'static str) -> Self {
        Self { inner, fail_on }
    }
}

impl Database for FailingDatabase {
    fn execute_batch(&self, sql: &str) -> Result<()> {
        if sql.contains(self.fail_on) {
            return Err(SqlDriftError::Ledger(format!("write refused: {sql}")));
        }
        self.inner.execute_batch(sql)
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize> {
        self.inner.execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        self.inner.query(sql, params)
    }

    fn begin(&self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> Result<()> {
        self.inner.rollback()
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        self.inner.table_exists(name)
    }

    fn table_definition(&self, name: &str) -> Result<Option<String>> {
        self.inner.table_definition(name)
    }

    fn list_tables(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_tables(prefix)
    }
}

pub fn source(version: &str, sql: &str) -> MigrationSource {
    MigrationSource::new(version, format!("migration {version}"), sql).unwrap()
}

pub fn ledger_entries(db: &dyn Database) -> Vec<LedgerEntry> {
    Ledger::new(db, &LedgerConfig::default())
        .unwrap()
        .list_all()
        .unwrap()
}

pub fn ledger_entry(db: &dyn Database, version: &str) -> LedgerEntry {
    Ledger::new(db, &LedgerConfig::default())
        .unwrap()
        .get_entry(version)
        .unwrap()
        .unwrap()
}

pub fn orphaned_backups(db: &dyn Database) -> Vec<String> {
    Ledger::new(db, &LedgerConfig::default())
        .unwrap()
        .orphaned_backups()
        .unwrap()
}
