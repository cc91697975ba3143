use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, info};

use crate::error::{parse_sqlite_error, ErrorContext, Result, SqlDriftError};
use super::database::{Database, Row};

/// SQLite backend. DDL is transactional here, so a rolled-back re-apply
/// never leaves a backup table behind.
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening SQLite database at {}", path.display());
        let conn = Connection::open(path).map_err(|e| {
            let ctx = ErrorContext::new().with_operation("open");
            SqlDriftError::Database(parse_sqlite_error(e, ctx))
        })?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            let ctx = ErrorContext::new().with_operation("open_in_memory");
            SqlDriftError::Database(parse_sqlite_error(e, ctx))
        })?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn cell_to_string(value: ValueRef<'_>) -> Option<String> {
        match value {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string()),
            ValueRef::Real(f) => Some(f.to_string()),
            ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }
}

impl Database for SqliteDatabase {
    fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!("execute_batch: {}", sql.trim());
        self.conn.execute_batch(sql).map_err(|e| {
            let ctx = ErrorContext::new()
                .with_operation("execute_batch")
                .with_sql(sql);
            SqlDriftError::Database(parse_sqlite_error(e, ctx))
        })
    }

    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize> {
        debug!("execute: {}", sql.trim());
        self.conn
            .execute(sql, params_from_iter(params.iter()))
            .map_err(|e| {
                let ctx = ErrorContext::new()
                    .with_operation("execute")
                    .with_sql(sql);
                SqlDriftError::Database(parse_sqlite_error(e, ctx))
            })
    }

    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>> {
        let to_error = |e: rusqlite::Error| {
            let ctx = ErrorContext::new()
                .with_operation("query")
                .with_sql(sql);
            SqlDriftError::Database(parse_sqlite_error(e, ctx))
        };

        let mut stmt = self.conn.prepare(sql).map_err(to_error)?;
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let cells = (0..column_count)
                    .map(|i| row.get_ref(i).map(Self::cell_to_string))
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(Row::new(cells))
            })
            .map_err(to_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(to_error)?;

        Ok(rows)
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let row = self.query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[name],
        )?;
        Ok(row.is_some())
    }

    fn table_definition(&self, name: &str) -> Result<Option<String>> {
        let row = self.query_row(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[name],
        )?;
        Ok(row.and_then(|r| r.get(0).map(|s| s.to_string())))
    }

    fn list_tables(&self, prefix: &str) -> Result<Vec<String>> {
        let rows = self.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND substr(name, 1, length(?1)) = ?1 ORDER BY name",
            &[prefix],
        )?;

        Ok(rows
            .iter()
            .filter_map(|r| r.get(0).map(|s| s.to_string()))
            .collect())
    }
}
