use crate::error::Result;

/// One result row: positional, nullable text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<Option<String>>);

impl Row {
    pub fn new(cells: Vec<Option<String>>) -> Self {
        Self(cells)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|c| c.as_deref())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The database collaborator the ledger and runner talk to.
///
/// Calls block until the backend confirms them. Implementations own the
/// dialect: the provided methods use the most common SQL spelling and can be
/// overridden where a backend differs (e.g. MySQL's `RENAME TABLE`).
pub trait Database {
    /// Run one or more statements verbatim.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Run a single prepared statement with positional parameters, returning
    /// the number of affected rows.
    fn execute(&self, sql: &str, params: &[&str]) -> Result<usize>;

    fn query(&self, sql: &str, params: &[&str]) -> Result<Vec<Row>>;

    fn query_row(&self, sql: &str, params: &[&str]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    fn begin(&self) -> Result<()> {
        self.execute_batch("BEGIN")
    }

    fn commit(&self) -> Result<()> {
        self.execute_batch("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.execute_batch("ROLLBACK")
    }

    fn table_exists(&self, name: &str) -> Result<bool>;

    /// The `CREATE TABLE` statement the backend holds for `name`, reflecting
    /// any later `ALTER TABLE`.
    fn table_definition(&self, name: &str) -> Result<Option<String>>;

    /// Names of all tables starting with `prefix`, sorted.
    fn list_tables(&self, prefix: &str) -> Result<Vec<String>>;

    fn drop_table(&self, name: &str) -> Result<()> {
        self.execute_batch(&format!("DROP TABLE IF EXISTS {name}"))
    }

    fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        self.execute_batch(&format!("ALTER TABLE {from} RENAME TO {to}"))
    }
}
