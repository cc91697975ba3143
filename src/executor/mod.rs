mod database;
mod sqlite;
mod transaction;

pub use database::{Database, Row};
pub use sqlite::SqliteDatabase;
pub use transaction::Transaction;
