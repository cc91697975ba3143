mod loader;
mod runner;
mod source;
mod tracker;

pub use loader::{
    description_from_sql, load_definition_file, load_sql_file, merge_sources, parse_definition,
    version_from_filename, SourceLoader,
};
pub use runner::{MigrationAction, MigrationRunner, PlannedMigration};
pub use source::{is_valid_version, MigrationSource, DEFAULT_DESCRIPTION};
pub use tracker::{Ledger, LedgerConfig, LedgerEntry, DEFAULT_TABLE};
