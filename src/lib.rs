pub mod error;
pub mod executor;
pub mod migration;
pub mod drift;

pub use error::{DatabaseError, DatabaseErrorKind, SqlDriftError, Result};
pub use executor::{Database, Row, SqliteDatabase, Transaction};
pub use migration::{
    merge_sources, Ledger, LedgerConfig, LedgerEntry, MigrationAction, MigrationRunner,
    MigrationSource, PlannedMigration, SourceLoader,
};
pub use drift::{
    digest, DriftFinding, DriftReason, DriftReport, IntegrityChecker, MigrationStatus,
    SourceAuditor, StatusEntry, StatusReport, StatusTableRow,
};
