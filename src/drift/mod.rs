mod audit;
mod checker;
mod checksum;
mod state;

pub use audit::{MigrationStatus, SourceAuditor, StatusEntry, StatusReport, StatusTableRow};
pub use checker::{detect_drift, IntegrityChecker};
pub use checksum::{digest, CHECKSUM_LEN};
pub use state::{DriftFinding, DriftReason, DriftReport};
