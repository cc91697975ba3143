use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::executor::Database;
use crate::migration::{Ledger, LedgerConfig, LedgerEntry, MigrationSource};
use super::state::{DriftFinding, DriftReason, DriftReport};

/// Compares ledger checksums with the current sources without touching
/// either.
pub struct IntegrityChecker<'a> {
    db: &'a dyn Database,
    sources: &'a [MigrationSource],
    config: LedgerConfig,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(db: &'a dyn Database, sources: &'a [MigrationSource]) -> Self {
        Self {
            db,
            sources,
            config: LedgerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    /// Findings for every ledger row that diverges from its source. Drift is
    /// returned, not raised; only failures reading the ledger are errors.
    pub fn verify(&self) -> Result<DriftReport> {
        let ledger = Ledger::new(self.db, &self.config)?;
        if !ledger.exists()? {
            debug!("Ledger table {} does not exist, nothing to verify", ledger.table());
            return Ok(DriftReport::new());
        }

        let entries = ledger.list_all()?;
        let report = detect_drift(&entries, self.sources);

        for finding in &report.findings {
            warn!("Migration {} drifted: {}", finding.version, finding.reason);
        }

        Ok(report)
    }
}

pub fn detect_drift(entries: &[LedgerEntry], sources: &[MigrationSource]) -> DriftReport {
    let by_version: HashMap<&str, &MigrationSource> =
        sources.iter().map(|s| (s.version(), s)).collect();

    let mut report = DriftReport::new();

    for entry in entries {
        let reason = match by_version.get(entry.version.as_str()) {
            None => Some(DriftReason::SourceMissing),
            Some(source) if source.checksum() != entry.checksum => {
                Some(DriftReason::ChecksumMismatch {
                    stored: entry.checksum.clone(),
                    current: source.checksum().to_string(),
                })
            }
            Some(_) => None,
        };

        if let Some(reason) = reason {
            report.add(DriftFinding {
                version: entry.version.clone(),
                reason,
            });
        }
    }

    report
}
