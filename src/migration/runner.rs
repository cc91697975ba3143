use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::drift::{MigrationStatus, SourceAuditor, StatusReport};
use crate::error::{Result, SqlDriftError};
use crate::executor::{Database, Transaction};
use super::loader::SourceLoader;
use super::source::MigrationSource;
use super::tracker::{Ledger, LedgerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationAction {
    Apply,
    Reapply,
    Skip,
}

impl MigrationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationAction::Apply => "apply",
            MigrationAction::Reapply => "reapply",
            MigrationAction::Skip => "skip",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedMigration {
    pub version: String,
    pub description: String,
    pub action: MigrationAction,
}

/// Applies migrations in version order against one database.
///
/// Assumes a single writer: two runners against the same database can both
/// see a version as unapplied and execute it twice.
pub struct MigrationRunner<'a> {
    db: &'a dyn Database,
    sources: Vec<MigrationSource>,
    config: LedgerConfig,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(db: &'a dyn Database, mut sources: Vec<MigrationSource>) -> Self {
        sources.sort_by(|a, b| a.version().cmp(b.version()));
        Self {
            db,
            sources,
            config: LedgerConfig::default(),
        }
    }

    pub fn from_dir(db: &'a dyn Database, path: impl AsRef<Path>) -> Result<Self> {
        let sources = SourceLoader::new().load_dir(path)?;
        Ok(Self::new(db, sources))
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sources(&self) -> &[MigrationSource] {
        &self.sources
    }

    pub fn ledger(&self) -> Result<Ledger<'a>> {
        Ledger::new(self.db, &self.config)
    }

    fn check_unique_versions(&self) -> Result<()> {
        for pair in self.sources.windows(2) {
            if pair[0].version() == pair[1].version() {
                return Err(SqlDriftError::DuplicateVersion {
                    version: pair[0].version().to_string(),
                    first: pair[0].origin().to_string(),
                    second: pair[1].origin().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Per-version status against the ledger. Read-only: a missing ledger
    /// table reads as an empty ledger.
    pub fn status(&self) -> Result<StatusReport> {
        let ledger = self.ledger()?;
        let entries = if ledger.exists()? {
            ledger.list_all()?
        } else {
            Vec::new()
        };
        Ok(SourceAuditor::new(&self.sources).audit(&entries))
    }

    /// What `run` would do, without executing anything.
    pub fn plan(&self) -> Result<Vec<PlannedMigration>> {
        self.check_unique_versions()?;
        let report = self.status()?;

        Ok(report
            .entries
            .into_iter()
            .filter_map(|entry| {
                let action = match entry.status {
                    MigrationStatus::Pending => MigrationAction::Apply,
                    MigrationStatus::Changed => MigrationAction::Reapply,
                    MigrationStatus::Applied => MigrationAction::Skip,
                    MigrationStatus::Missing => return None,
                };
                Some(PlannedMigration {
                    version: entry.version,
                    description: entry.description,
                    action,
                })
            })
            .collect())
    }

    /// Applies new migrations and re-applies changed ones, stopping at the
    /// first failure. Returns the versions applied or re-applied, in order.
    pub fn run(&self) -> Result<Vec<String>> {
        self.check_unique_versions()?;

        let ledger = self.ledger()?;
        ledger.ensure_schema()?;

        for orphan in ledger.orphaned_backups()? {
            warn!(
                "Found backup table {} from an earlier failed re-apply; inspect it, then run prune-backups",
                orphan
            );
        }

        let mut applied = Vec::new();

        for source in &self.sources {
            let version = source.version();

            match ledger.get_checksum(version)? {
                None => {
                    info!("Applying migration {}: {}", version, source.description());
                    self.apply_new(&ledger, source)?;
                    applied.push(version.to_string());
                }
                Some(stored) if stored == source.checksum() => {
                    debug!("Migration {} is current", version);
                }
                Some(stored) => {
                    info!(
                        "Migration {} changed since it was applied ({} -> {}), re-applying",
                        version,
                        short_checksum(&stored),
                        short_checksum(source.checksum())
                    );
                    self.reapply_changed(&ledger, source)?;
                    applied.push(version.to_string());
                }
            }
        }

        info!("Applied {} migration(s)", applied.len());
        Ok(applied)
    }

    /// Executes the SQL and records it in one transaction, so a failed
    /// statement never leaves a ledger row behind.
    fn apply_new(&self, ledger: &Ledger<'_>, source: &MigrationSource) -> Result<()> {
        let version = source.version();
        let tx = Transaction::begin(self.db)?;

        if let Err(e) = self.db.execute_batch(source.sql()) {
            if let Err(rollback_err) = tx.rollback() {
                warn!("Rollback of migration {} failed: {}", version, rollback_err);
            }
            return Err(SqlDriftError::MigrationExecutionFailed {
                version: version.to_string(),
                source: Box::new(e),
            });
        }

        if let Err(e) = ledger.record_new(version, source.description(), source.checksum()) {
            error!(
                "Migration {} executed but recording it in {} failed: {}",
                version,
                ledger.table(),
                e
            );
            return Err(e);
        }

        tx.commit()
    }

    /// Re-executes a changed migration with the whole ledger backed up first.
    ///
    /// On failure the transaction is rolled back and, if a complete backup
    /// survived the rollback (backends whose DDL auto-commits), the ledger is
    /// restored from it. A backup that was never fully written is dropped
    /// instead, since the live ledger was not yet touched. Schema changes made
    /// by the failed SQL itself are only undone where the backend's
    /// transactions cover DDL.
    fn reapply_changed(&self, ledger: &Ledger<'_>, source: &MigrationSource) -> Result<()> {
        let version = source.version();
        let backup = ledger.backup_table_name(version);
        let update_failed = |cause: SqlDriftError| SqlDriftError::MigrationUpdateFailed {
            version: version.to_string(),
            source: Box::new(cause),
        };

        let tx = Transaction::begin(self.db).map_err(update_failed)?;

        let mut backup_complete = false;
        let steps = ledger.backup_to(&backup).and_then(|()| {
            backup_complete = true;
            self.reapply_steps(ledger, source, &backup)
        });

        let outcome = match steps {
            Ok(()) => tx.commit(),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback of migration {} failed: {}", version, rollback_err);
                }
                Err(e)
            }
        };

        outcome.map_err(|cause| {
            self.recover_ledger(ledger, &backup, backup_complete);
            update_failed(cause)
        })
    }

    fn reapply_steps(&self, ledger: &Ledger<'_>, source: &MigrationSource, backup: &str) -> Result<()> {
        self.db.execute_batch(source.sql())?;
        ledger.record_update(source.version(), source.checksum())?;
        self.db.drop_table(backup)
    }

    fn recover_ledger(&self, ledger: &Ledger<'_>, backup: &str, backup_complete: bool) {
        match self.db.table_exists(backup) {
            Ok(true) if backup_complete => {
                warn!("Restoring ledger {} from backup {}", ledger.table(), backup);
                if let Err(e) = ledger.restore_from(backup) {
                    error!(
                        "Restoring ledger from {} failed, backup left in place: {}",
                        backup, e
                    );
                }
            }
            Ok(true) => {
                warn!(
                    "Backup {} was not fully written, dropping it and keeping ledger {}",
                    backup,
                    ledger.table()
                );
                if let Err(e) = self.db.drop_table(backup) {
                    error!("Dropping partial backup {} failed: {}", backup, e);
                }
            }
            Ok(false) => debug!("Backup {} did not survive rollback, nothing to restore", backup),
            Err(e) => error!("Could not check for backup table {}: {}", backup, e),
        }
    }
}

fn short_checksum(checksum: &str) -> &str {
    checksum.get(..12).unwrap_or(checksum)
}
