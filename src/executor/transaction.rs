use tracing::warn;

use crate::error::Result;
use super::database::Database;

/// Rolls back on drop unless `commit` was called.
pub struct Transaction<'a> {
    db: &'a dyn Database,
    finished: bool,
}

impl<'a> Transaction<'a> {
    pub fn begin(db: &'a dyn Database) -> Result<Self> {
        db.begin()?;
        Ok(Self { db, finished: false })
    }

    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        match self.db.commit() {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(rollback_err) = self.db.rollback() {
                    warn!("Rollback after failed commit also failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.db.rollback()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.db.rollback() {
                warn!("Rollback of abandoned transaction failed: {}", e);
            }
        }
    }
}
