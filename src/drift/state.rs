use serde::Serialize;
use std::fmt;

use crate::error::{Result, SqlDriftError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriftReason {
    ChecksumMismatch { stored: String, current: String },
    SourceMissing,
}

impl DriftReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriftReason::ChecksumMismatch { .. } => "checksum mismatch",
            DriftReason::SourceMissing => "source missing",
        }
    }
}

impl fmt::Display for DriftReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An applied migration whose source no longer matches the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftFinding {
    pub version: String,
    pub reason: DriftReason,
}

#[derive(Debug, Default, Serialize)]
pub struct DriftReport {
    pub findings: Vec<DriftFinding>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, finding: DriftFinding) {
        self.findings.push(finding);
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn versions(&self) -> Vec<&str> {
        self.findings.iter().map(|f| f.version.as_str()).collect()
    }

    /// Drift as an error, for callers that treat it as fatal.
    pub fn into_result(self) -> Result<Self> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(SqlDriftError::IntegrityDrift {
                count: self.findings.len(),
            })
        }
    }
}
