use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tabled::Tabled;

use crate::migration::{LedgerEntry, MigrationSource};

#[derive(Debug, Clone, Tabled)]
pub struct StatusTableRow {
    #[tabled(rename = "Version")]
    pub version: String,
    #[tabled(rename = "Description")]
    pub description: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Executed")]
    pub executed: String,
    #[tabled(rename = "Checksum")]
    pub checksum: String,
}

impl From<&StatusEntry> for StatusTableRow {
    fn from(entry: &StatusEntry) -> Self {
        let status = format!("{} {}", entry.status.symbol(), entry.status.as_str());

        let executed = entry
            .executed_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        let checksum = entry
            .current_checksum
            .as_deref()
            .or(entry.stored_checksum.as_deref())
            .map(|c| c.chars().take(12).collect())
            .unwrap_or_else(|| "-".to_string());

        StatusTableRow {
            version: entry.version.clone(),
            description: entry.description.clone(),
            status,
            executed,
            checksum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Pending,
    Applied,
    Changed,
    Missing,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Pending => "pending",
            MigrationStatus::Applied => "applied",
            MigrationStatus::Changed => "changed",
            MigrationStatus::Missing => "missing",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            MigrationStatus::Pending => "○",
            MigrationStatus::Applied => "✓",
            MigrationStatus::Changed => "⚠",
            MigrationStatus::Missing => "✗",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub version: String,
    pub description: String,
    pub status: MigrationStatus,
    pub executed_at: Option<NaiveDateTime>,
    pub stored_checksum: Option<String>,
    pub current_checksum: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct StatusReport {
    pub entries: Vec<StatusEntry>,
}

impl StatusReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entry: StatusEntry) {
        self.entries.push(entry);
    }

    pub fn count(&self, status: MigrationStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn pending(&self) -> Vec<&StatusEntry> {
        self.with_status(MigrationStatus::Pending)
    }

    pub fn with_status(&self, status: MigrationStatus) -> Vec<&StatusEntry> {
        self.entries.iter().filter(|e| e.status == status).collect()
    }

    pub fn is_up_to_date(&self) -> bool {
        self.entries.iter().all(|e| e.status == MigrationStatus::Applied)
    }
}

/// Joins sources and ledger rows by version into one status per version.
pub struct SourceAuditor<'a> {
    sources: &'a [MigrationSource],
}

impl<'a> SourceAuditor<'a> {
    pub fn new(sources: &'a [MigrationSource]) -> Self {
        Self { sources }
    }

    pub fn audit(&self, entries: &[LedgerEntry]) -> StatusReport {
        let mut by_version: BTreeMap<&str, (Option<&MigrationSource>, Option<&LedgerEntry>)> =
            BTreeMap::new();

        for source in self.sources {
            by_version.entry(source.version()).or_default().0 = Some(source);
        }
        for entry in entries {
            by_version.entry(entry.version.as_str()).or_default().1 = Some(entry);
        }

        let mut report = StatusReport::new();

        for (version, pair) in by_version {
            let status = match pair {
                (Some(_), None) => MigrationStatus::Pending,
                (Some(source), Some(entry)) if source.checksum() == entry.checksum => {
                    MigrationStatus::Applied
                }
                (Some(_), Some(_)) => MigrationStatus::Changed,
                (None, _) => MigrationStatus::Missing,
            };

            let (source, entry) = pair;
            let description = source
                .map(|s| s.description().to_string())
                .or_else(|| entry.and_then(|e| e.description.clone()))
                .unwrap_or_default();

            report.add(StatusEntry {
                version: version.to_string(),
                description,
                status,
                executed_at: entry.map(|e| e.executed_at),
                stored_checksum: entry.map(|e| e.checksum.clone()),
                current_checksum: source.map(|s| s.checksum().to_string()),
            });
        }

        report
    }
}
