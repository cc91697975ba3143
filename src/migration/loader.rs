use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::{glob, GlobError, Pattern};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SqlDriftError};
use super::source::{MigrationSource, DEFAULT_DESCRIPTION};

/// A structured migration definition as written in a `.yaml` file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMigrationDef {
    version: Option<serde_yaml::Value>,
    description: Option<String>,
    sql: Option<String>,
}

/// Discovers migrations under a directory and merges them with any
/// registered in code.
///
/// Structured definitions (registered or `.yaml`/`.yml` files) take precedence
/// over `.sql` files with the same version. Two sources of the same kind with
/// the same version are an error.
#[derive(Debug, Default)]
pub struct SourceLoader {
    registered: Vec<MigrationSource>,
}

impl SourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: MigrationSource) -> &mut Self {
        self.registered.push(source);
        self
    }

    pub fn load_dir(&self, path: impl AsRef<Path>) -> Result<Vec<MigrationSource>> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(SqlDriftError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("migrations directory not found: {}", path.display()),
            )));
        }

        let mut structured = self.registered.clone();
        for def_path in list_files(path, &["yaml", "yml"])? {
            structured.push(load_definition_file(&def_path)?);
        }

        let files = list_files(path, &["sql"])?
            .iter()
            .map(load_sql_file)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Discovered {} structured and {} SQL migrations in {}",
            structured.len(),
            files.len(),
            path.display()
        );

        merge_sources(structured, files)
    }
}

fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let escaped_dir = Pattern::escape(&dir.to_string_lossy());
    let mut paths = Vec::new();

    for ext in extensions {
        let pattern = format!("{}/*.{}", escaped_dir, ext);
        let matches = glob(&pattern).map_err(|e| {
            SqlDriftError::Io(io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))
        })?;
        paths.extend(existing_files(matches.map(|r| r.map_err(GlobError::into_error)))?);
    }

    paths.sort();
    Ok(paths)
}

/// Keeps regular files; an entry that could not be read fails the whole scan
/// rather than silently dropping a migration.
fn existing_files<I>(entries: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?;
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Reads a `.sql` migration; version and description come from the
/// filename and the `-- Description:` marker.
pub fn load_sql_file(path: impl AsRef<Path>) -> Result<MigrationSource> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let version = version_from_filename(&file_name)
        .ok_or_else(|| SqlDriftError::InvalidFilename(path.display().to_string()))?;

    let sql = fs::read_to_string(path)?;
    let description = description_from_sql(&sql).unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    Ok(MigrationSource::new(version, description, sql)?.with_origin(path.display().to_string()))
}

/// Reads a structured `.yaml` migration definition.
pub fn load_definition_file(path: impl AsRef<Path>) -> Result<MigrationSource> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_definition(&content, &path.display().to_string())
}

pub fn parse_definition(content: &str, origin: &str) -> Result<MigrationSource> {
    let invalid = |reason: String| SqlDriftError::InvalidMigrationSource {
        path: origin.to_string(),
        reason,
    };

    let raw: RawMigrationDef = serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;

    let version = match raw.version {
        Some(serde_yaml::Value::String(v)) => v,
        Some(serde_yaml::Value::Number(n)) => {
            return Err(invalid(format!(
                "version {} must be a quoted 3-digit string, e.g. \"001\"",
                n
            )))
        }
        Some(_) => return Err(invalid("version must be a string".to_string())),
        None => return Err(invalid("missing required field 'version'".to_string())),
    };

    let sql = raw
        .sql
        .ok_or_else(|| invalid("missing required field 'sql'".to_string()))?;

    let description = raw
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    Ok(MigrationSource::new(version, description, sql)?.with_origin(origin))
}

/// The leading three digits of a filename, which must not be followed by
/// another digit (`0012_x.sql` is rejected rather than read as `001`).
pub fn version_from_filename(file_name: &str) -> Option<String> {
    let bytes = file_name.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if bytes.get(3).is_some_and(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(file_name[..3].to_string())
}

/// Text of the first `-- Description: <text>` line, trimmed.
pub fn description_from_sql(sql: &str) -> Option<String> {
    let re = Regex::new(r"(?m)^-- Description: (.+)$").ok()?;
    let description = re
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .find(|d| !d.is_empty());
    description
}

/// Merges structured definitions with SQL-file migrations into one list
/// sorted by version. Structured definitions win on a shared version;
/// duplicates within one kind fail with `DuplicateVersion`.
pub fn merge_sources(
    structured: Vec<MigrationSource>,
    files: Vec<MigrationSource>,
) -> Result<Vec<MigrationSource>> {
    let files = index_by_version(files)?;
    let structured = index_by_version(structured)?;

    let mut merged = files;
    for (version, source) in structured {
        if let Some(shadowed) = merged.insert(version, source) {
            debug!(
                "Structured migration {} overrides {}",
                shadowed.version(),
                shadowed.origin()
            );
        }
    }

    Ok(merged.into_values().collect())
}

fn index_by_version(sources: Vec<MigrationSource>) -> Result<BTreeMap<String, MigrationSource>> {
    let mut by_version: BTreeMap<String, MigrationSource> = BTreeMap::new();

    for source in sources {
        if let Some(existing) = by_version.get(source.version()) {
            return Err(SqlDriftError::DuplicateVersion {
                version: source.version().to_string(),
                first: existing.origin().to_string(),
                second: source.origin().to_string(),
            });
        }
        by_version.insert(source.version().to_string(), source);
    }

    Ok(by_version)
}
