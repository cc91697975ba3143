use regex::Regex;
use rusqlite::ErrorCode;

use super::db_error::{DatabaseError, DatabaseErrorKind};

const SQL_PREVIEW_CHARS: usize = 500;

pub fn parse_sqlite_error(error: rusqlite::Error, context: ErrorContext) -> DatabaseError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let message = message.clone().unwrap_or_else(|| failure.to_string());
            let kind = match failure.code {
                ErrorCode::ConstraintViolation => DatabaseErrorKind::Constraint,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DatabaseErrorKind::Busy,
                _ => classify_message(&message),
            };
            DatabaseError::new(kind, message, context)
        }

        other => {
            let message = other.to_string();
            DatabaseError::new(classify_message(&message), message, context)
        }
    }
}

fn classify_message(message: &str) -> DatabaseErrorKind {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("no such table") {
        DatabaseErrorKind::NoSuchTable
    } else if is_syntax_error(&msg_lower) {
        DatabaseErrorKind::Syntax
    } else if msg_lower.contains("unique constraint") {
        DatabaseErrorKind::Constraint
    } else {
        DatabaseErrorKind::Other
    }
}

fn is_syntax_error(message: &str) -> bool {
    Regex::new(r#"near ".*": syntax error|incomplete input"#)
        .map(|re| re.is_match(message))
        .unwrap_or(false)
}

#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub sql: Option<String>,
    pub operation: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        let full_sql = sql.into();
        self.sql = Some(if full_sql.chars().count() > SQL_PREVIEW_CHARS {
            let preview: String = full_sql.chars().take(SQL_PREVIEW_CHARS).collect();
            format!("{}...", preview)
        } else {
            full_sql
        });
        self
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }
}
