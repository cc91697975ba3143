use std::fmt;

use super::parser::ErrorContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    Constraint,
    Syntax,
    NoSuchTable,
    Busy,
    Other,
}

#[derive(Debug, Clone)]
pub struct DatabaseError {
    kind: DatabaseErrorKind,
    message: String,
    context: ErrorContext,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>, context: ErrorContext) -> Self {
        Self {
            kind,
            message: message.into(),
            context,
        }
    }

    pub fn kind(&self) -> DatabaseErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn is_constraint_violation(&self) -> bool {
        self.kind == DatabaseErrorKind::Constraint
    }

    pub fn suggestion(&self) -> String {
        match self.kind {
            DatabaseErrorKind::Constraint => {
                "A constraint rejected the write:\n  \
                 • Check for a ledger row that already exists for this version\n  \
                 • Make sure only one migrator runs against this database".to_string()
            }

            DatabaseErrorKind::Syntax => {
                "Check the migration SQL for:\n  \
                 • Syntax errors (typos, missing keywords)\n  \
                 • Statements from a different SQL dialect".to_string()
            }

            DatabaseErrorKind::NoSuchTable => {
                "A referenced table does not exist:\n  \
                 • Run: sqldrift init\n  \
                 • Check that earlier migrations created the table".to_string()
            }

            DatabaseErrorKind::Busy => {
                "The database is locked by another connection:\n  \
                 • Stop other migrators or long-running writers\n  \
                 • Try again in a few moments".to_string()
            }

            DatabaseErrorKind::Other => {
                "An unexpected database error occurred:\n  \
                 • Check the error message for details\n  \
                 • Verify the database path and permissions".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self.kind {
            DatabaseErrorKind::Constraint => "CONSTRAINT",
            DatabaseErrorKind::Syntax => "SYNTAX",
            DatabaseErrorKind::NoSuchTable => "NO_SUCH_TABLE",
            DatabaseErrorKind::Busy => "BUSY",
            DatabaseErrorKind::Other => "UNKNOWN",
        }
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(op) = &self.context.operation {
            write!(f, "{op}: ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(sql) = &self.context.sql {
            write!(f, "\n\nSQL preview:\n  {sql}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DatabaseError {}
