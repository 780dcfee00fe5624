//! Storage Error Types
//!
//! Every adapter reports failures through [`StoreError`], already classified.
//! Vendor error shapes (SQLSTATE codes, driver enums) never leave this module.

use std::fmt;
use thiserror::Error;

/// Which storage integrity rule was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    ForeignKey,
    Unique,
    NotNull,
    Check,
    /// Arithmetic left the column's range (e.g. BIGINT overflow)
    OutOfRange,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::ForeignKey => "FOREIGN_KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::NotNull => "NOT_NULL",
            ConstraintKind::Check => "CHECK",
            ConstraintKind::OutOfRange => "OUT_OF_RANGE",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Row not found: {0}")]
    NotFound(String),

    #[error("Constraint violation ({kind}): {message}")]
    ConstraintViolation {
        kind: ConstraintKind,
        constraint: Option<String>,
        message: String,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn violation(
        kind: ConstraintKind,
        constraint: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        StoreError::ConstraintViolation {
            kind,
            constraint: constraint.map(str::to_string),
            message: message.into(),
        }
    }

    /// Is this a transient failure the caller may choose to retry
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Classify a PostgreSQL SQLSTATE code
///
/// Class 23 (integrity) maps to [`StoreError::ConstraintViolation`];
/// serialization failures, deadlocks and connection loss map to
/// [`StoreError::Unavailable`].
pub fn classify_sqlstate(code: &str, constraint: Option<&str>, message: &str) -> StoreError {
    let kind = match code {
        "23503" => Some(ConstraintKind::ForeignKey),
        "23505" => Some(ConstraintKind::Unique),
        "23502" => Some(ConstraintKind::NotNull),
        "23514" => Some(ConstraintKind::Check),
        "22003" => Some(ConstraintKind::OutOfRange),
        _ => None,
    };
    if let Some(kind) = kind {
        return StoreError::violation(kind, constraint, message);
    }

    let transient = matches!(code, "40001" | "40P01" | "57P01" | "53300") || code.starts_with("08");
    if transient {
        StoreError::Unavailable(format!("{message} (SQLSTATE {code})"))
    } else {
        StoreError::Internal(format!("{message} (SQLSTATE {code})"))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound(e.to_string()),
            sqlx::Error::Database(db) => match db.code() {
                Some(code) => classify_sqlstate(&code, db.constraint(), db.message()),
                None => StoreError::Internal(db.message().to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Internal(e.to_string()),
        }
    }
}
