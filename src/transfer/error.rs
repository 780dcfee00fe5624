//! Transfer Error Types
//!
//! Classified failures returned to the API layer. Storage errors arrive
//! already classified as [`StoreError`] and are mapped here without
//! inspecting any driver-specific detail.

use thiserror::Error;

use crate::ledger::error::{ConstraintKind, StoreError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Validation Errors (no storage access) ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and destination account cannot be the same")]
    SameAccount,

    // === Storage Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation ({kind}): {message}")]
    ConstraintViolation {
        kind: ConstraintKind,
        message: String,
    },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal storage error: {0}")]
    Internal(String),

    /// The unit of work failed and so did its rollback
    #[error("Transfer failed ({cause}) and rollback failed ({abort})")]
    AbortFailed {
        cause: Box<TransferError>,
        abort: StoreError,
    },
}

impl TransferError {
    /// Stable error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::NotFound(_) => "NOT_FOUND",
            TransferError::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
            TransferError::Unavailable(_) => "UNAVAILABLE",
            TransferError::Internal(_) => "INTERNAL_ERROR",
            TransferError::AbortFailed { .. } => "ABORT_FAILED",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidAmount | TransferError::SameAccount => 400,
            TransferError::NotFound(_) => 404,
            TransferError::ConstraintViolation { .. } => 422,
            TransferError::Unavailable(_) => 503,
            TransferError::Internal(_) | TransferError::AbortFailed { .. } => 500,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => TransferError::NotFound(what),
            // A dangling account reference on insert means the account does not exist.
            StoreError::ConstraintViolation {
                kind: ConstraintKind::ForeignKey,
                message,
                ..
            } => TransferError::NotFound(message),
            StoreError::ConstraintViolation { kind, message, .. } => {
                TransferError::ConstraintViolation { kind, message }
            }
            StoreError::Unavailable(msg) => TransferError::Unavailable(msg),
            StoreError::Internal(msg) => TransferError::Internal(msg),
        }
    }
}
