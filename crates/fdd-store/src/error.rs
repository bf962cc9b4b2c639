//! # Store Errors

use fdd_core::FddId;
use thiserror::Error;

/// Error from a metadata-store operation.
#[derive(Error, Debug)]
pub enum MetaError {
    /// The backing database is unreachable or timed out; transient.
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A status update was refused because the record was not in the
    /// expected state.
    #[error("invalid status transition for {fdd_id}: {detail}")]
    InvalidTransition { fdd_id: FddId, detail: String },

    /// Serialization of a payload column failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl MetaError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<sqlx::Error> for MetaError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                MetaError::Conflict(db.to_string())
            }
            sqlx::Error::RowNotFound => MetaError::NotFound(e.to_string()),
            _ => MetaError::Unavailable(e.to_string()),
        }
    }
}
