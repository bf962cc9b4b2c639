//! # Franchisor Directory Interface
//!
//! The narrow store surface entity resolution needs. The metadata
//! store implements this; keeping the trait here lets the resolver be
//! tested against a trivial in-memory directory without pulling in the
//! storage crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fdd_core::{Franchisor, FranchisorId};
use thiserror::Error;

/// Error from a directory operation.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// The backing store is unreachable; transient.
    #[error("franchisor store unavailable: {0}")]
    StoreUnavailable(String),

    /// Creation raced with another registration of the same canonical
    /// name; the existing entity is returned for linking.
    #[error("canonical name already exists under {existing}")]
    DuplicateName { existing: FranchisorId },
}

/// A similarity match returned by the vector query.
#[derive(Debug, Clone)]
pub struct FranchisorMatch {
    pub id: FranchisorId,
    pub canonical_name: String,
    pub similarity: f32,
    pub created_at: DateTime<Utc>,
}

/// Directory operations used by entity resolution.
#[async_trait]
pub trait FranchisorDirectory: Send + Sync {
    /// Exact canonical-name lookup.
    async fn find_by_canonical_name(
        &self,
        canonical_name: &str,
    ) -> Result<Option<FranchisorId>, DirectoryError>;

    /// Top-K franchisors by cosine similarity to the query embedding,
    /// descending.
    async fn top_k_similar(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<FranchisorMatch>, DirectoryError>;

    /// Insert a new franchisor. Fails with [`DirectoryError::DuplicateName`]
    /// when the canonical name is already taken.
    async fn create_franchisor(&self, franchisor: Franchisor)
        -> Result<FranchisorId, DirectoryError>;

    /// Record an observed alternate rendering of an entity's name.
    async fn add_alternate_name(
        &self,
        id: FranchisorId,
        alternate: &str,
    ) -> Result<(), DirectoryError>;
}
