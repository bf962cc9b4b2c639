//! # Pipeline Errors

use fdd_core::FddId;
use fdd_document::{LayoutError, PdfError, StoreError};
use fdd_resolve::ResolveError;
use fdd_store::MetaError;
use thiserror::Error;

/// Error from driving a document through the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Cancellation was signalled; no partial state was written.
    #[error("cancelled")]
    Cancelled,

    /// The per-document deadline expired; the document is Failed.
    #[error("document {fdd_id} exceeded its {seconds}s deadline")]
    DeadlineExceeded { fdd_id: FddId, seconds: u64 },

    /// Metadata store failure after retries.
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// Object store failure after retries.
    #[error(transparent)]
    Objects(#[from] StoreError),

    /// Layout analyzer failure after retries.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The raw document is not a processable PDF.
    #[error(transparent)]
    Pdf(#[from] PdfError),

    /// Entity resolution failure after retries.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A referenced record is missing.
    #[error("not found: {0}")]
    NotFound(String),
}

impl PipelineError {
    /// Whether the whole scheduler should halt (fatal system error)
    /// rather than fail the single document.
    pub fn is_fatal_system(&self) -> bool {
        match self {
            Self::Meta(e) => e.is_transient(),
            Self::Objects(e) => e.is_transient(),
            _ => false,
        }
    }
}
