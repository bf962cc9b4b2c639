//! # fdd-embed — Name Embeddings for Entity Matching
//!
//! Maps text to fixed-dimension vectors for the similarity stage of
//! entity resolution. The provider is an external service; this crate
//! defines the trait, an HTTP client, the vector math, and a
//! deterministic mock for tests.
//!
//! ## Contract
//!
//! Every embedding is exactly [`EMBEDDING_DIM`] floats and is
//! L2-normalized before it leaves this crate, so cosine similarity
//! downstream is a plain dot product.

pub mod http;
pub mod mock;
pub mod vector;

pub use http::HttpEmbeddingClient;
pub use mock::HashEmbedder;
pub use vector::{cosine_similarity, l2_normalize, top_k};

use async_trait::async_trait;
use thiserror::Error;

/// Dimensionality of all embeddings in the system.
pub const EMBEDDING_DIM: usize = 384;

/// Error from an embedding request.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// The provider did not respond within the timeout.
    #[error("embedding provider timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The provider is unreachable or returned a server error.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    /// The response body could not be parsed.
    #[error("embedding provider returned a malformed response: {0}")]
    BadResponse(String),

    /// The provider returned a vector of the wrong dimension.
    #[error("embedding has dimension {got}, expected {expected}")]
    WrongDimension { got: usize, expected: usize },
}

impl EmbedError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }
}

/// A service mapping text to a unit-length 384-dim vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text. Implementations must return exactly
    /// [`EMBEDDING_DIM`] floats, L2-normalized.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}
