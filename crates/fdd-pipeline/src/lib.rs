//! # fdd-pipeline — The Stage Scheduler
//!
//! Ties the stages together: registration with hash-linearized
//! deduplication, segmentation, per-section extraction fan-out,
//! validation, and storage — under bounded per-stage concurrency,
//! per-stage retry policies, cooperative cancellation, and a per-document
//! deadline.
//!
//! ## Ordering guarantees
//!
//! - One document's stages run strictly in order.
//! - Section extractions for a document fan out up to the extraction
//!   cap; their relative order is unspecified, except that an Item 5
//!   section completes before the rest begin (the Item 7 bracketing
//!   rule reads its result).
//! - Registration of identical bytes is linearized through a per-hash
//!   mutex: exactly one primary, every other call a duplicate.
//!
//! ## Resumability
//!
//! Every stage re-enters idempotently. A canceled run leaves documents
//! `Processing` with their terminal sections intact; running the
//! document again completes only the remaining sections.

pub mod cancel;
pub mod error;
pub mod keyed_mutex;
pub mod limiter;
pub mod pipeline;
pub mod registration;
pub mod retry;
pub mod scheduler;

pub use cancel::{CancelHandle, CancelToken};
pub use error::PipelineError;
pub use keyed_mutex::KeyedMutex;
pub use limiter::{RateLimiterSet, TokenBucket};
pub use pipeline::{Pipeline, PipelineDeps};
pub use registration::Registered;
pub use retry::RetryPolicy;
pub use scheduler::{BatchReport, Scheduler};
