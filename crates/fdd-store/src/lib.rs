//! # fdd-store — Metadata Persistence
//!
//! The store behind every pipeline stage: franchisors, filings,
//! sections, typed item tables, validation issues, and the review
//! queue. Two backends implement the same [`MetadataStore`] trait:
//!
//! - **Postgres** ([`pg::PgMetadataStore`]) — SQLx with embedded
//!   migrations; each commit runs in one transaction.
//! - **In-memory** ([`memory::MemoryMetadataStore`]) — DashMap tables
//!   with the same semantics, for tests and local development.
//!
//! The [`router::StorageRouter`] sits above the trait and owns the
//! section-commit and document-finalization logic.

pub mod directory;
pub mod error;
pub mod memory;
pub mod pg;
pub mod router;
pub mod traits;

pub use directory::DirectoryAdapter;
pub use error::MetaError;
pub use memory::MemoryMetadataStore;
pub use pg::PgMetadataStore;
pub use router::{Finalization, SectionCommit, StorageRouter};
pub use traits::{ExtractionMeta, MetadataStore};
