//! # The Metadata Store Trait
//!
//! The full persistence surface the pipeline stages call through. Both
//! backends implement every method with identical semantics; the
//! Postgres backend wraps [`MetadataStore::commit_section`] in a single
//! transaction so a failed commit leaves section and document status
//! untouched.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fdd_core::{
    ContentHash, ExtractedItem, ExtractionStatus, Fdd, FddId, Franchisor, FranchisorId,
    ProcessingStatus, ReviewRecord, Section, SectionId,
};
use fdd_resolve::FranchisorMatch;
use fdd_validate::ValidationIssue;

use crate::error::MetaError;
use crate::router::SectionCommit;

/// Extraction metadata recorded on a section when a commit succeeds.
#[derive(Debug, Clone, Default)]
pub struct ExtractionMeta {
    pub model: Option<String>,
    pub template_version: Option<u32>,
    pub attempts: u32,
    pub tokens_used: u64,
}

/// Transactional metadata persistence.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // --- Franchisors ---------------------------------------------------

    /// Insert a franchisor; `Conflict` when the canonical name exists.
    async fn insert_franchisor(&self, franchisor: &Franchisor) -> Result<(), MetaError>;

    async fn get_franchisor(&self, id: FranchisorId) -> Result<Option<Franchisor>, MetaError>;

    async fn find_franchisor_by_name(
        &self,
        canonical_name: &str,
    ) -> Result<Option<FranchisorId>, MetaError>;

    /// Top-K franchisors by cosine similarity to the query embedding.
    async fn top_k_franchisors(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<FranchisorMatch>, MetaError>;

    async fn add_alternate_name(
        &self,
        id: FranchisorId,
        alternate: &str,
    ) -> Result<(), MetaError>;

    // --- Filings -------------------------------------------------------

    async fn insert_fdd(&self, fdd: &Fdd) -> Result<(), MetaError>;

    async fn get_fdd(&self, id: FddId) -> Result<Option<Fdd>, MetaError>;

    /// Primary (non-duplicate) filing with the given content hash.
    async fn find_fdd_by_hash(&self, hash: &ContentHash) -> Result<Option<Fdd>, MetaError>;

    async fn list_fdds_for_franchisor(
        &self,
        franchisor_id: FranchisorId,
    ) -> Result<Vec<Fdd>, MetaError>;

    /// Point `older` at `newer` as its superseding filing.
    async fn set_superseded_by(&self, older: FddId, newer: FddId) -> Result<(), MetaError>;

    /// Point `dup` at `primary` as its duplicate source.
    async fn set_duplicate_of(&self, dup: FddId, primary: FddId) -> Result<(), MetaError>;

    /// Compare-and-set status update. Returns false when the record was
    /// not in `from`.
    async fn update_fdd_status(
        &self,
        id: FddId,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<bool, MetaError>;

    async fn set_fdd_quality(&self, id: FddId, quality: f64) -> Result<(), MetaError>;

    // --- Sections ------------------------------------------------------

    /// Insert or replace the section for its (fdd, item) natural key.
    async fn upsert_section(&self, section: &Section) -> Result<SectionId, MetaError>;

    async fn get_section(&self, id: SectionId) -> Result<Option<Section>, MetaError>;

    /// All sections of a filing, ordered by item number.
    async fn list_sections(&self, fdd_id: FddId) -> Result<Vec<Section>, MetaError>;

    /// Mark a section in-flight and bump its attempt counter.
    async fn mark_section_processing(&self, id: SectionId) -> Result<(), MetaError>;

    /// Terminal status update outside a payload commit (Failed/Skipped).
    async fn mark_section_terminal(
        &self,
        id: SectionId,
        status: ExtractionStatus,
        needs_review: bool,
        issues: &[ValidationIssue],
    ) -> Result<(), MetaError>;

    async fn set_section_storage_path(&self, id: SectionId, path: &str) -> Result<(), MetaError>;

    // --- Extracted payloads --------------------------------------------

    /// Atomically persist a section's payload, issues, status, and
    /// extraction metadata.
    async fn commit_section(&self, commit: &SectionCommit) -> Result<(), MetaError>;

    /// Read back the stored payload, if any.
    async fn get_payload(&self, section_id: SectionId) -> Result<Option<ExtractedItem>, MetaError>;

    /// Validation issues stored for a section.
    async fn list_issues(&self, section_id: SectionId) -> Result<Vec<ValidationIssue>, MetaError>;

    // --- Review queue --------------------------------------------------

    async fn insert_review(&self, review: &ReviewRecord) -> Result<(), MetaError>;

    async fn list_reviews(&self, fdd_id: FddId) -> Result<Vec<ReviewRecord>, MetaError>;

    // --- Registration bookkeeping --------------------------------------

    /// Timestamp source for tests that need a stable ordering.
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
