//! # Domain Records
//!
//! The persistent entities: `Franchisor`, `Fdd`, `Section`, the
//! human-review queue record, and the `RawDocument` handed over by the
//! scraper collaborator.
//!
//! ## Lineage Invariants
//!
//! An FDD carries at most one of `superseded_by` / `duplicate_of`, and
//! neither may point at the record itself. `Fdd::set_superseded_by` and
//! `Fdd::set_duplicate_of` enforce both; persistence layers re-check on
//! write.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentHash;
use crate::ids::{FddId, FranchisorId, ReviewId, SectionId};
use crate::item::ItemNo;
use crate::status::{DocumentType, ExtractionStatus, ProcessingStatus};

/// A canonical franchisor entity.
///
/// Created during entity resolution when no match is found; never
/// destroyed. The embedding is recomputed whenever the canonical name
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Franchisor {
    pub id: FranchisorId,
    /// Normalized canonical name, unique across all franchisors.
    pub canonical_name: String,
    pub parent_company: Option<String>,
    /// Contact fields as captured from the filing cover pages.
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    /// Alternate names observed across filings.
    pub alternate_names: Vec<String>,
    /// L2-normalized 384-dim name embedding.
    pub name_embedding: Vec<f32>,
    /// Tentative entities await human reconciliation of a review record.
    pub tentative: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Franchisor {
    /// Construct a new franchisor with the given canonical name and embedding.
    pub fn new(canonical_name: String, name_embedding: Vec<f32>) -> Self {
        let now = Utc::now();
        Self {
            id: FranchisorId::new(),
            canonical_name,
            parent_company: None,
            contact_email: None,
            contact_phone: None,
            alternate_names: Vec::new(),
            name_embedding,
            tentative: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A specific disclosure filing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fdd {
    pub id: FddId,
    pub franchisor_id: FranchisorId,
    pub issue_date: NaiveDate,
    pub amendment_date: Option<NaiveDate>,
    pub document_type: DocumentType,
    /// Two-letter filing state code (e.g. `MN`, `WI`).
    pub filing_state: String,
    /// Object-store path of the raw PDF.
    pub storage_path: String,
    pub content_hash: ContentHash,
    pub total_pages: u32,
    pub processing_status: ProcessingStatus,
    /// Set when a newer filing replaces this one.
    pub superseded_by: Option<FddId>,
    /// Set when this filing's bytes already exist under another record.
    pub duplicate_of: Option<FddId>,
    /// Weighted section-completeness score, recomputed at finalization.
    pub quality_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Error raised when a lineage pointer would violate an invariant.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LineageViolation {
    /// The two lineage pointers are mutually exclusive.
    #[error("fdd {0} already carries the other lineage pointer")]
    BothPointersSet(FddId),

    /// A lineage pointer may not reference its own record.
    #[error("fdd {0} may not reference itself")]
    SelfReference(FddId),
}

impl Fdd {
    /// Mark this filing as superseded by a newer one.
    pub fn set_superseded_by(&mut self, newer: FddId) -> Result<(), LineageViolation> {
        if newer == self.id {
            return Err(LineageViolation::SelfReference(self.id));
        }
        if self.duplicate_of.is_some() {
            return Err(LineageViolation::BothPointersSet(self.id));
        }
        self.superseded_by = Some(newer);
        Ok(())
    }

    /// Mark this filing as a byte-identical duplicate of an existing one.
    pub fn set_duplicate_of(&mut self, existing: FddId) -> Result<(), LineageViolation> {
        if existing == self.id {
            return Err(LineageViolation::SelfReference(self.id));
        }
        if self.superseded_by.is_some() {
            return Err(LineageViolation::BothPointersSet(self.id));
        }
        self.duplicate_of = Some(existing);
        Ok(())
    }

    /// The effective filing date for supersession ordering: the
    /// amendment date when present, otherwise the issue date.
    pub fn effective_date(&self) -> NaiveDate {
        self.amendment_date.unwrap_or(self.issue_date)
    }
}

/// A contiguous page range within an FDD covering one catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub fdd_id: FddId,
    pub item_no: ItemNo,
    /// 1-based, inclusive.
    pub start_page: u32,
    /// 1-based, inclusive; always >= start_page.
    pub end_page: u32,
    pub extraction_status: ExtractionStatus,
    /// Model that produced the accepted extraction, when any.
    pub extraction_model: Option<String>,
    pub attempt_count: u32,
    pub needs_review: bool,
    /// Object-store path of the segmented per-section PDF.
    pub storage_path: Option<String>,
    pub extracted_at: Option<DateTime<Utc>>,
}

impl Section {
    /// Construct a pending section for the given page range.
    pub fn new(fdd_id: FddId, item_no: ItemNo, start_page: u32, end_page: u32) -> Self {
        debug_assert!(start_page <= end_page);
        Self {
            id: SectionId::new(),
            fdd_id,
            item_no,
            start_page,
            end_page,
            extraction_status: ExtractionStatus::Pending,
            extraction_model: None,
            attempt_count: 0,
            needs_review: false,
            storage_path: None,
            extracted_at: None,
        }
    }

    /// Number of pages covered, inclusive of both endpoints.
    pub fn page_count(&self) -> u32 {
        self.end_page - self.start_page + 1
    }
}

/// Why a record landed in the human-review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewReason {
    /// Entity resolution landed in the similarity review band.
    EntityMatch,
    /// Section boundaries were interpolated or fell back to one span.
    SectionDetection,
    /// Validation produced warnings (or bypassed errors).
    Validation,
}

/// A human-review queue record.
///
/// Every NeedsReview outcome anywhere in the pipeline persists one of
/// these so operators can query outstanding work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: ReviewId,
    pub fdd_id: FddId,
    pub reason: ReviewReason,
    /// Free-form operator-facing description.
    pub detail: String,
    /// Candidate franchisor matches, for entity-resolution reviews:
    /// (franchisor id, cosine similarity).
    pub candidates: Vec<(FranchisorId, f32)>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl ReviewRecord {
    /// Construct an unresolved review record.
    pub fn new(fdd_id: FddId, reason: ReviewReason, detail: String) -> Self {
        Self {
            id: ReviewId::new(),
            fdd_id,
            reason,
            detail,
            candidates: Vec::new(),
            resolved: false,
            created_at: Utc::now(),
        }
    }
}

/// A raw document as produced by a state-portal scraper.
///
/// The scraper collaborator is outside this system; this is the full
/// handover shape for `register_document`.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    /// Two-letter state code of the source portal.
    pub source_state: String,
    pub source_url: String,
    /// Franchisor name as it appears on the portal listing.
    pub franchisor_name: String,
    pub document_type: DocumentType,
    pub issue_date: NaiveDate,
    pub amendment_date: Option<NaiveDate>,
    /// Portal-specific metadata passed through for audit.
    pub portal_metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fdd() -> Fdd {
        Fdd {
            id: FddId::new(),
            franchisor_id: FranchisorId::new(),
            issue_date: NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
            amendment_date: None,
            document_type: DocumentType::Initial,
            filing_state: "MN".to_string(),
            storage_path: "raw/mn/acme/2023/abc.pdf".to_string(),
            content_hash: ContentHash::of_bytes(b"pdf"),
            total_pages: 120,
            processing_status: ProcessingStatus::Pending,
            superseded_by: None,
            duplicate_of: None,
            quality_score: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn lineage_pointers_are_exclusive() {
        let mut fdd = sample_fdd();
        fdd.set_duplicate_of(FddId::new()).unwrap();
        assert_eq!(
            fdd.set_superseded_by(FddId::new()),
            Err(LineageViolation::BothPointersSet(fdd.id))
        );
    }

    #[test]
    fn lineage_rejects_self_reference() {
        let mut fdd = sample_fdd();
        let own = fdd.id;
        assert_eq!(
            fdd.set_superseded_by(own),
            Err(LineageViolation::SelfReference(own))
        );
        assert_eq!(
            fdd.set_duplicate_of(own),
            Err(LineageViolation::SelfReference(own))
        );
    }

    #[test]
    fn effective_date_prefers_amendment() {
        let mut fdd = sample_fdd();
        assert_eq!(fdd.effective_date(), fdd.issue_date);
        let amended = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        fdd.amendment_date = Some(amended);
        assert_eq!(fdd.effective_date(), amended);
    }

    #[test]
    fn section_page_count_inclusive() {
        let s = Section::new(FddId::new(), ItemNo::new(5).unwrap(), 10, 12);
        assert_eq!(s.page_count(), 3);
    }
}
