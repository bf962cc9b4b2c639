// SPDX-License-Identifier: BUSL-1.1
//! # Storage Router
//!
//! Routes a validated extraction to its typed table (high-value items)
//! or the JSON store (everything else), updates section state, and
//! finalizes the document when every section has reached a terminal
//! status.
//!
//! ## Atomicity
//!
//! One [`SectionCommit`] is one backend transaction: payload rows,
//! validation issues, and the section row move together or not at all.
//! Document finalization is a separate compare-and-set — two sections
//! finishing concurrently both compute the same terminal outcome, and
//! exactly one CAS wins.

use chrono::{DateTime, Utc};
use fdd_core::{
    quality_score, ExtractedItem, ExtractionStatus, FddId, ProcessingStatus, SectionId,
};
use fdd_validate::{ValidationIssue, ValidationReport};

use crate::error::MetaError;
use crate::traits::{ExtractionMeta, MetadataStore};

/// Everything persisted for one section in one transaction.
#[derive(Debug, Clone)]
pub struct SectionCommit {
    pub section_id: SectionId,
    pub fdd_id: FddId,
    /// The payload to store; `None` for Failed/Skipped commits.
    pub payload: Option<ExtractedItem>,
    pub status: ExtractionStatus,
    pub needs_review: bool,
    pub issues: Vec<ValidationIssue>,
    pub meta: ExtractionMeta,
    pub extracted_at: DateTime<Utc>,
}

/// Outcome of a document finalization check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Finalization {
    /// Sections remain non-terminal; nothing changed.
    NotYet,
    /// The document reached a terminal status with the given quality.
    Finalized {
        status: ProcessingStatus,
        quality: f64,
    },
    /// Another worker finalized first; nothing changed.
    AlreadyFinal,
}

/// Type-aware storage routing over a [`MetadataStore`].
pub struct StorageRouter<'a, S: MetadataStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: MetadataStore + ?Sized> StorageRouter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Persist a validated extraction outcome for one section.
    ///
    /// The validation report decides the stored shape:
    /// - blocking report → no payload, section Failed;
    /// - warnings or bypass → payload stored, `needs_review` set;
    /// - clean → payload stored.
    pub async fn store_section(
        &self,
        section_id: SectionId,
        fdd_id: FddId,
        item: ExtractedItem,
        report: &ValidationReport,
        meta: ExtractionMeta,
    ) -> Result<ExtractionStatus, MetaError> {
        let (status, payload) = if report.has_blocking() {
            (ExtractionStatus::Failed, None)
        } else {
            (ExtractionStatus::Success, Some(item))
        };

        let commit = SectionCommit {
            section_id,
            fdd_id,
            payload,
            status,
            needs_review: report.needs_review(),
            issues: report.issues.clone(),
            meta,
            extracted_at: self.store.now(),
        };
        self.store.commit_section(&commit).await?;
        tracing::info!(
            %fdd_id,
            %section_id,
            status = %status,
            issues = report.issues.len(),
            "section stored"
        );
        Ok(status)
    }

    /// Record a terminal non-success outcome (Failed or Skipped).
    pub async fn store_section_failure(
        &self,
        section_id: SectionId,
        status: ExtractionStatus,
        needs_review: bool,
        issues: &[ValidationIssue],
    ) -> Result<(), MetaError> {
        debug_assert!(matches!(
            status,
            ExtractionStatus::Failed | ExtractionStatus::Skipped
        ));
        self.store
            .mark_section_terminal(section_id, status, needs_review, issues)
            .await
    }

    /// Finalize the document when every section is terminal: recompute
    /// the quality score and CAS the processing status.
    ///
    /// The document fails outright only when every high-value section
    /// failed; otherwise partial results complete with a reduced
    /// quality score.
    pub async fn finalize_document(&self, fdd_id: FddId) -> Result<Finalization, MetaError> {
        let sections = self.store.list_sections(fdd_id).await?;
        if sections.is_empty()
            || sections
                .iter()
                .any(|s| !s.extraction_status.is_terminal())
        {
            return Ok(Finalization::NotYet);
        }

        let quality = quality_score(&sections);
        let high_value: Vec<_> = sections
            .iter()
            .filter(|s| s.item_no.is_high_value())
            .collect();
        let all_high_value_failed = !high_value.is_empty()
            && high_value
                .iter()
                .all(|s| s.extraction_status == ExtractionStatus::Failed);
        let any_success = sections
            .iter()
            .any(|s| s.extraction_status == ExtractionStatus::Success);

        let status = if all_high_value_failed || !any_success {
            ProcessingStatus::Failed
        } else {
            ProcessingStatus::Completed
        };

        let won = self
            .store
            .update_fdd_status(fdd_id, ProcessingStatus::Processing, status)
            .await?;
        if !won {
            return Ok(Finalization::AlreadyFinal);
        }
        self.store.set_fdd_quality(fdd_id, quality).await?;
        tracing::info!(%fdd_id, status = %status, quality, "document finalized");
        Ok(Finalization::Finalized { status, quality })
    }
}
