// SPDX-License-Identifier: BUSL-1.1
//! # Registration — Deduplication, Entity Resolution, Lineage
//!
//! The pipeline's entry point for scraped documents. Registration is
//! linearized per content hash: two concurrent submissions of
//! identical bytes produce exactly one primary record and one
//! duplicate pointer, in either arrival order. A bounded in-run cache
//! of registered primaries lets repeat submissions mint their
//! duplicate record without a metadata-store round trip.
//!
//! Raw bytes land at a content-addressed path, so re-registering the
//! same document never writes a second object.

use fdd_core::{
    ContentHash, Fdd, FddId, FranchisorId, ProcessingStatus, RawDocument, ReviewReason,
    ReviewRecord,
};
use fdd_document::{paths, PdfDocument};
use fdd_resolve::{
    decide_lineage, ContactFields, EntityResolver, LineageDecision, NewFiling,
};
use fdd_store::DirectoryAdapter;

use crate::error::PipelineError;
use crate::pipeline::{flatten_retry, Pipeline};

/// Cap on the in-run primary cache. Clearing under pressure is safe:
/// the store lookup stays authoritative for anything evicted.
const SEEN_HASH_CAP: usize = 100_000;

/// Facts about a registered primary, cached per content hash so a
/// repeat submission in the same run can produce its duplicate record
/// without reading the store.
#[derive(Debug, Clone)]
pub(crate) struct PrimaryFacts {
    pub id: FddId,
    pub franchisor_id: FranchisorId,
    pub storage_path: String,
    pub total_pages: u32,
}

impl PrimaryFacts {
    fn of(fdd: &Fdd) -> Self {
        Self {
            id: fdd.id,
            franchisor_id: fdd.franchisor_id,
            storage_path: fdd.storage_path.clone(),
            total_pages: fdd.total_pages,
        }
    }
}

/// Outcome of registering a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    /// A new primary filing, ready for processing.
    New(FddId),
    /// Byte-identical to an existing filing.
    Duplicate { existing: FddId },
}

impl Pipeline {
    /// Register a scraped document: hash, dedupe, store, resolve the
    /// franchisor, and decide lineage.
    pub async fn register_document(
        &self,
        raw: &RawDocument,
    ) -> Result<Registered, PipelineError> {
        self.check_cancel()?;
        let _permit = self.permit(&self.stages.register).await?;

        let hash = ContentHash::of_bytes(&raw.bytes);

        // Linearize concurrent registrations of identical content.
        let _hash_guard = self.hash_locks.lock(&hash.to_hex()).await;

        // Fast path: a primary registered earlier in this run carries
        // everything the duplicate record needs.
        let cached = self.seen_hashes.lock().get(&hash).cloned();
        if let Some(primary) = cached {
            let duplicate = self.record_duplicate(raw, &hash, &primary).await?;
            tracing::info!(
                existing = %primary.id,
                duplicate = %duplicate,
                hash = %hash,
                "duplicate registration (in-run cache)"
            );
            return Ok(Registered::Duplicate {
                existing: primary.id,
            });
        }

        if let Some(existing) = self.deps.store.find_fdd_by_hash(&hash).await? {
            let primary = PrimaryFacts::of(&existing);
            self.remember_primary(hash, primary.clone());
            let duplicate = self.record_duplicate(raw, &hash, &primary).await?;
            tracing::info!(
                existing = %primary.id,
                duplicate = %duplicate,
                hash = %hash,
                "duplicate registration"
            );
            return Ok(Registered::Duplicate {
                existing: primary.id,
            });
        }

        // Structural validation up front; page count feeds the record.
        let total_pages = PdfDocument::parse(&raw.bytes)?.page_count();

        // Entity resolution, retried over transient embedding/store
        // failures.
        let directory = DirectoryAdapter::new(self.deps.store.as_ref());
        let resolver = EntityResolver::new(
            &directory,
            self.deps.embedder.as_ref(),
            self.deps.config.similarity,
        );
        let contacts = ContactFields::default();
        let resolution = self
            .stages
            .register_retry
            .run(
                &self.cancel,
                |e: &fdd_resolve::ResolveError| e.is_transient(),
                || resolver.resolve(&raw.franchisor_name, &contacts),
            )
            .await
            .map_err(flatten_retry)?;

        // Content-addressed raw storage: identical hash, identical path.
        let storage_path = paths::raw_document_path(
            &raw.source_state,
            &raw.franchisor_name,
            chrono::Datelike::year(&raw.issue_date),
            &hash,
        );
        if !self.deps.objects.exists(&storage_path).await? {
            self.deps.objects.put(&storage_path, &raw.bytes).await?;
        }

        let fdd = Fdd {
            id: FddId::new(),
            franchisor_id: resolution.franchisor_id,
            issue_date: raw.issue_date,
            amendment_date: raw.amendment_date,
            document_type: raw.document_type,
            filing_state: raw.source_state.clone(),
            storage_path,
            content_hash: hash,
            total_pages,
            processing_status: ProcessingStatus::Pending,
            superseded_by: None,
            duplicate_of: None,
            quality_score: None,
            created_at: self.deps.store.now(),
            updated_at: self.deps.store.now(),
        };
        self.deps.store.insert_fdd(&fdd).await?;

        // Review-band resolutions persist their candidates.
        if resolution.match_kind == fdd_core::MatchKind::NeedsReview {
            let mut review = ReviewRecord::new(
                fdd.id,
                ReviewReason::EntityMatch,
                format!(
                    "candidate name {:?} created tentative franchisor {}",
                    raw.franchisor_name, resolution.franchisor_id
                ),
            );
            review.candidates = resolution.candidates.clone();
            self.deps.store.insert_review(&review).await?;
        }

        // Supersession against the franchisor's existing filings.
        let siblings = self
            .deps
            .store
            .list_fdds_for_franchisor(resolution.franchisor_id)
            .await?;
        let filing = NewFiling {
            content_hash: hash,
            document_type: raw.document_type,
            issue_date: raw.issue_date,
            amendment_date: raw.amendment_date,
        };
        let others: Vec<Fdd> = siblings.into_iter().filter(|s| s.id != fdd.id).collect();
        if let LineageDecision::Supersedes { older } = decide_lineage(&filing, &others) {
            for old in older {
                self.deps.store.set_superseded_by(old, fdd.id).await?;
                tracing::info!(older = %old, newer = %fdd.id, "filing superseded");
            }
        }

        self.remember_primary(hash, PrimaryFacts::of(&fdd));

        tracing::info!(
            fdd_id = %fdd.id,
            franchisor = %resolution.franchisor_id,
            match_kind = ?resolution.match_kind,
            pages = total_pages,
            "document registered"
        );
        Ok(Registered::New(fdd.id))
    }

    /// Cache a primary's facts for the rest of the run.
    fn remember_primary(&self, hash: ContentHash, facts: PrimaryFacts) {
        let mut seen = self.seen_hashes.lock();
        if seen.len() >= SEEN_HASH_CAP {
            seen.clear();
        }
        seen.insert(hash, facts);
    }

    /// Create the duplicate record pointing at the primary. Duplicates
    /// never process and write no objects.
    async fn record_duplicate(
        &self,
        raw: &RawDocument,
        hash: &ContentHash,
        primary: &PrimaryFacts,
    ) -> Result<FddId, PipelineError> {
        let mut duplicate = Fdd {
            id: FddId::new(),
            franchisor_id: primary.franchisor_id,
            issue_date: raw.issue_date,
            amendment_date: raw.amendment_date,
            document_type: raw.document_type,
            filing_state: raw.source_state.clone(),
            storage_path: primary.storage_path.clone(),
            content_hash: *hash,
            total_pages: primary.total_pages,
            processing_status: ProcessingStatus::Pending,
            superseded_by: None,
            duplicate_of: None,
            quality_score: None,
            created_at: self.deps.store.now(),
            updated_at: self.deps.store.now(),
        };
        duplicate
            .set_duplicate_of(primary.id)
            .map_err(|e| PipelineError::Meta(fdd_store::MetaError::Conflict(e.to_string())))?;
        self.deps.store.insert_fdd(&duplicate).await?;
        Ok(duplicate.id)
    }
}
