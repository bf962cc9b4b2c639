//! # In-Memory Metadata Store
//!
//! DashMap-backed implementation with the same semantics as the
//! Postgres backend. Used by tests and in-memory-only deployments.
//! A scriptable outage flag lets tests exercise transient-failure
//! paths.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use fdd_core::{
    ContentHash, ExtractedItem, ExtractionStatus, Fdd, FddId, Franchisor, FranchisorId,
    ProcessingStatus, ReviewId, ReviewRecord, Section, SectionId,
};
use fdd_embed::vector::cosine_similarity;
use fdd_resolve::FranchisorMatch;
use fdd_validate::ValidationIssue;

use crate::error::MetaError;
use crate::router::SectionCommit;
use crate::traits::MetadataStore;

/// In-memory metadata store.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    franchisors: DashMap<FranchisorId, Franchisor>,
    fdds: DashMap<FddId, Fdd>,
    sections: DashMap<SectionId, Section>,
    section_keys: DashMap<(FddId, u8), SectionId>,
    payloads: DashMap<SectionId, ExtractedItem>,
    issues: DashMap<SectionId, Vec<ValidationIssue>>,
    reviews: DashMap<ReviewId, ReviewRecord>,
    /// When set, every operation fails with `Unavailable`.
    outage: AtomicBool,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the scripted outage. While active every call returns
    /// [`MetaError::Unavailable`].
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> Result<(), MetaError> {
        if self.outage.load(Ordering::SeqCst) {
            Err(MetaError::Unavailable("scripted outage".into()))
        } else {
            Ok(())
        }
    }

    /// Number of filings currently stored (test assertion surface).
    pub fn fdd_count(&self) -> usize {
        self.fdds.len()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_franchisor(&self, franchisor: &Franchisor) -> Result<(), MetaError> {
        self.check_up()?;
        let duplicate = self
            .franchisors
            .iter()
            .any(|f| f.canonical_name == franchisor.canonical_name);
        if duplicate {
            return Err(MetaError::Conflict(format!(
                "canonical name {:?} exists",
                franchisor.canonical_name
            )));
        }
        self.franchisors.insert(franchisor.id, franchisor.clone());
        Ok(())
    }

    async fn get_franchisor(&self, id: FranchisorId) -> Result<Option<Franchisor>, MetaError> {
        self.check_up()?;
        Ok(self.franchisors.get(&id).map(|f| f.clone()))
    }

    async fn find_franchisor_by_name(
        &self,
        canonical_name: &str,
    ) -> Result<Option<FranchisorId>, MetaError> {
        self.check_up()?;
        Ok(self
            .franchisors
            .iter()
            .find(|f| f.canonical_name == canonical_name)
            .map(|f| f.id))
    }

    async fn top_k_franchisors(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<FranchisorMatch>, MetaError> {
        self.check_up()?;
        let mut matches: Vec<FranchisorMatch> = self
            .franchisors
            .iter()
            .map(|f| FranchisorMatch {
                id: f.id,
                canonical_name: f.canonical_name.clone(),
                similarity: cosine_similarity(embedding, &f.name_embedding),
                created_at: f.created_at,
            })
            .collect();
        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.created_at.cmp(&b.created_at))
        });
        matches.truncate(k);
        Ok(matches)
    }

    async fn add_alternate_name(
        &self,
        id: FranchisorId,
        alternate: &str,
    ) -> Result<(), MetaError> {
        self.check_up()?;
        let mut entry = self
            .franchisors
            .get_mut(&id)
            .ok_or_else(|| MetaError::NotFound(format!("franchisor {id}")))?;
        if !entry.alternate_names.iter().any(|n| n == alternate) {
            entry.alternate_names.push(alternate.to_string());
            entry.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn insert_fdd(&self, fdd: &Fdd) -> Result<(), MetaError> {
        self.check_up()?;
        self.fdds.insert(fdd.id, fdd.clone());
        Ok(())
    }

    async fn get_fdd(&self, id: FddId) -> Result<Option<Fdd>, MetaError> {
        self.check_up()?;
        Ok(self.fdds.get(&id).map(|f| f.clone()))
    }

    async fn find_fdd_by_hash(&self, hash: &ContentHash) -> Result<Option<Fdd>, MetaError> {
        self.check_up()?;
        Ok(self
            .fdds
            .iter()
            .find(|f| f.content_hash == *hash && f.duplicate_of.is_none())
            .map(|f| f.clone()))
    }

    async fn list_fdds_for_franchisor(
        &self,
        franchisor_id: FranchisorId,
    ) -> Result<Vec<Fdd>, MetaError> {
        self.check_up()?;
        let mut fdds: Vec<Fdd> = self
            .fdds
            .iter()
            .filter(|f| f.franchisor_id == franchisor_id)
            .map(|f| f.clone())
            .collect();
        fdds.sort_by_key(|f| f.created_at);
        Ok(fdds)
    }

    async fn set_superseded_by(&self, older: FddId, newer: FddId) -> Result<(), MetaError> {
        self.check_up()?;
        let mut entry = self
            .fdds
            .get_mut(&older)
            .ok_or_else(|| MetaError::NotFound(format!("fdd {older}")))?;
        entry
            .set_superseded_by(newer)
            .map_err(|e| MetaError::Conflict(e.to_string()))?;
        entry.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn set_duplicate_of(&self, dup: FddId, primary: FddId) -> Result<(), MetaError> {
        self.check_up()?;
        let mut entry = self
            .fdds
            .get_mut(&dup)
            .ok_or_else(|| MetaError::NotFound(format!("fdd {dup}")))?;
        entry
            .set_duplicate_of(primary)
            .map_err(|e| MetaError::Conflict(e.to_string()))?;
        entry.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn update_fdd_status(
        &self,
        id: FddId,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<bool, MetaError> {
        self.check_up()?;
        let mut entry = self
            .fdds
            .get_mut(&id)
            .ok_or_else(|| MetaError::NotFound(format!("fdd {id}")))?;
        if entry.processing_status != from {
            return Ok(false);
        }
        if !from.can_transition_to(to) {
            return Err(MetaError::InvalidTransition {
                fdd_id: id,
                detail: format!("{from} -> {to}"),
            });
        }
        entry.processing_status = to;
        entry.updated_at = chrono::Utc::now();
        Ok(true)
    }

    async fn set_fdd_quality(&self, id: FddId, quality: f64) -> Result<(), MetaError> {
        self.check_up()?;
        let mut entry = self
            .fdds
            .get_mut(&id)
            .ok_or_else(|| MetaError::NotFound(format!("fdd {id}")))?;
        entry.quality_score = Some(quality);
        entry.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn upsert_section(&self, section: &Section) -> Result<SectionId, MetaError> {
        self.check_up()?;
        let key = (section.fdd_id, section.item_no.as_u8());
        if let Some(existing) = self.section_keys.get(&key) {
            // Idempotent re-registration: the existing section (and its
            // status) stands.
            return Ok(*existing);
        }
        self.section_keys.insert(key, section.id);
        self.sections.insert(section.id, section.clone());
        Ok(section.id)
    }

    async fn get_section(&self, id: SectionId) -> Result<Option<Section>, MetaError> {
        self.check_up()?;
        Ok(self.sections.get(&id).map(|s| s.clone()))
    }

    async fn list_sections(&self, fdd_id: FddId) -> Result<Vec<Section>, MetaError> {
        self.check_up()?;
        let mut sections: Vec<Section> = self
            .sections
            .iter()
            .filter(|s| s.fdd_id == fdd_id)
            .map(|s| s.clone())
            .collect();
        sections.sort_by_key(|s| s.item_no);
        Ok(sections)
    }

    async fn mark_section_processing(&self, id: SectionId) -> Result<(), MetaError> {
        self.check_up()?;
        let mut entry = self
            .sections
            .get_mut(&id)
            .ok_or_else(|| MetaError::NotFound(format!("section {id}")))?;
        entry.extraction_status = ExtractionStatus::Processing;
        entry.attempt_count += 1;
        Ok(())
    }

    async fn mark_section_terminal(
        &self,
        id: SectionId,
        status: ExtractionStatus,
        needs_review: bool,
        issues: &[ValidationIssue],
    ) -> Result<(), MetaError> {
        self.check_up()?;
        let mut entry = self
            .sections
            .get_mut(&id)
            .ok_or_else(|| MetaError::NotFound(format!("section {id}")))?;
        entry.extraction_status = status;
        entry.needs_review |= needs_review;
        self.issues.insert(id, issues.to_vec());
        Ok(())
    }

    async fn set_section_storage_path(&self, id: SectionId, path: &str) -> Result<(), MetaError> {
        self.check_up()?;
        let mut entry = self
            .sections
            .get_mut(&id)
            .ok_or_else(|| MetaError::NotFound(format!("section {id}")))?;
        entry.storage_path = Some(path.to_string());
        Ok(())
    }

    async fn commit_section(&self, commit: &SectionCommit) -> Result<(), MetaError> {
        self.check_up()?;
        let mut entry = self
            .sections
            .get_mut(&commit.section_id)
            .ok_or_else(|| MetaError::NotFound(format!("section {}", commit.section_id)))?;
        if let Some(payload) = &commit.payload {
            self.payloads.insert(commit.section_id, payload.clone());
        }
        self.issues
            .insert(commit.section_id, commit.issues.clone());
        entry.extraction_status = commit.status;
        entry.needs_review |= commit.needs_review;
        entry.extraction_model = commit.meta.model.clone();
        entry.attempt_count = entry.attempt_count.max(commit.meta.attempts);
        entry.extracted_at = Some(commit.extracted_at);
        Ok(())
    }

    async fn get_payload(
        &self,
        section_id: SectionId,
    ) -> Result<Option<ExtractedItem>, MetaError> {
        self.check_up()?;
        Ok(self.payloads.get(&section_id).map(|p| p.clone()))
    }

    async fn list_issues(&self, section_id: SectionId) -> Result<Vec<ValidationIssue>, MetaError> {
        self.check_up()?;
        Ok(self
            .issues
            .get(&section_id)
            .map(|i| i.clone())
            .unwrap_or_default())
    }

    async fn insert_review(&self, review: &ReviewRecord) -> Result<(), MetaError> {
        self.check_up()?;
        self.reviews.insert(review.id, review.clone());
        Ok(())
    }

    async fn list_reviews(&self, fdd_id: FddId) -> Result<Vec<ReviewRecord>, MetaError> {
        self.check_up()?;
        let mut reviews: Vec<ReviewRecord> = self
            .reviews
            .iter()
            .filter(|r| r.fdd_id == fdd_id)
            .map(|r| r.clone())
            .collect();
        reviews.sort_by_key(|r| r.created_at);
        Ok(reviews)
    }
}
