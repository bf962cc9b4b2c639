//! # Postgres Metadata Store
//!
//! SQLx-backed implementation over the schema in `migrations/`.
//! Status transitions are compare-and-set UPDATEs; section commits run
//! in a single transaction so a failed commit leaves no partial state.
//!
//! Vector similarity is computed in application code over fetched
//! candidates — embeddings live in `REAL[]` columns and the candidate
//! set is bounded, so no vector-index extension is required.

pub mod payloads;
pub mod rows;

use async_trait::async_trait;
use chrono::Utc;
use fdd_core::{
    ContentHash, ExtractedItem, ExtractionStatus, Fdd, FddId, Franchisor, FranchisorId,
    ProcessingStatus, ReviewRecord, Section, SectionId,
};
use fdd_embed::vector::cosine_similarity;
use fdd_resolve::FranchisorMatch;
use fdd_validate::ValidationIssue;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::MetaError;
use crate::router::SectionCommit;
use crate::traits::MetadataStore;

use rows::{
    document_type_str, extraction_status_str, processing_status_str, review_reason_str, FddRow,
    FranchisorRow, ReviewRow, SectionRow,
};

/// Candidate pool fetched for application-side similarity ranking.
const SIMILARITY_CANDIDATE_LIMIT: i64 = 10_000;

/// Build the connection pool and run embedded migrations.
pub async fn init_pool(database_url: &str, db_timeout_secs: u64) -> Result<PgPool, MetaError> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(db_timeout_secs))
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| MetaError::Unavailable(format!("migration failed: {e}")))?;
    tracing::info!("connected to PostgreSQL, migrations applied");
    Ok(pool)
}

/// Postgres-backed metadata store.
#[derive(Debug, Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn insert_franchisor(&self, franchisor: &Franchisor) -> Result<(), MetaError> {
        sqlx::query(
            "INSERT INTO franchisors
               (id, canonical_name, parent_company, contact_email, contact_phone,
                alternate_names, name_embedding, tentative, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(franchisor.id.as_uuid())
        .bind(&franchisor.canonical_name)
        .bind(&franchisor.parent_company)
        .bind(&franchisor.contact_email)
        .bind(&franchisor.contact_phone)
        .bind(&franchisor.alternate_names)
        .bind(&franchisor.name_embedding)
        .bind(franchisor.tentative)
        .bind(franchisor.created_at)
        .bind(franchisor.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_franchisor(&self, id: FranchisorId) -> Result<Option<Franchisor>, MetaError> {
        let row = sqlx::query_as::<_, FranchisorRow>(
            "SELECT id, canonical_name, parent_company, contact_email, contact_phone,
                    alternate_names, name_embedding, tentative, created_at, updated_at
             FROM franchisors WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FranchisorRow::into_record))
    }

    async fn find_franchisor_by_name(
        &self,
        canonical_name: &str,
    ) -> Result<Option<FranchisorId>, MetaError> {
        let id: Option<(uuid::Uuid,)> =
            sqlx::query_as("SELECT id FROM franchisors WHERE canonical_name = $1")
                .bind(canonical_name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.map(|(id,)| FranchisorId::from(id)))
    }

    async fn top_k_franchisors(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<FranchisorMatch>, MetaError> {
        let rows = sqlx::query_as::<_, FranchisorRow>(
            "SELECT id, canonical_name, parent_company, contact_email, contact_phone,
                    alternate_names, name_embedding, tentative, created_at, updated_at
             FROM franchisors ORDER BY created_at LIMIT $1",
        )
        .bind(SIMILARITY_CANDIDATE_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<FranchisorMatch> = rows
            .into_iter()
            .map(|r| {
                let similarity = cosine_similarity(embedding, &r.name_embedding);
                FranchisorMatch {
                    id: FranchisorId::from(r.id),
                    canonical_name: r.canonical_name,
                    similarity,
                    created_at: r.created_at,
                }
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
        sqlx::query(
            "UPDATE franchisors
             SET alternate_names = array_append(alternate_names, $2), updated_at = $3
             WHERE id = $1 AND NOT ($2 = ANY(alternate_names))",
        )
        .bind(id.as_uuid())
        .bind(alternate)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_fdd(&self, fdd: &Fdd) -> Result<(), MetaError> {
        sqlx::query(
            "INSERT INTO fdds
               (id, franchisor_id, issue_date, amendment_date, document_type, filing_state,
                storage_path, content_hash, total_pages, processing_status, superseded_by,
                duplicate_of, quality_score, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(fdd.id.as_uuid())
        .bind(fdd.franchisor_id.as_uuid())
        .bind(fdd.issue_date)
        .bind(fdd.amendment_date)
        .bind(document_type_str(fdd.document_type))
        .bind(&fdd.filing_state)
        .bind(&fdd.storage_path)
        .bind(fdd.content_hash.to_hex())
        .bind(fdd.total_pages as i32)
        .bind(processing_status_str(fdd.processing_status))
        .bind(fdd.superseded_by.map(|id| id.as_uuid()))
        .bind(fdd.duplicate_of.map(|id| id.as_uuid()))
        .bind(fdd.quality_score)
        .bind(fdd.created_at)
        .bind(fdd.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_fdd(&self, id: FddId) -> Result<Option<Fdd>, MetaError> {
        let row = sqlx::query_as::<_, FddRow>(
            "SELECT id, franchisor_id, issue_date, amendment_date, document_type, filing_state,
                    storage_path, content_hash, total_pages, processing_status, superseded_by,
                    duplicate_of, quality_score, created_at, updated_at
             FROM fdds WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(FddRow::into_record).transpose()
    }

    async fn find_fdd_by_hash(&self, hash: &ContentHash) -> Result<Option<Fdd>, MetaError> {
        let row = sqlx::query_as::<_, FddRow>(
            "SELECT id, franchisor_id, issue_date, amendment_date, document_type, filing_state,
                    storage_path, content_hash, total_pages, processing_status, superseded_by,
                    duplicate_of, quality_score, created_at, updated_at
             FROM fdds WHERE content_hash = $1 AND duplicate_of IS NULL",
        )
        .bind(hash.to_hex())
        .fetch_optional(&self.pool)
        .await?;
        row.map(FddRow::into_record).transpose()
    }

    async fn list_fdds_for_franchisor(
        &self,
        franchisor_id: FranchisorId,
    ) -> Result<Vec<Fdd>, MetaError> {
        let rows = sqlx::query_as::<_, FddRow>(
            "SELECT id, franchisor_id, issue_date, amendment_date, document_type, filing_state,
                    storage_path, content_hash, total_pages, processing_status, superseded_by,
                    duplicate_of, quality_score, created_at, updated_at
             FROM fdds WHERE franchisor_id = $1 ORDER BY created_at",
        )
        .bind(franchisor_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(FddRow::into_record).collect()
    }

    async fn set_superseded_by(&self, older: FddId, newer: FddId) -> Result<(), MetaError> {
        let result = sqlx::query(
            "UPDATE fdds SET superseded_by = $2, updated_at = $3
             WHERE id = $1 AND duplicate_of IS NULL",
        )
        .bind(older.as_uuid())
        .bind(newer.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MetaError::Conflict(format!(
                "fdd {older} missing or already a duplicate"
            )));
        }
        Ok(())
    }

    async fn set_duplicate_of(&self, dup: FddId, primary: FddId) -> Result<(), MetaError> {
        let result = sqlx::query(
            "UPDATE fdds SET duplicate_of = $2, updated_at = $3
             WHERE id = $1 AND superseded_by IS NULL",
        )
        .bind(dup.as_uuid())
        .bind(primary.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(MetaError::Conflict(format!(
                "fdd {dup} missing or already superseded"
            )));
        }
        Ok(())
    }

    async fn update_fdd_status(
        &self,
        id: FddId,
        from: ProcessingStatus,
        to: ProcessingStatus,
    ) -> Result<bool, MetaError> {
        if !from.can_transition_to(to) {
            return Err(MetaError::InvalidTransition {
                fdd_id: id,
                detail: format!("{from} -> {to}"),
            });
        }
        let result = sqlx::query(
            "UPDATE fdds SET processing_status = $3, updated_at = $4
             WHERE id = $1 AND processing_status = $2",
        )
        .bind(id.as_uuid())
        .bind(processing_status_str(from))
        .bind(processing_status_str(to))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_fdd_quality(&self, id: FddId, quality: f64) -> Result<(), MetaError> {
        sqlx::query("UPDATE fdds SET quality_score = $2, updated_at = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(quality)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn upsert_section(&self, section: &Section) -> Result<SectionId, MetaError> {
        // Existing (fdd, item) rows stand so re-registration is
        // idempotent; ON CONFLICT DO NOTHING + read-back.
        sqlx::query(
            "INSERT INTO sections
               (id, fdd_id, item_no, start_page, end_page, extraction_status,
                extraction_model, attempt_count, needs_review, storage_path, extracted_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (fdd_id, item_no) DO NOTHING",
        )
        .bind(section.id.as_uuid())
        .bind(section.fdd_id.as_uuid())
        .bind(section.item_no.as_u8() as i16)
        .bind(section.start_page as i32)
        .bind(section.end_page as i32)
        .bind(extraction_status_str(section.extraction_status))
        .bind(&section.extraction_model)
        .bind(section.attempt_count as i32)
        .bind(section.needs_review)
        .bind(&section.storage_path)
        .bind(section.extracted_at)
        .execute(&self.pool)
        .await?;

        let (id,): (uuid::Uuid,) =
            sqlx::query_as("SELECT id FROM sections WHERE fdd_id = $1 AND item_no = $2")
                .bind(section.fdd_id.as_uuid())
                .bind(section.item_no.as_u8() as i16)
                .fetch_one(&self.pool)
                .await?;
        Ok(SectionId::from(id))
    }

    async fn get_section(&self, id: SectionId) -> Result<Option<Section>, MetaError> {
        let row = sqlx::query_as::<_, SectionRow>(
            "SELECT id, fdd_id, item_no, start_page, end_page, extraction_status,
                    extraction_model, attempt_count, needs_review, storage_path, extracted_at
             FROM sections WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(SectionRow::into_record).transpose()
    }

    async fn list_sections(&self, fdd_id: FddId) -> Result<Vec<Section>, MetaError> {
        let rows = sqlx::query_as::<_, SectionRow>(
            "SELECT id, fdd_id, item_no, start_page, end_page, extraction_status,
                    extraction_model, attempt_count, needs_review, storage_path, extracted_at
             FROM sections WHERE fdd_id = $1 ORDER BY item_no",
        )
        .bind(fdd_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SectionRow::into_record).collect()
    }

    async fn mark_section_processing(&self, id: SectionId) -> Result<(), MetaError> {
        sqlx::query(
            "UPDATE sections
             SET extraction_status = 'Processing', attempt_count = attempt_count + 1
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_section_terminal(
        &self,
        id: SectionId,
        status: ExtractionStatus,
        needs_review: bool,
        issues: &[ValidationIssue],
    ) -> Result<(), MetaError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE sections
             SET extraction_status = $2, needs_review = needs_review OR $3
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(extraction_status_str(status))
        .bind(needs_review)
        .execute(&mut *tx)
        .await?;
        payloads::replace_issues(&mut tx, id.as_uuid(), issues).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_section_storage_path(&self, id: SectionId, path: &str) -> Result<(), MetaError> {
        sqlx::query("UPDATE sections SET storage_path = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn commit_section(&self, commit: &SectionCommit) -> Result<(), MetaError> {
        let mut tx = self.pool.begin().await?;
        let section_uuid = commit.section_id.as_uuid();

        payloads::delete_for_section(&mut tx, section_uuid).await?;
        if let Some(payload) = &commit.payload {
            payloads::insert_payload(&mut tx, section_uuid, payload).await?;
        }
        payloads::replace_issues(&mut tx, section_uuid, &commit.issues).await?;

        sqlx::query(
            "UPDATE sections
             SET extraction_status = $2,
                 needs_review = needs_review OR $3,
                 extraction_model = $4,
                 attempt_count = GREATEST(attempt_count, $5),
                 extracted_at = $6
             WHERE id = $1",
        )
        .bind(section_uuid)
        .bind(extraction_status_str(commit.status))
        .bind(commit.needs_review)
        .bind(&commit.meta.model)
        .bind(commit.meta.attempts as i32)
        .bind(commit.extracted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_payload(
        &self,
        section_id: SectionId,
    ) -> Result<Option<ExtractedItem>, MetaError> {
        let Some(section) = self.get_section(section_id).await? else {
            return Ok(None);
        };
        payloads::read_payload(&self.pool, section_id.as_uuid(), section.item_no.as_u8()).await
    }

    async fn list_issues(
        &self,
        section_id: SectionId,
    ) -> Result<Vec<ValidationIssue>, MetaError> {
        payloads::list_issues(&self.pool, section_id.as_uuid()).await
    }

    async fn insert_review(&self, review: &ReviewRecord) -> Result<(), MetaError> {
        let candidates = serde_json::to_value(&review.candidates)
            .map_err(|e| MetaError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO reviews (id, fdd_id, reason, detail, candidates, resolved, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(review.id.as_uuid())
        .bind(review.fdd_id.as_uuid())
        .bind(review_reason_str(review.reason))
        .bind(&review.detail)
        .bind(candidates)
        .bind(review.resolved)
        .bind(review.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_reviews(&self, fdd_id: FddId) -> Result<Vec<ReviewRecord>, MetaError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT id, fdd_id, reason, detail, candidates, resolved, created_at
             FROM reviews WHERE fdd_id = $1 ORDER BY created_at",
        )
        .bind(fdd_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ReviewRow::into_record).collect()
    }
}
