//! # Row Types and Status String Mapping
//!
//! SQLx row structs and the explicit string conversions for every
//! status enum. The strings here are the persisted contract; they match
//! the CHECK constraints in the migrations.

use chrono::{DateTime, NaiveDate, Utc};
use fdd_core::{
    ContentHash, DocumentType, ExtractionStatus, Fdd, FddId, Franchisor, FranchisorId, ItemNo,
    ProcessingStatus, ReviewId, ReviewReason, ReviewRecord, Section, SectionId,
};
use uuid::Uuid;

use crate::error::MetaError;

pub fn processing_status_str(s: ProcessingStatus) -> &'static str {
    match s {
        ProcessingStatus::Pending => "Pending",
        ProcessingStatus::Processing => "Processing",
        ProcessingStatus::Completed => "Completed",
        ProcessingStatus::Failed => "Failed",
    }
}

pub fn parse_processing_status(s: &str) -> Result<ProcessingStatus, MetaError> {
    match s {
        "Pending" => Ok(ProcessingStatus::Pending),
        "Processing" => Ok(ProcessingStatus::Processing),
        "Completed" => Ok(ProcessingStatus::Completed),
        "Failed" => Ok(ProcessingStatus::Failed),
        other => Err(MetaError::Serialization(format!(
            "unknown processing status {other:?}"
        ))),
    }
}

pub fn extraction_status_str(s: ExtractionStatus) -> &'static str {
    match s {
        ExtractionStatus::Pending => "Pending",
        ExtractionStatus::Processing => "Processing",
        ExtractionStatus::Success => "Success",
        ExtractionStatus::Failed => "Failed",
        ExtractionStatus::Skipped => "Skipped",
    }
}

pub fn parse_extraction_status(s: &str) -> Result<ExtractionStatus, MetaError> {
    match s {
        "Pending" => Ok(ExtractionStatus::Pending),
        "Processing" => Ok(ExtractionStatus::Processing),
        "Success" => Ok(ExtractionStatus::Success),
        "Failed" => Ok(ExtractionStatus::Failed),
        "Skipped" => Ok(ExtractionStatus::Skipped),
        other => Err(MetaError::Serialization(format!(
            "unknown extraction status {other:?}"
        ))),
    }
}

pub fn document_type_str(t: DocumentType) -> &'static str {
    match t {
        DocumentType::Initial => "Initial",
        DocumentType::Amendment => "Amendment",
        DocumentType::Renewal => "Renewal",
    }
}

pub fn parse_document_type(s: &str) -> Result<DocumentType, MetaError> {
    match s {
        "Initial" => Ok(DocumentType::Initial),
        "Amendment" => Ok(DocumentType::Amendment),
        "Renewal" => Ok(DocumentType::Renewal),
        other => Err(MetaError::Serialization(format!(
            "unknown document type {other:?}"
        ))),
    }
}

pub fn review_reason_str(r: ReviewReason) -> &'static str {
    match r {
        ReviewReason::EntityMatch => "EntityMatch",
        ReviewReason::SectionDetection => "SectionDetection",
        ReviewReason::Validation => "Validation",
    }
}

pub fn parse_review_reason(s: &str) -> Result<ReviewReason, MetaError> {
    match s {
        "EntityMatch" => Ok(ReviewReason::EntityMatch),
        "SectionDetection" => Ok(ReviewReason::SectionDetection),
        "Validation" => Ok(ReviewReason::Validation),
        other => Err(MetaError::Serialization(format!(
            "unknown review reason {other:?}"
        ))),
    }
}

#[derive(sqlx::FromRow)]
pub struct FranchisorRow {
    pub id: Uuid,
    pub canonical_name: String,
    pub parent_company: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub alternate_names: Vec<String>,
    pub name_embedding: Vec<f32>,
    pub tentative: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FranchisorRow {
    pub fn into_record(self) -> Franchisor {
        Franchisor {
            id: FranchisorId::from(self.id),
            canonical_name: self.canonical_name,
            parent_company: self.parent_company,
            contact_email: self.contact_email,
            contact_phone: self.contact_phone,
            alternate_names: self.alternate_names,
            name_embedding: self.name_embedding,
            tentative: self.tentative,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub struct FddRow {
    pub id: Uuid,
    pub franchisor_id: Uuid,
    pub issue_date: NaiveDate,
    pub amendment_date: Option<NaiveDate>,
    pub document_type: String,
    pub filing_state: String,
    pub storage_path: String,
    pub content_hash: String,
    pub total_pages: i32,
    pub processing_status: String,
    pub superseded_by: Option<Uuid>,
    pub duplicate_of: Option<Uuid>,
    pub quality_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FddRow {
    pub fn into_record(self) -> Result<Fdd, MetaError> {
        Ok(Fdd {
            id: FddId::from(self.id),
            franchisor_id: FranchisorId::from(self.franchisor_id),
            issue_date: self.issue_date,
            amendment_date: self.amendment_date,
            document_type: parse_document_type(&self.document_type)?,
            filing_state: self.filing_state,
            storage_path: self.storage_path,
            content_hash: ContentHash::from_hex(&self.content_hash)
                .map_err(|e| MetaError::Serialization(e.to_string()))?,
            total_pages: self.total_pages as u32,
            processing_status: parse_processing_status(&self.processing_status)?,
            superseded_by: self.superseded_by.map(FddId::from),
            duplicate_of: self.duplicate_of.map(FddId::from),
            quality_score: self.quality_score,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct SectionRow {
    pub id: Uuid,
    pub fdd_id: Uuid,
    pub item_no: i16,
    pub start_page: i32,
    pub end_page: i32,
    pub extraction_status: String,
    pub extraction_model: Option<String>,
    pub attempt_count: i32,
    pub needs_review: bool,
    pub storage_path: Option<String>,
    pub extracted_at: Option<DateTime<Utc>>,
}

impl SectionRow {
    pub fn into_record(self) -> Result<Section, MetaError> {
        Ok(Section {
            id: SectionId::from(self.id),
            fdd_id: FddId::from(self.fdd_id),
            item_no: ItemNo::new(self.item_no as u8).ok_or_else(|| {
                MetaError::Serialization(format!("item_no {} out of range", self.item_no))
            })?,
            start_page: self.start_page as u32,
            end_page: self.end_page as u32,
            extraction_status: parse_extraction_status(&self.extraction_status)?,
            extraction_model: self.extraction_model,
            attempt_count: self.attempt_count as u32,
            needs_review: self.needs_review,
            storage_path: self.storage_path,
            extracted_at: self.extracted_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub struct ReviewRow {
    pub id: Uuid,
    pub fdd_id: Uuid,
    pub reason: String,
    pub detail: String,
    pub candidates: serde_json::Value,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl ReviewRow {
    pub fn into_record(self) -> Result<ReviewRecord, MetaError> {
        let candidates: Vec<(FranchisorId, f32)> = serde_json::from_value(self.candidates)
            .map_err(|e| MetaError::Serialization(e.to_string()))?;
        Ok(ReviewRecord {
            id: ReviewId::from(self.id),
            fdd_id: FddId::from(self.fdd_id),
            reason: parse_review_reason(&self.reason)?,
            detail: self.detail,
            candidates,
            resolved: self.resolved,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(
                parse_processing_status(processing_status_str(status)).unwrap(),
                status
            );
        }
        for status in [
            ExtractionStatus::Pending,
            ExtractionStatus::Processing,
            ExtractionStatus::Success,
            ExtractionStatus::Failed,
            ExtractionStatus::Skipped,
        ] {
            assert_eq!(
                parse_extraction_status(extraction_status_str(status)).unwrap(),
                status
            );
        }
    }

    #[test]
    fn unknown_status_is_serialization_error() {
        assert!(matches!(
            parse_processing_status("Paused"),
            Err(MetaError::Serialization(_))
        ));
    }
}
