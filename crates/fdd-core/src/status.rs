//! # Status Enums — Exact Wire Strings
//!
//! Every status that crosses a persistence or API boundary serializes
//! to a fixed, case-sensitive string. The serde renames here are the
//! contract; changing one is a schema migration.
//!
//! Processing statuses: `Pending`, `Processing`, `Completed`, `Failed`.
//! Extraction statuses additionally distinguish `Success`, `Failed`,
//! and `Skipped` (budget exhaustion is skipped, not failed).
//! Severity and category use SCREAMING_SNAKE per the validation
//! output contract.

use serde::{Deserialize, Serialize};

/// Document-level processing status.
///
/// Lifecycle: `Pending → Processing → {Completed | Failed}`. A document
/// can additionally leave the pipeline at registration by being marked
/// a duplicate or superseded — those are lineage pointers on the
/// record, not statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    /// Whether the document has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Valid transitions of the document state machine.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Per-section extraction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Skipped,
}

impl ExtractionStatus {
    /// Whether the section has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

/// Filing type of a disclosure document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    Initial,
    Amendment,
    Renewal,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initial => "Initial",
            Self::Amendment => "Amendment",
            Self::Renewal => "Renewal",
        };
        f.write_str(s)
    }
}

/// Outcome of entity resolution for a candidate franchisor name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    /// Canonical names were identical after normalization.
    Exact,
    /// Embedding similarity at or above the high-confidence threshold.
    HighConfidence,
    /// No plausible match; a new franchisor was created.
    Created,
    /// Similarity in the review band; a tentative franchisor was
    /// created and the candidates were queued for human review.
    NeedsReview,
}

/// Severity of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Stored and logged only.
    #[serde(rename = "INFO")]
    Info,
    /// Stored, but the record is flagged for review.
    #[serde(rename = "WARNING")]
    Warning,
    /// Blocks storage of the record.
    #[serde(rename = "ERROR")]
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "SCHEMA")]
    Schema,
    #[serde(rename = "BUSINESS_RULE")]
    BusinessRule,
    #[serde(rename = "CROSS_FIELD")]
    CrossField,
    #[serde(rename = "RANGE")]
    Range,
    #[serde(rename = "FORMAT")]
    Format,
    #[serde(rename = "REFERENCE")]
    Reference,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Schema => "SCHEMA",
            Self::BusinessRule => "BUSINESS_RULE",
            Self::CrossField => "CROSS_FIELD",
            Self::Range => "RANGE",
            Self::Format => "FORMAT",
            Self::Reference => "REFERENCE",
        };
        f.write_str(s)
    }
}
