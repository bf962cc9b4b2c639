// SPDX-License-Identifier: BUSL-1.1
//! # Document Lineage
//!
//! Duplicate and supersession decisions at registration time, plus the
//! depth-bounded walk that resolves the current filing for a
//! franchisor. Lineage pointers are identifier references; cycles are
//! impossible to construct through this module but the walk defends
//! against corrupted data anyway.

use chrono::NaiveDate;
use fdd_core::{ContentHash, DocumentType, Fdd, FddId};
use thiserror::Error;

/// Maximum supersession-chain length followed before assuming a cycle.
pub const MAX_LINEAGE_DEPTH: usize = 64;

/// Error resolving lineage.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LineageError {
    /// The supersession chain exceeded the depth bound.
    #[error("supersession chain from {start} exceeds depth {MAX_LINEAGE_DEPTH}")]
    ChainTooDeep { start: FddId },
}

/// Facts about a filing being registered, before it has a record.
#[derive(Debug, Clone)]
pub struct NewFiling {
    pub content_hash: ContentHash,
    pub document_type: DocumentType,
    pub issue_date: NaiveDate,
    pub amendment_date: Option<NaiveDate>,
}

impl NewFiling {
    fn effective_date(&self) -> NaiveDate {
        self.amendment_date.unwrap_or(self.issue_date)
    }
}

/// The lineage outcome for a new filing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineageDecision {
    /// Byte-identical to an existing filing: do not process.
    Duplicate { existing: FddId },
    /// The new filing supersedes these current filings.
    Supersedes { older: Vec<FddId> },
    /// Unrelated to existing filings.
    None,
}

/// Decide lineage for a new filing against the franchisor's existing
/// filings.
///
/// `siblings` must be the same-franchisor records. Duplicates are
/// matched on content hash among non-duplicate records; supersession
/// targets are the *current* records (no lineage pointer set) that the
/// new filing replaces: every current record for an amendment, and
/// strictly older current records for an initial or renewal filing.
pub fn decide_lineage(new: &NewFiling, siblings: &[Fdd]) -> LineageDecision {
    if let Some(existing) = siblings
        .iter()
        .find(|s| s.content_hash == new.content_hash && s.duplicate_of.is_none())
    {
        return LineageDecision::Duplicate {
            existing: existing.id,
        };
    }

    let current: Vec<&Fdd> = siblings
        .iter()
        .filter(|s| s.superseded_by.is_none() && s.duplicate_of.is_none())
        .collect();

    let older: Vec<FddId> = match new.document_type {
        DocumentType::Amendment => current.iter().map(|s| s.id).collect(),
        DocumentType::Initial | DocumentType::Renewal => current
            .iter()
            .filter(|s| s.effective_date() < new.effective_date())
            .map(|s| s.id)
            .collect(),
    };

    if older.is_empty() {
        LineageDecision::None
    } else {
        LineageDecision::Supersedes { older }
    }
}

/// Follow `superseded_by` pointers from `start` to the current filing.
///
/// `next` maps an id to its supersession pointer. The walk is bounded
/// by [`MAX_LINEAGE_DEPTH`].
pub fn latest_of(
    start: FddId,
    mut next: impl FnMut(FddId) -> Option<FddId>,
) -> Result<FddId, LineageError> {
    let mut current = start;
    for _ in 0..MAX_LINEAGE_DEPTH {
        match next(current) {
            Some(newer) => current = newer,
            None => return Ok(current),
        }
    }
    Err(LineageError::ChainTooDeep { start })
}
