// SPDX-License-Identifier: BUSL-1.1
//! # Candidate Merge
//!
//! Collapses the pass outputs into one monotone section list:
//! best-candidate selection per item, page-monotonicity enforcement,
//! midpoint interpolation for single missing items, and boundary
//! assignment.

use std::collections::BTreeMap;

use fdd_core::ItemNo;

use crate::candidate::{DetectedSection, DetectionCandidate, DetectionPass};

/// Confidence assigned to interpolated sections.
const INTERPOLATED_CONFIDENCE: f32 = 0.50;
/// Confidence assigned to the implicit intro span.
const IMPLICIT_CONFIDENCE: f32 = 0.90;

/// Pick the winning candidate per item: highest confidence, then
/// earliest pass, then earliest page.
pub fn best_per_item(candidates: &[DetectionCandidate]) -> BTreeMap<ItemNo, DetectionCandidate> {
    let mut best: BTreeMap<ItemNo, DetectionCandidate> = BTreeMap::new();
    for &candidate in candidates {
        match best.get(&candidate.item_no) {
            None => {
                best.insert(candidate.item_no, candidate);
            }
            Some(current) => {
                let wins = candidate.confidence > current.confidence
                    || (candidate.confidence == current.confidence
                        && (candidate.pass < current.pass
                            || (candidate.pass == current.pass && candidate.page < current.page)));
                if wins {
                    best.insert(candidate.item_no, candidate);
                }
            }
        }
    }
    best
}

/// Enforce item monotonicity: walking items in catalog order, drop any
/// whose page is at or before the previously kept item's page.
pub fn enforce_monotone(best: BTreeMap<ItemNo, DetectionCandidate>) -> Vec<DetectionCandidate> {
    let mut kept: Vec<DetectionCandidate> = Vec::new();
    for (_, candidate) in best {
        // Pop previously kept items the candidate both conflicts with
        // and out-scores; if a conflict it cannot out-score remains,
        // the candidate is dropped instead.
        while let Some(prev) = kept.last() {
            if candidate.page > prev.page {
                break;
            }
            if candidate.confidence > prev.confidence {
                kept.pop();
            } else {
                break;
            }
        }
        match kept.last() {
            Some(prev) if candidate.page <= prev.page => {}
            _ => kept.push(candidate),
        }
    }
    kept
}

/// Interpolate a missing item N between detected neighbors N−1 at page
/// `a` and N+1 at page `b` when `b − a ≥ 2`: place N at ⌈(a+b)/2⌉ with
/// low confidence and the review flag.
pub fn interpolate(kept: &[DetectionCandidate]) -> Vec<DetectionCandidate> {
    let mut out = kept.to_vec();
    let mut inserted = Vec::new();
    for window in kept.windows(2) {
        let (prev, next) = (window[0], window[1]);
        let gap_is_single_item = next.item_no.as_u8() == prev.item_no.as_u8() + 2;
        if gap_is_single_item && next.page >= prev.page + 2 {
            if let Some(item_no) = ItemNo::new(prev.item_no.as_u8() + 1) {
                inserted.push(DetectionCandidate {
                    item_no,
                    page: (prev.page + next.page).div_ceil(2),
                    confidence: INTERPOLATED_CONFIDENCE,
                    pass: DetectionPass::Interpolated,
                });
            }
        }
    }
    out.extend(inserted);
    out.sort_by_key(|c| c.item_no);
    out
}

/// Prepend the implicit intro span when detection starts after page 1
/// and no candidate claimed item 0.
pub fn add_implicit_intro(kept: &mut Vec<DetectionCandidate>) {
    let starts_late = kept
        .first()
        .map(|c| c.item_no != ItemNo::INTRO && c.page > 1)
        .unwrap_or(false);
    if starts_late {
        kept.insert(
            0,
            DetectionCandidate {
                item_no: ItemNo::INTRO,
                page: 1,
                confidence: IMPLICIT_CONFIDENCE,
                pass: DetectionPass::Implicit,
            },
        );
    }
}

/// Assign boundaries: each section ends where the next begins, the last
/// ends at `total_pages`.
pub fn assign_boundaries(kept: &[DetectionCandidate], total_pages: u32) -> Vec<DetectedSection> {
    let mut sections = Vec::with_capacity(kept.len());
    for (i, candidate) in kept.iter().enumerate() {
        let end_page = kept
            .get(i + 1)
            .map(|next| next.page - 1)
            .unwrap_or(total_pages);
        sections.push(DetectedSection {
            item_no: candidate.item_no,
            start_page: candidate.page,
            end_page,
            confidence: candidate.confidence,
            pass: candidate.pass,
            needs_review: candidate.pass == DetectionPass::Interpolated,
        });
    }
    sections
}
