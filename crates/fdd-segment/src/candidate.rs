//! # Detection Candidates and Results

use fdd_core::ItemNo;
use serde::{Deserialize, Serialize};

/// Which pass produced a candidate. Lower numbers win confidence ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DetectionPass {
    /// `ITEM N` heading in a title/header block.
    Anchor = 1,
    /// Table-of-contents line.
    Toc = 2,
    /// Canonical-title pattern in body text.
    TextScan = 3,
    /// Levenshtein match against a canonical title.
    Fuzzy = 4,
    /// Midpoint interpolation between detected neighbors.
    Interpolated = 5,
    /// Structurally implied (the intro span before Item 1).
    Implicit = 6,
}

/// A scored claim that an item starts on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    pub item_no: ItemNo,
    /// 1-based page number.
    pub page: u32,
    pub confidence: f32,
    pub pass: DetectionPass,
}

/// A detected section with assigned boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedSection {
    pub item_no: ItemNo,
    /// 1-based, inclusive.
    pub start_page: u32,
    /// 1-based, inclusive.
    pub end_page: u32,
    pub confidence: f32,
    pub pass: DetectionPass,
    pub needs_review: bool,
}

/// Complete detection output: a monotone, non-overlapping cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub sections: Vec<DetectedSection>,
}

impl Detection {
    /// Number of distinct items present.
    pub fn item_count(&self) -> usize {
        self.sections.len()
    }
}
