//! # Quality Score
//!
//! Weighted completeness of a document's sections: the fraction of
//! quality weight carried by sections that reached `Success`, where the
//! six high-value items weigh 2.0 and everything else 1.0. Recomputed
//! after validation, whenever a section reaches a terminal state.

use crate::model::Section;
use crate::status::ExtractionStatus;

/// Compute the weighted quality score in `[0, 1]` for a document's
/// sections. An empty section list scores 0.
pub fn quality_score(sections: &[Section]) -> f64 {
    let mut total = 0.0;
    let mut succeeded = 0.0;
    for section in sections {
        let weight = section.item_no.quality_weight();
        total += weight;
        if section.extraction_status == ExtractionStatus::Success {
            succeeded += weight;
        }
    }
    if total == 0.0 {
        0.0
    } else {
        succeeded / total
    }
}
