//! # Section Detector — Pass Orchestration
//!
//! Runs the four passes in order, merges their candidates, and
//! validates coverage. The fallback for thin detections is decided by
//! the caller: [`DetectError::InsufficientAnchors`] is recoverable (a
//! single full-document section with the review flag), while
//! [`DetectError::LayoutMissing`] is fatal for the document.

use std::collections::BTreeSet;

use fdd_core::config::DetectorConfig;
use fdd_document::LayoutRecord;
use thiserror::Error;

use crate::candidate::{DetectedSection, Detection};
use crate::merge;
use crate::passes;

/// Error from section detection.
#[derive(Error, Debug)]
pub enum DetectError {
    /// No layout record is available for the document.
    #[error("layout record missing or empty")]
    LayoutMissing,

    /// Too few items were found to trust the partition.
    #[error("only {found} of 25 items detected, {required} required")]
    InsufficientAnchors { found: usize, required: usize },
}

/// Multi-pass section detector.
#[derive(Debug, Clone)]
pub struct SectionDetector {
    config: DetectorConfig,
}

impl SectionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Detect sections from a layout record.
    ///
    /// Deterministic: identical input always produces an identical
    /// section list.
    pub fn detect(
        &self,
        layout: &LayoutRecord,
        total_pages: u32,
    ) -> Result<Detection, DetectError> {
        if layout.pages.is_empty() || total_pages == 0 {
            return Err(DetectError::LayoutMissing);
        }

        let mut candidates = passes::anchor_pass(layout);
        candidates.extend(passes::toc_pass(layout, total_pages));

        let claimed_pages: BTreeSet<u32> = candidates.iter().map(|c| c.page).collect();
        candidates.extend(passes::text_scan_pass(layout, &claimed_pages));

        let found_items: BTreeSet<u8> = candidates.iter().map(|c| c.item_no.as_u8()).collect();
        let missing: BTreeSet<u8> = (1..=24).filter(|no| !found_items.contains(no)).collect();
        candidates.extend(passes::fuzzy_pass(layout, &missing));

        // Pages past the document end are layout noise.
        candidates.retain(|c| c.page >= 1 && c.page <= total_pages);

        let best = merge::best_per_item(&candidates);
        let mut kept = merge::enforce_monotone(best);
        kept = merge::interpolate(&kept);
        merge::add_implicit_intro(&mut kept);

        let sections = merge::assign_boundaries(&kept, total_pages);
        let found = sections.len();
        if found < self.config.min_anchors_required {
            tracing::warn!(
                found,
                required = self.config.min_anchors_required,
                "section detection below anchor threshold"
            );
            return Err(DetectError::InsufficientAnchors {
                found,
                required: self.config.min_anchors_required,
            });
        }

        tracing::debug!(sections = found, "section detection complete");
        Ok(Detection { sections })
    }

    /// The recovery shape for [`DetectError::InsufficientAnchors`]: one
    /// section covering every page, flagged for review.
    pub fn fallback_single_section(total_pages: u32) -> Detection {
        Detection {
            sections: vec![DetectedSection {
                item_no: fdd_core::ItemNo::INTRO,
                start_page: 1,
                end_page: total_pages.max(1),
                confidence: 0.0,
                pass: crate::candidate::DetectionPass::Implicit,
                needs_review: true,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdd_document::{BlockKind, LayoutBlock, LayoutPage};

    fn header(text: &str) -> LayoutBlock {
        LayoutBlock {
            kind: BlockKind::Header,
            bbox: [0.0; 4],
            text: text.to_string(),
            confidence: 0.95,
        }
    }

    /// A well-formed 60-page layout with all 23 numbered headings plus
    /// an appendix marker.
    fn full_layout() -> LayoutRecord {
        let mut pages = Vec::new();
        for item in 1..=23u32 {
            pages.push(LayoutPage {
                page_idx: item * 2, // pages 3, 5, 7, ... (1-based)
                size: [612.0, 792.0],
                blocks: vec![header(&format!("ITEM {item}"))],
            });
        }
        pages.push(LayoutPage {
            page_idx: 50,
            size: [612.0, 792.0],
            blocks: vec![LayoutBlock {
                kind: BlockKind::Text,
                bbox: [0.0; 4],
                text: "EXHIBIT A".to_string(),
                confidence: 0.9,
            }],
        });
        LayoutRecord { pages }
    }

    #[test]
    fn detects_full_document() {
        let detector = SectionDetector::new(DetectorConfig::default());
        let detection = detector.detect(&full_layout(), 60).unwrap();
        // 23 numbered + appendix + implicit intro.
        assert_eq!(detection.item_count(), 25);
        let first = detection.sections.first().unwrap();
        assert_eq!(first.item_no.as_u8(), 0);
        assert_eq!(first.start_page, 1);
        let last = detection.sections.last().unwrap();
        assert_eq!(last.item_no.as_u8(), 24);
        assert_eq!(last.end_page, 60);
    }

    #[test]
    fn sections_are_a_non_overlapping_cover() {
        let detector = SectionDetector::new(DetectorConfig::default());
        let detection = detector.detect(&full_layout(), 60).unwrap();
        let mut expected_start = 1;
        for section in &detection.sections {
            assert_eq!(section.start_page, expected_start);
            assert!(section.end_page >= section.start_page);
            expected_start = section.end_page + 1;
        }
        assert_eq!(expected_start, 61);
    }

    #[test]
    fn detection_is_deterministic() {
        let detector = SectionDetector::new(DetectorConfig::default());
        let layout = full_layout();
        let a = detector.detect(&layout, 60).unwrap();
        let b = detector.detect(&layout, 60).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_layout_is_fatal() {
        let detector = SectionDetector::new(DetectorConfig::default());
        assert!(matches!(
            detector.detect(&LayoutRecord::default(), 60),
            Err(DetectError::LayoutMissing)
        ));
    }

    #[test]
    fn thin_detection_is_insufficient() {
        let detector = SectionDetector::new(DetectorConfig::default());
        let layout = LayoutRecord {
            pages: vec![LayoutPage {
                page_idx: 2,
                size: [612.0, 792.0],
                blocks: vec![header("ITEM 1")],
            }],
        };
        match detector.detect(&layout, 60) {
            Err(DetectError::InsufficientAnchors { found, required }) => {
                assert!(found < required);
                assert_eq!(required, 18);
            }
            other => panic!("expected InsufficientAnchors, got {other:?}"),
        }
    }

    #[test]
    fn interpolation_fills_single_missing_item() {
        let mut layout = full_layout();
        // Remove the ITEM 12 heading; neighbors 11 and 13 remain.
        layout
            .pages
            .retain(|p| !p.blocks.iter().any(|b| b.text == "ITEM 12"));
        let detector = SectionDetector::new(DetectorConfig::default());
        let detection = detector.detect(&layout, 60).unwrap();
        let twelve = detection
            .sections
            .iter()
            .find(|s| s.item_no.as_u8() == 12)
            .expect("item 12 interpolated");
        assert!(twelve.needs_review);
        assert_eq!(twelve.confidence, 0.50);
    }

    #[test]
    fn fallback_covers_whole_document() {
        let detection = SectionDetector::fallback_single_section(42);
        assert_eq!(detection.sections.len(), 1);
        assert_eq!(detection.sections[0].start_page, 1);
        assert_eq!(detection.sections[0].end_page, 42);
        assert!(detection.sections[0].needs_review);
    }
}
