//! # Detection Passes
//!
//! Each pass scans the layout record and emits scored candidates. The
//! passes never filter each other's output — precedence is resolved in
//! the merge step — but the text-scan and fuzzy passes skip pages or
//! items already claimed, per the detection contract.

use std::collections::BTreeSet;

use fdd_core::{ItemNo, ITEM_TITLES};
use fdd_document::{BlockKind, LayoutRecord};

use crate::candidate::{DetectionCandidate, DetectionPass};
use crate::patterns::{ANCHOR, ITEM_PATTERNS, TOC_LINE, TOC_MARKER};

/// Confidence assigned by each pass.
const ANCHOR_CONFIDENCE: f32 = 0.95;
const TOC_CONFIDENCE: f32 = 0.90;
const TEXT_SCAN_CONFIDENCE: f32 = 0.75;
const FUZZY_CONFIDENCE: f32 = 0.70;

/// Minimum normalized Levenshtein ratio for the fuzzy pass.
const FUZZY_RATIO: f64 = 0.80;

/// Pass 1: `ITEM N` headings in title and header blocks.
pub fn anchor_pass(layout: &LayoutRecord) -> Vec<DetectionCandidate> {
    let mut out = Vec::new();
    for page in &layout.pages {
        for block in &page.blocks {
            if !matches!(block.kind, BlockKind::Title | BlockKind::Header) {
                continue;
            }
            if let Some(item) = capture_item(&ANCHOR, &block.text) {
                out.push(DetectionCandidate {
                    item_no: item,
                    page: page.page_idx + 1,
                    confidence: ANCHOR_CONFIDENCE,
                    pass: DetectionPass::Anchor,
                });
            }
        }
    }
    out
}

/// Pass 2: table-of-contents entries within the front matter.
///
/// The ToC region is a text block containing the literal marker within
/// the first tenth of the document (at least one page). Entry lines on
/// the marker page and the following page are parsed for
/// `Item N … page` shapes.
pub fn toc_pass(layout: &LayoutRecord, total_pages: u32) -> Vec<DetectionCandidate> {
    let window = (total_pages as usize).div_ceil(10).max(1) as u32;
    let toc_page = layout.pages.iter().find(|p| {
        p.page_idx + 1 <= window
            && p.blocks
                .iter()
                .any(|b| b.text.to_lowercase().contains(TOC_MARKER))
    });
    let Some(toc_page) = toc_page else {
        return Vec::new();
    };

    let mut out = Vec::new();
    // ToCs regularly spill onto the next page.
    let region = [toc_page.page_idx, toc_page.page_idx + 1];
    for page in layout.pages.iter().filter(|p| region.contains(&p.page_idx)) {
        for block in &page.blocks {
            for line in block.text.lines() {
                if let Some(caps) = TOC_LINE.captures(line) {
                    let item = caps[1].parse::<u8>().ok().and_then(ItemNo::new);
                    let target = caps[2].parse::<u32>().ok();
                    if let (Some(item_no), Some(target_page)) = (item, target) {
                        if target_page >= 1 && target_page <= total_pages {
                            out.push(DetectionCandidate {
                                item_no,
                                page: target_page,
                                confidence: TOC_CONFIDENCE,
                                pass: DetectionPass::Toc,
                            });
                        }
                    }
                }
            }
        }
    }
    out
}

/// Pass 3: canonical-title patterns on pages no earlier pass claimed.
pub fn text_scan_pass(
    layout: &LayoutRecord,
    claimed_pages: &BTreeSet<u32>,
) -> Vec<DetectionCandidate> {
    let mut out = Vec::new();
    for page in &layout.pages {
        let page_no = page.page_idx + 1;
        if claimed_pages.contains(&page_no) {
            continue;
        }
        for block in &page.blocks {
            for (no, pattern) in ITEM_PATTERNS.iter() {
                if pattern.is_match(&block.text) {
                    if let Some(item_no) = ItemNo::new(*no) {
                        out.push(DetectionCandidate {
                            item_no,
                            page: page_no,
                            confidence: TEXT_SCAN_CONFIDENCE,
                            pass: DetectionPass::TextScan,
                        });
                    }
                }
            }
        }
    }
    out
}

/// Pass 4: bounded Levenshtein against canonical titles, for items
/// still missing after the first three passes.
pub fn fuzzy_pass(layout: &LayoutRecord, missing: &BTreeSet<u8>) -> Vec<DetectionCandidate> {
    let mut out = Vec::new();
    for page in &layout.pages {
        let page_no = page.page_idx + 1;
        for block in &page.blocks {
            for line in block.text.lines() {
                let line = line.trim();
                if line.is_empty() || line.len() > 120 {
                    continue;
                }
                for &no in missing {
                    let title = ITEM_TITLES[no as usize];
                    // Length gate keeps the edit-distance work bounded.
                    if line.len() * 2 < title.len() || line.len() > title.len() * 2 {
                        continue;
                    }
                    let ratio = strsim::normalized_levenshtein(
                        &line.to_uppercase(),
                        &title.to_uppercase(),
                    );
                    if ratio >= FUZZY_RATIO {
                        if let Some(item_no) = ItemNo::new(no) {
                            out.push(DetectionCandidate {
                                item_no,
                                page: page_no,
                                confidence: FUZZY_CONFIDENCE,
                                pass: DetectionPass::Fuzzy,
                            });
                        }
                    }
                }
            }
        }
    }
    out
}

fn capture_item(re: &regex::Regex, text: &str) -> Option<ItemNo> {
    let caps = re.captures(text)?;
    let no: u8 = caps.get(1)?.as_str().parse().ok()?;
    // Numbered headings run 1..=23; 0 and 24 are never written as "ITEM N".
    if (1..=23).contains(&no) {
        ItemNo::new(no)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdd_document::{LayoutBlock, LayoutPage};

    fn block(kind: BlockKind, text: &str) -> LayoutBlock {
        LayoutBlock {
            kind,
            bbox: [0.0; 4],
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    fn page(idx: u32, blocks: Vec<LayoutBlock>) -> LayoutPage {
        LayoutPage {
            page_idx: idx,
            size: [612.0, 792.0],
            blocks,
        }
    }

    #[test]
    fn anchor_pass_reads_headers_only() {
        let layout = LayoutRecord {
            pages: vec![page(
                4,
                vec![
                    block(BlockKind::Header, "ITEM 5"),
                    block(BlockKind::Text, "ITEM 6"), // body text: not an anchor
                ],
            )],
        };
        let found = anchor_pass(&layout);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].item_no.as_u8(), 5);
        assert_eq!(found[0].page, 5);
        assert_eq!(found[0].confidence, 0.95);
    }

    #[test]
    fn anchor_pass_ignores_out_of_range_numbers() {
        let layout = LayoutRecord {
            pages: vec![page(0, vec![block(BlockKind::Header, "ITEM 24")])],
        };
        assert!(anchor_pass(&layout).is_empty());
    }

    #[test]
    fn toc_pass_parses_entries() {
        let layout = LayoutRecord {
            pages: vec![page(
                1,
                vec![block(
                    BlockKind::Text,
                    "TABLE OF CONTENTS\nItem 1  The Franchisor ..... 4\nItem 5  Initial Fees ..... 12",
                )],
            )],
        };
        let found = toc_pass(&layout, 100);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].item_no.as_u8(), 1);
        assert_eq!(found[0].page, 4);
        assert_eq!(found[1].item_no.as_u8(), 5);
        assert_eq!(found[1].page, 12);
    }

    #[test]
    fn toc_pass_only_searches_front_matter() {
        let layout = LayoutRecord {
            pages: vec![page(
                50,
                vec![block(BlockKind::Text, "table of contents\nItem 5 .... 12")],
            )],
        };
        // Page 51 of 100 is far outside the 10% window.
        assert!(toc_pass(&layout, 100).is_empty());
    }

    #[test]
    fn text_scan_skips_claimed_pages() {
        let layout = LayoutRecord {
            pages: vec![
                page(9, vec![block(BlockKind::Text, "INITIAL FEES")]),
                page(10, vec![block(BlockKind::Text, "OTHER FEES")]),
            ],
        };
        let claimed: BTreeSet<u32> = [10].into_iter().collect();
        let found = text_scan_pass(&layout, &claimed);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].item_no.as_u8(), 6);
        assert_eq!(found[0].page, 11);
    }

    #[test]
    fn fuzzy_pass_tolerates_ocr_noise() {
        let layout = LayoutRecord {
            pages: vec![page(
                20,
                vec![block(BlockKind::Text, "FINANCIAL STATEMENTS.")],
            )],
        };
        let missing: BTreeSet<u8> = [21].into_iter().collect();
        let found = fuzzy_pass(&layout, &missing);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].item_no.as_u8(), 21);
        assert_eq!(found[0].confidence, 0.70);
    }

    #[test]
    fn fuzzy_pass_rejects_distant_lines() {
        let layout = LayoutRecord {
            pages: vec![page(20, vec![block(BlockKind::Text, "GENERAL RELEASE")])],
        };
        let missing: BTreeSet<u8> = [21].into_iter().collect();
        assert!(fuzzy_pass(&layout, &missing).is_empty());
    }
}
