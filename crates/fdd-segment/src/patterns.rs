//! # Title Pattern Library
//!
//! Per-item regex patterns covering the common renderings of the 25
//! catalog titles, plus the anchor and table-of-contents line shapes.
//! All patterns are compiled once.

use once_cell::sync::Lazy;
use regex::Regex;

/// `ITEM N` heading at the start of a title/header block.
pub static ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*item\s+(\d{1,2})\b").expect("anchor regex"));

/// A table-of-contents entry: `Item N … P` with a trailing page number.
pub static TOC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*item\s+(\d{1,2})\b\D*?(\d{1,4})\s*$").expect("toc line regex")
});

/// Literal marker for the table-of-contents region.
pub const TOC_MARKER: &str = "table of contents";

/// Body-text title patterns per item. Multiple alternates reflect the
/// phrasing drift across filing years.
static ITEM_PATTERN_SOURCES: [(u8, &str); 24] = [
    (1, r"(?im)^\s*the\s+franchisor\b.*(parents|predecessors|affiliates)"),
    (2, r"(?im)^\s*business\s+experience\s*$"),
    (3, r"(?im)^\s*litigation\s*$"),
    (4, r"(?im)^\s*bankruptcy\s*$"),
    (5, r"(?im)^\s*initial\s+(franchise\s+)?fees?\s*$"),
    (6, r"(?im)^\s*other\s+fees\s*$"),
    (7, r"(?im)^\s*estimated\s+initial\s+investment\s*$"),
    (8, r"(?im)^\s*restrictions?\s+on\s+sources\s+of\s+products\s+and\s+services"),
    (9, r"(?im)^\s*franchisee'?s?\s+obligations\s*$"),
    (10, r"(?im)^\s*financing\s*$"),
    (11, r"(?im)^\s*franchisor'?s?\s+assistance,?\s+advertising"),
    (12, r"(?im)^\s*territory\s*$"),
    (13, r"(?im)^\s*trademarks\s*$"),
    (14, r"(?im)^\s*patents,?\s+copyrights,?\s+and\s+proprietary\s+information"),
    (15, r"(?im)^\s*obligation\s+to\s+participate\s+in\s+the\s+actual\s+operation"),
    (16, r"(?im)^\s*restrictions?\s+on\s+what\s+the\s+franchisee\s+may\s+sell"),
    (17, r"(?im)^\s*renewal,?\s+termination,?\s+transfer,?\s+and\s+dispute\s+resolution"),
    (18, r"(?im)^\s*public\s+figures\s*$"),
    (19, r"(?im)^\s*financial\s+performance\s+representations?\s*$"),
    (20, r"(?im)^\s*outlets?\s+and\s+franchisee\s+information\s*$"),
    (21, r"(?im)^\s*financial\s+statements\s*$"),
    (22, r"(?im)^\s*contracts\s*$"),
    (23, r"(?im)^\s*receipts?\s*$"),
    (24, r"(?im)^\s*(appendix|exhibits?)\b"),
];

/// Compiled (item number, pattern) pairs for the text-scan pass.
pub static ITEM_PATTERNS: Lazy<Vec<(u8, Regex)>> = Lazy::new(|| {
    ITEM_PATTERN_SOURCES
        .iter()
        .map(|(no, src)| (*no, Regex::new(src).expect("item pattern")))
        .collect()
});
