//! # Item Catalog — The 25 Logical Parts of a Disclosure Document
//!
//! An FDD is partitioned into item 0 (introduction), items 1 through 23
//! (the numbered disclosure items), and item 24 (appendix/exhibits).
//! `ItemNo` is a bounded newtype; construction outside 0..=24 is an
//! error, so page-range and routing code never sees an out-of-catalog
//! item.

use serde::{Deserialize, Serialize};

/// Canonical display titles, indexed by item number.
///
/// These are the titles mandated by the FTC franchise rule; the section
/// detector matches against them in its text-scan and fuzzy passes.
pub const ITEM_TITLES: [&str; 25] = [
    "Introduction",
    "The Franchisor and Any Parents, Predecessors, and Affiliates",
    "Business Experience",
    "Litigation",
    "Bankruptcy",
    "Initial Fees",
    "Other Fees",
    "Estimated Initial Investment",
    "Restrictions on Sources of Products and Services",
    "Franchisee's Obligations",
    "Financing",
    "Franchisor's Assistance, Advertising, Computer Systems, and Training",
    "Territory",
    "Trademarks",
    "Patents, Copyrights, and Proprietary Information",
    "Obligation to Participate in the Actual Operation of the Franchise Business",
    "Restrictions on What the Franchisee May Sell",
    "Renewal, Termination, Transfer, and Dispute Resolution",
    "Public Figures",
    "Financial Performance Representations",
    "Outlets and Franchisee Information",
    "Financial Statements",
    "Contracts",
    "Receipts",
    "Appendix",
];

/// Items with normalized storage schemas and double quality weight.
pub const HIGH_VALUE_ITEMS: [u8; 6] = [5, 6, 7, 19, 20, 21];

/// A bounded item number: 0 = intro, 1..=23 = numbered items, 24 = appendix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ItemNo(u8);

impl ItemNo {
    /// Item 0 — introductory pages before Item 1.
    pub const INTRO: ItemNo = ItemNo(0);
    /// Item 5 — initial fees.
    pub const INITIAL_FEES: ItemNo = ItemNo(5);
    /// Item 6 — other fees.
    pub const OTHER_FEES: ItemNo = ItemNo(6);
    /// Item 7 — estimated initial investment.
    pub const INITIAL_INVESTMENT: ItemNo = ItemNo(7);
    /// Item 19 — financial performance representations.
    pub const FPR: ItemNo = ItemNo(19);
    /// Item 20 — outlet tables.
    pub const OUTLETS: ItemNo = ItemNo(20);
    /// Item 21 — financial statements.
    pub const FINANCIALS: ItemNo = ItemNo(21);
    /// Item 24 — appendix and exhibits after Item 23.
    pub const APPENDIX: ItemNo = ItemNo(24);
    /// Total number of catalog items.
    pub const COUNT: usize = 25;

    /// Construct from a raw number; `None` outside 0..=24.
    pub fn new(no: u8) -> Option<Self> {
        (no <= 24).then_some(Self(no))
    }

    /// The raw item number.
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Iterate the full catalog in order.
    pub fn all() -> impl Iterator<Item = ItemNo> {
        (0..=24).map(ItemNo)
    }

    /// Canonical display title.
    pub fn title(&self) -> &'static str {
        ITEM_TITLES[self.0 as usize]
    }

    /// Whether this item has a normalized storage schema.
    pub fn is_high_value(&self) -> bool {
        HIGH_VALUE_ITEMS.contains(&self.0)
    }

    /// Weight used in the quality score: 2.0 for high-value items.
    pub fn quality_weight(&self) -> f64 {
        if self.is_high_value() {
            2.0
        } else {
            1.0
        }
    }

    /// Two-digit file stem for the segmented PDF, e.g. `section_07`.
    pub fn section_file_stem(&self) -> String {
        format!("section_{:02}", self.0)
    }
}

impl TryFrom<u8> for ItemNo {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ItemNo::new(value).ok_or_else(|| format!("item number out of range 0..=24: {value}"))
    }
}

impl From<ItemNo> for u8 {
    fn from(value: ItemNo) -> Self {
        value.0
    }
}

impl std::fmt::Display for ItemNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Item {}", self.0)
    }
}
