// SPDX-License-Identifier: BUSL-1.1
//! # Extracted Payloads — Tagged Variants by Item Number
//!
//! The six high-value items carry normalized shapes; everything else is
//! an opaque JSON payload with a recorded schema version so consumers
//! can migrate.
//!
//! Monetary fields are `i64` cents. The shapes here are deliberately
//! permissive — the validator, not the type system, enforces the
//! cross-field rules (amount XOR percentage, low <= high, outlet math)
//! so that a structurally parseable but incorrect extraction can be
//! reported with a field-level error list instead of a parse failure.

use serde::{Deserialize, Serialize};

use crate::item::ItemNo;

/// One initial-fee line from Item 5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialFee {
    pub name: String,
    pub amount_cents: i64,
    pub refundable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}

/// One recurring-fee line from Item 6.
///
/// Exactly one of `amount_cents` / `amount_percentage` must be present;
/// the validator enforces the exclusivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherFee {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_percentage: Option<f64>,
    pub frequency: String,
    /// What the fee is computed against (e.g. "gross sales").
    pub basis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_cents: Option<i64>,
}

/// One initial-investment line from Item 7.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentLine {
    pub category: String,
    pub low_cents: i64,
    pub high_cents: i64,
    pub when_due: String,
    pub to_whom: String,
}

/// An aggregated metric range within a financial performance representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub low_cents: i64,
    pub average_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_cents: Option<i64>,
    pub high_cents: i64,
}

/// Item 19 — financial performance representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FprDisclosure {
    /// Kind of representation made (e.g. "historical revenue").
    pub disclosure_type: String,
    pub sample_size: u32,
    /// Covered time period as disclosed (e.g. "FY2023").
    pub time_period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<MetricRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<MetricRange>,
}

/// Outlet ownership classes tracked in Item 20 tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OutletType {
    Franchised,
    CompanyOwned,
}

impl std::fmt::Display for OutletType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Franchised => "Franchised",
            Self::CompanyOwned => "CompanyOwned",
        };
        f.write_str(s)
    }
}

/// One (fiscal year, outlet type) row from Item 20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutletRow {
    pub fiscal_year: i32,
    pub outlet_type: OutletType,
    pub count_start: i64,
    pub opened: i64,
    pub closed: i64,
    pub transferred_in: i64,
    pub transferred_out: i64,
    pub count_end: i64,
}

impl OutletRow {
    /// The signed-transfer outlet equation.
    pub fn balances(&self) -> bool {
        self.count_end
            == self.count_start + self.opened - self.closed + self.transferred_in
                - self.transferred_out
    }
}

/// One fiscal-year row from the Item 21 financial statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialsRow {
    pub fiscal_year: i32,
    pub revenue_cents: i64,
    pub net_income_cents: i64,
    pub total_assets_cents: i64,
    pub total_liabilities_cents: i64,
    pub total_equity_cents: i64,
}

impl FinancialsRow {
    /// Absolute balance-sheet imbalance in cents.
    pub fn imbalance_cents(&self) -> i64 {
        (self.total_assets_cents - (self.total_liabilities_cents + self.total_equity_cents)).abs()
    }
}

/// A typed extraction result, discriminated by item number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum ExtractedItem {
    InitialFees(Vec<InitialFee>),
    OtherFees(Vec<OtherFee>),
    InitialInvestment(Vec<InvestmentLine>),
    Fpr(FprDisclosure),
    Outlets(Vec<OutletRow>),
    Financials(Vec<FinancialsRow>),
    /// All remaining items: opaque validated JSON plus schema version.
    Other {
        item_no: ItemNo,
        schema_version: u32,
        payload: serde_json::Value,
    },
}

impl ExtractedItem {
    /// The catalog item this payload belongs to.
    pub fn item_no(&self) -> ItemNo {
        match self {
            Self::InitialFees(_) => ItemNo::INITIAL_FEES,
            Self::OtherFees(_) => ItemNo::OTHER_FEES,
            Self::InitialInvestment(_) => ItemNo::INITIAL_INVESTMENT,
            Self::Fpr(_) => ItemNo::FPR,
            Self::Outlets(_) => ItemNo::OUTLETS,
            Self::Financials(_) => ItemNo::FINANCIALS,
            Self::Other { item_no, .. } => *item_no,
        }
    }
}
