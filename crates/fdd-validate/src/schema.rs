//! # Schema Tier — Type, Range, and Required-Field Checks
//!
//! Structural checks on the typed payloads: non-negative money, ranges
//! ordered, required strings non-empty, natural keys unique, opaque
//! payloads conformant to their versioned JSON schema.

use fdd_core::{
    Category, FinancialsRow, FprDisclosure, InitialFee, InvestmentLine, OtherFee, OutletRow,
};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::issue::{ValidationIssue, ValidationReport};

pub fn check_initial_fees(fees: &[InitialFee], report: &mut ValidationReport) {
    for (i, fee) in fees.iter().enumerate() {
        let path = format!("fees[{i}]");
        if fee.name.trim().is_empty() {
            report.push(ValidationIssue::error(
                format!("{path}.name"),
                Category::Schema,
                "fee name is required",
            ));
        }
        if fee.amount_cents < 0 {
            report.push(
                ValidationIssue::error(
                    format!("{path}.amount_cents"),
                    Category::Range,
                    "fee amount must be non-negative",
                )
                .with_actual(fee.amount_cents)
                .with_expected(">= 0"),
            );
        }
    }
}

pub fn check_other_fees(fees: &[OtherFee], report: &mut ValidationReport) {
    let mut seen_names = BTreeSet::new();
    for (i, fee) in fees.iter().enumerate() {
        let path = format!("fees[{i}]");
        match (fee.amount_cents, fee.amount_percentage) {
            (Some(_), Some(_)) => report.push(
                ValidationIssue::error(
                    path.clone(),
                    Category::CrossField,
                    "a fee carries either a fixed amount or a percentage, not both",
                )
                .with_actual(format!(
                    "amount_cents={:?}, amount_percentage={:?}",
                    fee.amount_cents, fee.amount_percentage
                )),
            ),
            (None, None) => report.push(ValidationIssue::error(
                path.clone(),
                Category::Schema,
                "a fee requires a fixed amount or a percentage",
            )),
            _ => {}
        }
        if let Some(amount) = fee.amount_cents {
            if amount < 0 {
                report.push(
                    ValidationIssue::error(
                        format!("{path}.amount_cents"),
                        Category::Range,
                        "fee amount must be non-negative",
                    )
                    .with_actual(amount),
                );
            }
        }
        if let Some(pct) = fee.amount_percentage {
            if !(0.0..=100.0).contains(&pct) {
                report.push(
                    ValidationIssue::error(
                        format!("{path}.amount_percentage"),
                        Category::Range,
                        "percentage must be within 0..=100",
                    )
                    .with_actual(pct),
                );
            }
        }
        if let (Some(min), Some(max)) = (fee.minimum_cents, fee.maximum_cents) {
            if min > max {
                report.push(
                    ValidationIssue::error(
                        format!("{path}.minimum_cents"),
                        Category::CrossField,
                        "minimum exceeds maximum",
                    )
                    .with_actual(min)
                    .with_expected(format!("<= {max}")),
                );
            }
        }
        if !seen_names.insert(fee.name.trim().to_lowercase()) {
            report.push(ValidationIssue::warning(
                format!("{path}.name"),
                Category::Reference,
                format!("duplicate fee name {:?}", fee.name),
            ));
        }
    }
}

pub fn check_investment(lines: &[InvestmentLine], report: &mut ValidationReport) {
    for (i, line) in lines.iter().enumerate() {
        let path = format!("lines[{i}]");
        if line.category.trim().is_empty() {
            report.push(ValidationIssue::error(
                format!("{path}.category"),
                Category::Schema,
                "investment category is required",
            ));
        }
        if line.low_cents < 0 || line.high_cents < 0 {
            report.push(
                ValidationIssue::error(
                    path.clone(),
                    Category::Range,
                    "investment estimates must be non-negative",
                )
                .with_actual(format!("low={}, high={}", line.low_cents, line.high_cents)),
            );
        }
        if line.low_cents > line.high_cents {
            report.push(
                ValidationIssue::error(
                    format!("{path}.low_cents"),
                    Category::CrossField,
                    "low estimate exceeds high estimate",
                )
                .with_actual(line.low_cents)
                .with_expected(format!("<= {}", line.high_cents)),
            );
        }
    }
}

pub fn check_fpr_shape(fpr: &FprDisclosure, report: &mut ValidationReport) {
    if fpr.disclosure_type.trim().is_empty() {
        report.push(ValidationIssue::error(
            "disclosure_type",
            Category::Schema,
            "disclosure type is required",
        ));
    }
    if fpr.sample_size == 0 {
        report.push(ValidationIssue::warning(
            "sample_size",
            Category::Range,
            "financial performance representation with zero-outlet sample",
        ));
    }
    if fpr.revenue.is_none() && fpr.profit.is_none() {
        report.push(ValidationIssue::warning(
            "revenue",
            Category::Schema,
            "representation carries neither revenue nor profit metrics",
        ));
    }
}

pub fn check_outlet_shape(rows: &[OutletRow], report: &mut ValidationReport) {
    let mut seen = BTreeSet::new();
    for (i, row) in rows.iter().enumerate() {
        let path = format!("rows[{i}]");
        for (field, value) in [
            ("count_start", row.count_start),
            ("opened", row.opened),
            ("closed", row.closed),
            ("transferred_in", row.transferred_in),
            ("transferred_out", row.transferred_out),
            ("count_end", row.count_end),
        ] {
            if value < 0 {
                report.push(
                    ValidationIssue::error(
                        format!("{path}.{field}"),
                        Category::Range,
                        "outlet counts must be non-negative",
                    )
                    .with_actual(value),
                );
            }
        }
        if !seen.insert((row.fiscal_year, row.outlet_type)) {
            report.push(ValidationIssue::error(
                path,
                Category::Reference,
                format!(
                    "duplicate outlet row for ({}, {})",
                    row.fiscal_year, row.outlet_type
                ),
            ));
        }
    }
}

pub fn check_financials_shape(rows: &[FinancialsRow], report: &mut ValidationReport) {
    let mut seen = BTreeSet::new();
    for (i, row) in rows.iter().enumerate() {
        if !seen.insert(row.fiscal_year) {
            report.push(ValidationIssue::error(
                format!("rows[{i}]"),
                Category::Reference,
                format!("duplicate financials row for fiscal year {}", row.fiscal_year),
            ));
        }
    }
}

/// Opaque payloads: validate against the versioned JSON schema used at
/// extraction time.
pub fn check_opaque(payload: &Value, schema: &Value, report: &mut ValidationReport) {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            report.push(ValidationIssue::error(
                "$schema",
                Category::Schema,
                format!("payload schema did not compile: {e}"),
            ));
            return;
        }
    };
    for error in validator.iter_errors(payload) {
        report.push(ValidationIssue::error(
            error.instance_path.to_string(),
            Category::Schema,
            error.to_string(),
        ));
    }
}
