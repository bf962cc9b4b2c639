//! # Business-Rule Tier
//!
//! The quantitative invariants that make stored disclosure data
//! trustworthy. Every violation here is a hard error unless the
//! severity is stated otherwise.

use chrono::{Datelike, NaiveDate, Utc};
use fdd_core::{Category, FinancialsRow, FprDisclosure, InvestmentLine, MetricRange, OutletRow};

use crate::issue::{ValidationIssue, ValidationReport};

/// Maximum tolerated balance-sheet imbalance, in cents.
pub const BALANCE_TOLERANCE_CENTS: i64 = 100;

/// Earliest plausible fiscal year in a filing.
pub const MIN_FISCAL_YEAR: i32 = 1900;

/// Item 20: `end = start + opened − closed + transferred_in − transferred_out`
/// per (fiscal year, outlet type) row.
pub fn check_outlet_math(rows: &[OutletRow], report: &mut ValidationReport) {
    for (i, row) in rows.iter().enumerate() {
        if !row.balances() {
            let expected = row.count_start + row.opened - row.closed + row.transferred_in
                - row.transferred_out;
            report.push(
                ValidationIssue::error(
                    format!("rows[{i}].count_end"),
                    Category::BusinessRule,
                    format!(
                        "outlet math mismatch for ({}, {}): end must equal start + opened − \
closed + transferred_in − transferred_out",
                        row.fiscal_year, row.outlet_type
                    ),
                )
                .with_actual(row.count_end)
                .with_expected(expected),
            );
        }
    }
}

/// Item 21: |assets − (liabilities + equity)| within tolerance.
pub fn check_balance_sheet(rows: &[FinancialsRow], report: &mut ValidationReport) {
    for (i, row) in rows.iter().enumerate() {
        let imbalance = row.imbalance_cents();
        if imbalance > BALANCE_TOLERANCE_CENTS {
            report.push(
                ValidationIssue::error(
                    format!("rows[{i}].total_assets_cents"),
                    Category::BusinessRule,
                    format!(
                        "balance sheet for fiscal year {} off by {} cents",
                        row.fiscal_year, imbalance
                    ),
                )
                .with_actual(row.total_assets_cents)
                .with_expected(row.total_liabilities_cents + row.total_equity_cents),
            );
        }
    }
}

/// Item 19: `low ≤ average ≤ high` and `low ≤ median ≤ high` for each
/// aggregated metric.
pub fn check_fpr_ordering(fpr: &FprDisclosure, report: &mut ValidationReport) {
    if let Some(revenue) = &fpr.revenue {
        check_metric_ordering("revenue", revenue, report);
    }
    if let Some(profit) = &fpr.profit {
        check_metric_ordering("profit", profit, report);
    }
}

fn check_metric_ordering(field: &str, metric: &MetricRange, report: &mut ValidationReport) {
    if !(metric.low_cents <= metric.average_cents && metric.average_cents <= metric.high_cents) {
        report.push(
            ValidationIssue::error(
                format!("{field}.average_cents"),
                Category::CrossField,
                "aggregate ordering violated: low ≤ average ≤ high must hold",
            )
            .with_actual(metric.average_cents)
            .with_expected(format!("{}..={}", metric.low_cents, metric.high_cents)),
        );
    }
    if let Some(median) = metric.median_cents {
        if !(metric.low_cents <= median && median <= metric.high_cents) {
            report.push(
                ValidationIssue::error(
                    format!("{field}.median_cents"),
                    Category::CrossField,
                    "aggregate ordering violated: low ≤ median ≤ high must hold",
                )
                .with_actual(median)
                .with_expected(format!("{}..={}", metric.low_cents, metric.high_cents)),
            );
        }
    }
}

/// Item 5/6/7 consistency: when Item 7 includes a franchise-fee line,
/// its range must bracket the Item 5 primary fee.
pub fn check_fee_bracketing(
    lines: &[InvestmentLine],
    item5_primary_fee_cents: Option<i64>,
    report: &mut ValidationReport,
) {
    let Some(primary_fee) = item5_primary_fee_cents else {
        return;
    };
    for (i, line) in lines.iter().enumerate() {
        if !line.category.to_lowercase().contains("franchise fee") {
            continue;
        }
        if primary_fee < line.low_cents || primary_fee > line.high_cents {
            report.push(
                ValidationIssue::error(
                    format!("lines[{i}]"),
                    Category::CrossField,
                    "initial-investment franchise fee range does not bracket the Item 5 fee",
                )
                .with_actual(format!("{}..={}", line.low_cents, line.high_cents))
                .with_expected(primary_fee),
            );
        }
    }
}

/// Temporal rules: amendment after issue, fiscal years plausible.
pub fn check_temporal(
    issue_date: NaiveDate,
    amendment_date: Option<NaiveDate>,
    fiscal_years: &[i32],
    report: &mut ValidationReport,
) {
    if let Some(amendment) = amendment_date {
        if amendment < issue_date {
            report.push(
                ValidationIssue::error(
                    "amendment_date",
                    Category::BusinessRule,
                    "amendment date precedes issue date",
                )
                .with_actual(amendment.to_string())
                .with_expected(format!(">= {issue_date}")),
            );
        }
    }
    let max_year = Utc::now().year() + 1;
    for &year in fiscal_years {
        if !(MIN_FISCAL_YEAR..=max_year).contains(&year) {
            report.push(
                ValidationIssue::error(
                    "fiscal_year",
                    Category::Range,
                    "fiscal year outside plausible range",
                )
                .with_actual(year)
                .with_expected(format!("{MIN_FISCAL_YEAR}..={max_year}")),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fdd_core::OutletType;

    fn outlet_row(start: i64, opened: i64, closed: i64, end: i64) -> OutletRow {
        OutletRow {
            fiscal_year: 2023,
            outlet_type: OutletType::Franchised,
            count_start: start,
            opened,
            closed,
            transferred_in: 0,
            transferred_out: 0,
            count_end: end,
        }
    }

    #[test]
    fn outlet_math_mismatch_is_hard_error() {
        // start=100, opened=10, closed=5 → end must be 105.
        let mut report = ValidationReport::new();
        check_outlet_math(&[outlet_row(100, 10, 5, 106)], &mut report);
        assert!(report.has_blocking());
        let issue = &report.issues[0];
        assert_eq!(issue.category, Category::BusinessRule);
        assert_eq!(issue.actual, Some(106.into()));
        assert_eq!(issue.expected, Some(105.into()));
    }

    #[test]
    fn balanced_outlet_rows_pass() {
        let mut report = ValidationReport::new();
        check_outlet_math(&[outlet_row(100, 10, 5, 105)], &mut report);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn signed_transfers_participate() {
        let row = OutletRow {
            transferred_in: 3,
            transferred_out: 1,
            ..outlet_row(50, 0, 0, 52)
        };
        let mut report = ValidationReport::new();
        check_outlet_math(&[row], &mut report);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn balance_sheet_tolerates_one_dollar() {
        let row = FinancialsRow {
            fiscal_year: 2023,
            revenue_cents: 0,
            net_income_cents: 0,
            total_assets_cents: 1_000_100,
            total_liabilities_cents: 600_000,
            total_equity_cents: 400_000,
        };
        let mut report = ValidationReport::new();
        check_balance_sheet(&[row], &mut report);
        assert!(report.issues.is_empty());

        let off = FinancialsRow {
            total_assets_cents: 1_000_101,
            ..row
        };
        let mut report = ValidationReport::new();
        check_balance_sheet(&[off], &mut report);
        assert!(report.has_blocking());
    }

    #[test]
    fn fpr_average_above_high_is_cross_field_error() {
        let fpr = FprDisclosure {
            disclosure_type: "historical revenue".into(),
            sample_size: 40,
            time_period: "FY2023".into(),
            revenue: Some(MetricRange {
                low_cents: 100_000,
                average_cents: 150_000,
                median_cents: None,
                high_cents: 120_000,
            }),
            profit: None,
        };
        let mut report = ValidationReport::new();
        check_fpr_ordering(&fpr, &mut report);
        assert!(report.has_blocking());
        assert_eq!(report.issues[0].category, Category::CrossField);
    }

    #[test]
    fn fpr_median_outside_range_is_error() {
        let fpr = FprDisclosure {
            disclosure_type: "historical revenue".into(),
            sample_size: 40,
            time_period: "FY2023".into(),
            revenue: Some(MetricRange {
                low_cents: 100,
                average_cents: 150,
                median_cents: Some(5_000),
                high_cents: 200,
            }),
            profit: None,
        };
        let mut report = ValidationReport::new();
        check_fpr_ordering(&fpr, &mut report);
        assert!(report.has_blocking());
    }

    #[test]
    fn fee_bracketing_flags_out_of_range_fee() {
        let lines = vec![InvestmentLine {
            category: "Initial Franchise Fee".into(),
            low_cents: 3_000_000,
            high_cents: 4_000_000,
            when_due: "at signing".into(),
            to_whom: "franchisor".into(),
        }];
        let mut report = ValidationReport::new();
        check_fee_bracketing(&lines, Some(4_500_000), &mut report);
        assert!(report.has_blocking());

        let mut report = ValidationReport::new();
        check_fee_bracketing(&lines, Some(3_500_000), &mut report);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn fee_bracketing_ignores_unrelated_lines() {
        let lines = vec![InvestmentLine {
            category: "Leasehold Improvements".into(),
            low_cents: 0,
            high_cents: 100,
            when_due: "".into(),
            to_whom: "".into(),
        }];
        let mut report = ValidationReport::new();
        check_fee_bracketing(&lines, Some(4_500_000), &mut report);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn amendment_before_issue_is_error() {
        let mut report = ValidationReport::new();
        check_temporal(
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            Some(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()),
            &[],
            &mut report,
        );
        assert!(report.has_blocking());
    }

    #[test]
    fn implausible_fiscal_years_flag() {
        let mut report = ValidationReport::new();
        check_temporal(
            NaiveDate::from_ymd_opt(2023, 6, 1).unwrap(),
            None,
            &[1899, 2023, 3000],
            &mut report,
        );
        assert_eq!(report.issues.len(), 2);
    }

    proptest::proptest! {
        /// Rows constructed to satisfy the equation never error; any
        /// nonzero perturbation of count_end always does.
        #[test]
        fn outlet_equation_is_exact(
            start in 0i64..100_000,
            opened in 0i64..10_000,
            closed in 0i64..10_000,
            t_in in 0i64..1_000,
            t_out in 0i64..1_000,
            delta in 1i64..1_000,
        ) {
            let balanced = OutletRow {
                fiscal_year: 2023,
                outlet_type: OutletType::Franchised,
                count_start: start,
                opened,
                closed,
                transferred_in: t_in,
                transferred_out: t_out,
                count_end: start + opened - closed + t_in - t_out,
            };
            let mut report = ValidationReport::new();
            check_outlet_math(&[balanced], &mut report);
            proptest::prop_assert!(report.issues.is_empty());

            let off = OutletRow {
                count_end: balanced.count_end + delta,
                ..balanced
            };
            let mut report = ValidationReport::new();
            check_outlet_math(&[off], &mut report);
            proptest::prop_assert!(report.has_blocking());
        }

        /// The balance tolerance is exactly 100 cents.
        #[test]
        fn balance_tolerance_boundary(imbalance in 0i64..10_000) {
            let row = FinancialsRow {
                fiscal_year: 2023,
                revenue_cents: 0,
                net_income_cents: 0,
                total_assets_cents: 1_000_000 + imbalance,
                total_liabilities_cents: 600_000,
                total_equity_cents: 400_000,
            };
            let mut report = ValidationReport::new();
            check_balance_sheet(&[row], &mut report);
            proptest::prop_assert_eq!(report.has_blocking(), imbalance > 100);
        }
    }
}
