//! # Validator — Tag Dispatch over Extracted Payloads
//!
//! Entry point tying the schema tier, business-rule tier, bypass
//! registry, and outlier registry together. The validator dispatches on
//! the payload tag, so every item kind takes exactly the checks its
//! shape defines.

use chrono::NaiveDate;
use fdd_core::{ExtractedItem, SectionId};

use crate::bypass::BypassRegistry;
use crate::issue::ValidationReport;
use crate::outlier::OutlierRegistry;
use crate::rules;
use crate::schema;

/// Per-section inputs the cross-field rules need.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub section_id: SectionId,
    pub issue_date: NaiveDate,
    pub amendment_date: Option<NaiveDate>,
    /// The Item 5 primary (largest) fee, when already extracted; used
    /// by the Item 7 bracketing rule.
    pub item5_primary_fee_cents: Option<i64>,
}

/// The multi-tier validator.
///
/// Holds the process-wide bypass and outlier registries; constructed at
/// startup and shared by reference across workers.
pub struct Validator {
    bypasses: BypassRegistry,
    outliers: OutlierRegistry,
}

impl Validator {
    pub fn new(bypasses: BypassRegistry, outliers: OutlierRegistry) -> Self {
        Self { bypasses, outliers }
    }

    /// Access the bypass registry (operator surface).
    pub fn bypasses(&self) -> &BypassRegistry {
        &self.bypasses
    }

    /// Access the outlier registry (offline-statistics surface).
    pub fn outliers(&self) -> &OutlierRegistry {
        &self.outliers
    }

    /// Flag a monetary value against its cross-document distribution,
    /// rewriting the issue onto the payload-local field path.
    fn flag_outlier(&self, field: &str, path: String, cents: i64, report: &mut ValidationReport) {
        if let Some(mut issue) = self.outliers.check(field, cents) {
            issue.field_path = path;
            report.push(issue);
        }
    }

    /// Validate one extracted payload.
    pub fn validate(&self, item: &ExtractedItem, ctx: &ValidationContext) -> ValidationReport {
        let mut report = ValidationReport::new();

        match item {
            ExtractedItem::InitialFees(fees) => {
                schema::check_initial_fees(fees, &mut report);
                for (i, fee) in fees.iter().enumerate() {
                    self.flag_outlier(
                        "item5.amount_cents",
                        format!("fees[{i}].amount_cents"),
                        fee.amount_cents,
                        &mut report,
                    );
                }
            }
            ExtractedItem::OtherFees(fees) => {
                schema::check_other_fees(fees, &mut report);
                for (i, fee) in fees.iter().enumerate() {
                    for (field, value) in [
                        ("amount_cents", fee.amount_cents),
                        ("minimum_cents", fee.minimum_cents),
                        ("maximum_cents", fee.maximum_cents),
                    ] {
                        if let Some(cents) = value {
                            self.flag_outlier(
                                &format!("item6.{field}"),
                                format!("fees[{i}].{field}"),
                                cents,
                                &mut report,
                            );
                        }
                    }
                }
            }
            ExtractedItem::InitialInvestment(lines) => {
                schema::check_investment(lines, &mut report);
                rules::check_fee_bracketing(lines, ctx.item5_primary_fee_cents, &mut report);
                for (i, line) in lines.iter().enumerate() {
                    self.flag_outlier(
                        "item7.low_cents",
                        format!("lines[{i}].low_cents"),
                        line.low_cents,
                        &mut report,
                    );
                    self.flag_outlier(
                        "item7.high_cents",
                        format!("lines[{i}].high_cents"),
                        line.high_cents,
                        &mut report,
                    );
                }
            }
            ExtractedItem::Fpr(fpr) => {
                schema::check_fpr_shape(fpr, &mut report);
                rules::check_fpr_ordering(fpr, &mut report);
                for (metric_name, metric) in
                    [("revenue", &fpr.revenue), ("profit", &fpr.profit)]
                {
                    let Some(metric) = metric else { continue };
                    let mut figures = vec![
                        ("low_cents", metric.low_cents),
                        ("average_cents", metric.average_cents),
                        ("high_cents", metric.high_cents),
                    ];
                    if let Some(median) = metric.median_cents {
                        figures.push(("median_cents", median));
                    }
                    for (field, cents) in figures {
                        self.flag_outlier(
                            &format!("item19.{metric_name}_{field}"),
                            format!("{metric_name}.{field}"),
                            cents,
                            &mut report,
                        );
                    }
                }
            }
            ExtractedItem::Outlets(rows) => {
                schema::check_outlet_shape(rows, &mut report);
                rules::check_outlet_math(rows, &mut report);
                let years: Vec<i32> = rows.iter().map(|r| r.fiscal_year).collect();
                rules::check_temporal(ctx.issue_date, ctx.amendment_date, &years, &mut report);
            }
            ExtractedItem::Financials(rows) => {
                schema::check_financials_shape(rows, &mut report);
                rules::check_balance_sheet(rows, &mut report);
                let years: Vec<i32> = rows.iter().map(|r| r.fiscal_year).collect();
                rules::check_temporal(ctx.issue_date, ctx.amendment_date, &years, &mut report);
                for (i, row) in rows.iter().enumerate() {
                    for (field, cents) in [
                        ("revenue_cents", row.revenue_cents),
                        ("net_income_cents", row.net_income_cents),
                        ("total_assets_cents", row.total_assets_cents),
                        ("total_liabilities_cents", row.total_liabilities_cents),
                        ("total_equity_cents", row.total_equity_cents),
                    ] {
                        self.flag_outlier(
                            &format!("item21.{field}"),
                            format!("rows[{i}].{field}"),
                            cents,
                            &mut report,
                        );
                    }
                }
            }
            ExtractedItem::Other {
                schema_version,
                payload,
                ..
            } => {
                let declared = declared_schema_for(*schema_version);
                schema::check_opaque(payload, &declared, &mut report);
            }
        }

        // Amendment-vs-issue ordering applies to every section once.
        if !matches!(
            item,
            ExtractedItem::Outlets(_) | ExtractedItem::Financials(_)
        ) {
            rules::check_temporal(ctx.issue_date, ctx.amendment_date, &[], &mut report);
        }

        if report.has_blocking() && self.bypasses.is_active("section", &ctx.section_id.to_string())
        {
            tracing::info!(section_id = %ctx.section_id, "active bypass demoting errors");
            report.apply_bypass();
        }

        report
    }
}

/// The opaque-payload schema for a recorded version.
fn declared_schema_for(schema_version: u32) -> serde_json::Value {
    // Version 1 is the only released opaque schema.
    let _ = schema_version;
    serde_json::json!({
        "type": "object",
        "required": ["summary"],
        "properties": {"summary": {"type": "string"}},
        "additionalProperties": true
    })
}
