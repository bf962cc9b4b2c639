//! # Typed Payload Routing (Postgres)
//!
//! Insert and read-back for the normalized high-value tables and the
//! JSON store. All writes here run inside the caller's transaction;
//! natural-key primary keys enforce upsert semantics and the CHECK
//! constraints re-state the hard business invariants at the storage
//! boundary.

use fdd_core::{
    Category, ExtractedItem, FinancialsRow, FprDisclosure, InitialFee, InvestmentLine,
    MetricRange, OtherFee, OutletRow, OutletType, Severity,
};
use fdd_validate::ValidationIssue;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::MetaError;

fn outlet_type_str(t: OutletType) -> &'static str {
    match t {
        OutletType::Franchised => "Franchised",
        OutletType::CompanyOwned => "CompanyOwned",
    }
}

fn parse_outlet_type(s: &str) -> Result<OutletType, MetaError> {
    match s {
        "Franchised" => Ok(OutletType::Franchised),
        "CompanyOwned" => Ok(OutletType::CompanyOwned),
        other => Err(MetaError::Serialization(format!(
            "unknown outlet type {other:?}"
        ))),
    }
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Info => "INFO",
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
    }
}

fn parse_severity(s: &str) -> Result<Severity, MetaError> {
    match s {
        "INFO" => Ok(Severity::Info),
        "WARNING" => Ok(Severity::Warning),
        "ERROR" => Ok(Severity::Error),
        other => Err(MetaError::Serialization(format!(
            "unknown severity {other:?}"
        ))),
    }
}

fn category_str(c: Category) -> &'static str {
    match c {
        Category::Schema => "SCHEMA",
        Category::BusinessRule => "BUSINESS_RULE",
        Category::CrossField => "CROSS_FIELD",
        Category::Range => "RANGE",
        Category::Format => "FORMAT",
        Category::Reference => "REFERENCE",
    }
}

fn parse_category(s: &str) -> Result<Category, MetaError> {
    match s {
        "SCHEMA" => Ok(Category::Schema),
        "BUSINESS_RULE" => Ok(Category::BusinessRule),
        "CROSS_FIELD" => Ok(Category::CrossField),
        "RANGE" => Ok(Category::Range),
        "FORMAT" => Ok(Category::Format),
        "REFERENCE" => Ok(Category::Reference),
        other => Err(MetaError::Serialization(format!(
            "unknown category {other:?}"
        ))),
    }
}

/// Remove any previously stored payload rows for a section, across all
/// routed tables.
pub async fn delete_for_section(
    conn: &mut PgConnection,
    section_id: Uuid,
) -> Result<(), MetaError> {
    for table in [
        "initial_fees",
        "other_fees",
        "investment_lines",
        "fpr_disclosures",
        "outlet_rows",
        "financials_rows",
        "item_json",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE section_id = $1"))
            .bind(section_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Route a payload to its table(s) inside the caller's transaction.
pub async fn insert_payload(
    conn: &mut PgConnection,
    section_id: Uuid,
    payload: &ExtractedItem,
) -> Result<(), MetaError> {
    match payload {
        ExtractedItem::InitialFees(fees) => {
            for fee in fees {
                sqlx::query(
                    "INSERT INTO initial_fees (section_id, name, amount_cents, refundable, conditions)
                     VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT (section_id, name) DO UPDATE SET
                       amount_cents = EXCLUDED.amount_cents,
                       refundable = EXCLUDED.refundable,
                       conditions = EXCLUDED.conditions",
                )
                .bind(section_id)
                .bind(&fee.name)
                .bind(fee.amount_cents)
                .bind(fee.refundable)
                .bind(&fee.conditions)
                .execute(&mut *conn)
                .await?;
            }
        }
        ExtractedItem::OtherFees(fees) => {
            for fee in fees {
                sqlx::query(
                    "INSERT INTO other_fees
                       (section_id, name, amount_cents, amount_percentage, frequency, basis,
                        minimum_cents, maximum_cents)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                     ON CONFLICT (section_id, name) DO UPDATE SET
                       amount_cents = EXCLUDED.amount_cents,
                       amount_percentage = EXCLUDED.amount_percentage,
                       frequency = EXCLUDED.frequency,
                       basis = EXCLUDED.basis,
                       minimum_cents = EXCLUDED.minimum_cents,
                       maximum_cents = EXCLUDED.maximum_cents",
                )
                .bind(section_id)
                .bind(&fee.name)
                .bind(fee.amount_cents)
                .bind(fee.amount_percentage)
                .bind(&fee.frequency)
                .bind(&fee.basis)
                .bind(fee.minimum_cents)
                .bind(fee.maximum_cents)
                .execute(&mut *conn)
                .await?;
            }
        }
        ExtractedItem::InitialInvestment(lines) => {
            for line in lines {
                sqlx::query(
                    "INSERT INTO investment_lines
                       (section_id, category, low_cents, high_cents, when_due, to_whom)
                     VALUES ($1, $2, $3, $4, $5, $6)
                     ON CONFLICT (section_id, category) DO UPDATE SET
                       low_cents = EXCLUDED.low_cents,
                       high_cents = EXCLUDED.high_cents,
                       when_due = EXCLUDED.when_due,
                       to_whom = EXCLUDED.to_whom",
                )
                .bind(section_id)
                .bind(&line.category)
                .bind(line.low_cents)
                .bind(line.high_cents)
                .bind(&line.when_due)
                .bind(&line.to_whom)
                .execute(&mut *conn)
                .await?;
            }
        }
        ExtractedItem::Fpr(fpr) => {
            sqlx::query(
                "INSERT INTO fpr_disclosures
                   (section_id, disclosure_type, sample_size, time_period,
                    revenue_low_cents, revenue_average_cents, revenue_median_cents,
                    revenue_high_cents, profit_low_cents, profit_average_cents,
                    profit_median_cents, profit_high_cents)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 ON CONFLICT (section_id) DO UPDATE SET
                   disclosure_type = EXCLUDED.disclosure_type,
                   sample_size = EXCLUDED.sample_size,
                   time_period = EXCLUDED.time_period,
                   revenue_low_cents = EXCLUDED.revenue_low_cents,
                   revenue_average_cents = EXCLUDED.revenue_average_cents,
                   revenue_median_cents = EXCLUDED.revenue_median_cents,
                   revenue_high_cents = EXCLUDED.revenue_high_cents,
                   profit_low_cents = EXCLUDED.profit_low_cents,
                   profit_average_cents = EXCLUDED.profit_average_cents,
                   profit_median_cents = EXCLUDED.profit_median_cents,
                   profit_high_cents = EXCLUDED.profit_high_cents",
            )
            .bind(section_id)
            .bind(&fpr.disclosure_type)
            .bind(fpr.sample_size as i32)
            .bind(&fpr.time_period)
            .bind(fpr.revenue.map(|m| m.low_cents))
            .bind(fpr.revenue.map(|m| m.average_cents))
            .bind(fpr.revenue.and_then(|m| m.median_cents))
            .bind(fpr.revenue.map(|m| m.high_cents))
            .bind(fpr.profit.map(|m| m.low_cents))
            .bind(fpr.profit.map(|m| m.average_cents))
            .bind(fpr.profit.and_then(|m| m.median_cents))
            .bind(fpr.profit.map(|m| m.high_cents))
            .execute(&mut *conn)
            .await?;
        }
        ExtractedItem::Outlets(rows) => {
            for row in rows {
                sqlx::query(
                    "INSERT INTO outlet_rows
                       (section_id, fiscal_year, outlet_type, count_start, opened, closed,
                        transferred_in, transferred_out, count_end)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                     ON CONFLICT (section_id, fiscal_year, outlet_type) DO UPDATE SET
                       count_start = EXCLUDED.count_start,
                       opened = EXCLUDED.opened,
                       closed = EXCLUDED.closed,
                       transferred_in = EXCLUDED.transferred_in,
                       transferred_out = EXCLUDED.transferred_out,
                       count_end = EXCLUDED.count_end",
                )
                .bind(section_id)
                .bind(row.fiscal_year)
                .bind(outlet_type_str(row.outlet_type))
                .bind(row.count_start)
                .bind(row.opened)
                .bind(row.closed)
                .bind(row.transferred_in)
                .bind(row.transferred_out)
                .bind(row.count_end)
                .execute(&mut *conn)
                .await?;
            }
        }
        ExtractedItem::Financials(rows) => {
            for row in rows {
                sqlx::query(
                    "INSERT INTO financials_rows
                       (section_id, fiscal_year, revenue_cents, net_income_cents,
                        total_assets_cents, total_liabilities_cents, total_equity_cents)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)
                     ON CONFLICT (section_id, fiscal_year) DO UPDATE SET
                       revenue_cents = EXCLUDED.revenue_cents,
                       net_income_cents = EXCLUDED.net_income_cents,
                       total_assets_cents = EXCLUDED.total_assets_cents,
                       total_liabilities_cents = EXCLUDED.total_liabilities_cents,
                       total_equity_cents = EXCLUDED.total_equity_cents",
                )
                .bind(section_id)
                .bind(row.fiscal_year)
                .bind(row.revenue_cents)
                .bind(row.net_income_cents)
                .bind(row.total_assets_cents)
                .bind(row.total_liabilities_cents)
                .bind(row.total_equity_cents)
                .execute(&mut *conn)
                .await?;
            }
        }
        ExtractedItem::Other {
            item_no,
            schema_version,
            payload,
        } => {
            sqlx::query(
                "INSERT INTO item_json (section_id, item_no, schema_version, payload)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (section_id) DO UPDATE SET
                   item_no = EXCLUDED.item_no,
                   schema_version = EXCLUDED.schema_version,
                   payload = EXCLUDED.payload",
            )
            .bind(section_id)
            .bind(item_no.as_u8() as i16)
            .bind(*schema_version as i32)
            .bind(payload)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Replace the stored validation issues for a section.
pub async fn replace_issues(
    conn: &mut PgConnection,
    section_id: Uuid,
    issues: &[ValidationIssue],
) -> Result<(), MetaError> {
    sqlx::query("DELETE FROM validation_issues WHERE section_id = $1")
        .bind(section_id)
        .execute(&mut *conn)
        .await?;
    for (ord, issue) in issues.iter().enumerate() {
        sqlx::query(
            "INSERT INTO validation_issues
               (section_id, ord, field_path, severity, category, actual, expected, message)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(section_id)
        .bind(ord as i32)
        .bind(&issue.field_path)
        .bind(severity_str(issue.severity))
        .bind(category_str(issue.category))
        .bind(&issue.actual)
        .bind(&issue.expected)
        .bind(&issue.message)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Read the stored validation issues for a section.
pub async fn list_issues(
    pool: &sqlx::PgPool,
    section_id: Uuid,
) -> Result<Vec<ValidationIssue>, MetaError> {
    #[derive(sqlx::FromRow)]
    struct IssueRow {
        field_path: String,
        severity: String,
        category: String,
        actual: Option<serde_json::Value>,
        expected: Option<serde_json::Value>,
        message: String,
    }

    let rows = sqlx::query_as::<_, IssueRow>(
        "SELECT field_path, severity, category, actual, expected, message
         FROM validation_issues WHERE section_id = $1 ORDER BY ord",
    )
    .bind(section_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(ValidationIssue {
                field_path: r.field_path,
                severity: parse_severity(&r.severity)?,
                category: parse_category(&r.category)?,
                actual: r.actual,
                expected: r.expected,
                message: r.message,
            })
        })
        .collect()
}

/// Reconstruct a stored payload for a section, dispatching on the
/// section's item number.
pub async fn read_payload(
    pool: &sqlx::PgPool,
    section_id: Uuid,
    item_no: u8,
) -> Result<Option<ExtractedItem>, MetaError> {
    match item_no {
        5 => {
            #[derive(sqlx::FromRow)]
            struct Row {
                name: String,
                amount_cents: i64,
                refundable: bool,
                conditions: Option<String>,
            }
            let rows = sqlx::query_as::<_, Row>(
                "SELECT name, amount_cents, refundable, conditions
                 FROM initial_fees WHERE section_id = $1 ORDER BY name",
            )
            .bind(section_id)
            .fetch_all(pool)
            .await?;
            if rows.is_empty() {
                return Ok(None);
            }
            Ok(Some(ExtractedItem::InitialFees(
                rows.into_iter()
                    .map(|r| InitialFee {
                        name: r.name,
                        amount_cents: r.amount_cents,
                        refundable: r.refundable,
                        conditions: r.conditions,
                    })
                    .collect(),
            )))
        }
        6 => {
            #[derive(sqlx::FromRow)]
            struct Row {
                name: String,
                amount_cents: Option<i64>,
                amount_percentage: Option<f64>,
                frequency: String,
                basis: String,
                minimum_cents: Option<i64>,
                maximum_cents: Option<i64>,
            }
            let rows = sqlx::query_as::<_, Row>(
                "SELECT name, amount_cents, amount_percentage, frequency, basis,
                        minimum_cents, maximum_cents
                 FROM other_fees WHERE section_id = $1 ORDER BY name",
            )
            .bind(section_id)
            .fetch_all(pool)
            .await?;
            if rows.is_empty() {
                return Ok(None);
            }
            Ok(Some(ExtractedItem::OtherFees(
                rows.into_iter()
                    .map(|r| OtherFee {
                        name: r.name,
                        amount_cents: r.amount_cents,
                        amount_percentage: r.amount_percentage,
                        frequency: r.frequency,
                        basis: r.basis,
                        minimum_cents: r.minimum_cents,
                        maximum_cents: r.maximum_cents,
                    })
                    .collect(),
            )))
        }
        7 => {
            #[derive(sqlx::FromRow)]
            struct Row {
                category: String,
                low_cents: i64,
                high_cents: i64,
                when_due: String,
                to_whom: String,
            }
            let rows = sqlx::query_as::<_, Row>(
                "SELECT category, low_cents, high_cents, when_due, to_whom
                 FROM investment_lines WHERE section_id = $1 ORDER BY category",
            )
            .bind(section_id)
            .fetch_all(pool)
            .await?;
            if rows.is_empty() {
                return Ok(None);
            }
            Ok(Some(ExtractedItem::InitialInvestment(
                rows.into_iter()
                    .map(|r| InvestmentLine {
                        category: r.category,
                        low_cents: r.low_cents,
                        high_cents: r.high_cents,
                        when_due: r.when_due,
                        to_whom: r.to_whom,
                    })
                    .collect(),
            )))
        }
        19 => {
            #[derive(sqlx::FromRow)]
            struct Row {
                disclosure_type: String,
                sample_size: i32,
                time_period: String,
                revenue_low_cents: Option<i64>,
                revenue_average_cents: Option<i64>,
                revenue_median_cents: Option<i64>,
                revenue_high_cents: Option<i64>,
                profit_low_cents: Option<i64>,
                profit_average_cents: Option<i64>,
                profit_median_cents: Option<i64>,
                profit_high_cents: Option<i64>,
            }
            let row = sqlx::query_as::<_, Row>(
                "SELECT disclosure_type, sample_size, time_period,
                        revenue_low_cents, revenue_average_cents, revenue_median_cents,
                        revenue_high_cents, profit_low_cents, profit_average_cents,
                        profit_median_cents, profit_high_cents
                 FROM fpr_disclosures WHERE section_id = $1",
            )
            .bind(section_id)
            .fetch_optional(pool)
            .await?;
            let Some(row) = row else { return Ok(None) };
            let metric = |low: Option<i64>, avg: Option<i64>, median: Option<i64>, high: Option<i64>| {
                match (low, avg, high) {
                    (Some(low_cents), Some(average_cents), Some(high_cents)) => Some(MetricRange {
                        low_cents,
                        average_cents,
                        median_cents: median,
                        high_cents,
                    }),
                    _ => None,
                }
            };
            Ok(Some(ExtractedItem::Fpr(FprDisclosure {
                disclosure_type: row.disclosure_type,
                sample_size: row.sample_size as u32,
                time_period: row.time_period,
                revenue: metric(
                    row.revenue_low_cents,
                    row.revenue_average_cents,
                    row.revenue_median_cents,
                    row.revenue_high_cents,
                ),
                profit: metric(
                    row.profit_low_cents,
                    row.profit_average_cents,
                    row.profit_median_cents,
                    row.profit_high_cents,
                ),
            })))
        }
        20 => {
            #[derive(sqlx::FromRow)]
            struct Row {
                fiscal_year: i32,
                outlet_type: String,
                count_start: i64,
                opened: i64,
                closed: i64,
                transferred_in: i64,
                transferred_out: i64,
                count_end: i64,
            }
            let rows = sqlx::query_as::<_, Row>(
                "SELECT fiscal_year, outlet_type, count_start, opened, closed,
                        transferred_in, transferred_out, count_end
                 FROM outlet_rows WHERE section_id = $1 ORDER BY fiscal_year, outlet_type",
            )
            .bind(section_id)
            .fetch_all(pool)
            .await?;
            if rows.is_empty() {
                return Ok(None);
            }
            let mut out = Vec::with_capacity(rows.len());
            for r in rows {
                out.push(OutletRow {
                    fiscal_year: r.fiscal_year,
                    outlet_type: parse_outlet_type(&r.outlet_type)?,
                    count_start: r.count_start,
                    opened: r.opened,
                    closed: r.closed,
                    transferred_in: r.transferred_in,
                    transferred_out: r.transferred_out,
                    count_end: r.count_end,
                });
            }
            Ok(Some(ExtractedItem::Outlets(out)))
        }
        21 => {
            #[derive(sqlx::FromRow)]
            struct Row {
                fiscal_year: i32,
                revenue_cents: i64,
                net_income_cents: i64,
                total_assets_cents: i64,
                total_liabilities_cents: i64,
                total_equity_cents: i64,
            }
            let rows = sqlx::query_as::<_, Row>(
                "SELECT fiscal_year, revenue_cents, net_income_cents, total_assets_cents,
                        total_liabilities_cents, total_equity_cents
                 FROM financials_rows WHERE section_id = $1 ORDER BY fiscal_year",
            )
            .bind(section_id)
            .fetch_all(pool)
            .await?;
            if rows.is_empty() {
                return Ok(None);
            }
            Ok(Some(ExtractedItem::Financials(
                rows.into_iter()
                    .map(|r| FinancialsRow {
                        fiscal_year: r.fiscal_year,
                        revenue_cents: r.revenue_cents,
                        net_income_cents: r.net_income_cents,
                        total_assets_cents: r.total_assets_cents,
                        total_liabilities_cents: r.total_liabilities_cents,
                        total_equity_cents: r.total_equity_cents,
                    })
                    .collect(),
            )))
        }
        _ => {
            #[derive(sqlx::FromRow)]
            struct Row {
                item_no: i16,
                schema_version: i32,
                payload: serde_json::Value,
            }
            let row = sqlx::query_as::<_, Row>(
                "SELECT item_no, schema_version, payload FROM item_json WHERE section_id = $1",
            )
            .bind(section_id)
            .fetch_optional(pool)
            .await?;
            let Some(row) = row else { return Ok(None) };
            let item_no = fdd_core::ItemNo::new(row.item_no as u8).ok_or_else(|| {
                MetaError::Serialization(format!("item_no {} out of range", row.item_no))
            })?;
            Ok(Some(ExtractedItem::Other {
                item_no,
                schema_version: row.schema_version as u32,
                payload: row.payload,
            }))
        }
    }
}
