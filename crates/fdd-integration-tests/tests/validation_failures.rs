//! Validation failures through the full pipeline: bad outlet math and
//! inverted FPR aggregates fail their sections, store no rows, and
//! leave a queryable structured error list.

mod common;

use common::{harness_with, raw_document, well_formed_answers};
use fdd_core::{Category, DocumentType, ExtractionStatus, ItemNo, ProcessingStatus, Severity};
use fdd_extract::{LlmRequest, ProviderError};
use fdd_pipeline::{CancelToken, Scheduler};
use fdd_store::MetadataStore;
use serde_json::{json, Value};

/// Well-formed answers except Item 20, whose outlet math is off by one.
fn bad_outlet_answers(request: &LlmRequest) -> Result<Value, ProviderError> {
    if request.prompt.contains("Item 20 section") {
        // start=100, opened=10, closed=5 → end must be 105, not 106.
        return Ok(json!({"rows": [
            {"fiscal_year": 2022, "outlet_type": "Franchised", "count_start": 100,
             "opened": 10, "closed": 5, "transferred_in": 0, "transferred_out": 0,
             "count_end": 106}
        ]}));
    }
    well_formed_answers(request)
}

/// Well-formed answers except Item 19, whose average exceeds its high.
fn bad_fpr_answers(request: &LlmRequest) -> Result<Value, ProviderError> {
    if request.prompt.contains("Item 19 section") {
        return Ok(json!({
            "disclosure_type": "historical revenue",
            "sample_size": 40,
            "time_period": "FY2023",
            "revenue": {"low_cents": 10_000_000, "average_cents": 15_000_000,
                         "high_cents": 12_000_000}
        }));
    }
    well_formed_answers(request)
}

#[tokio::test]
async fn outlet_math_failure_blocks_storage() {
    let h = harness_with(bad_outlet_answers, CancelToken::never(), |_| {});
    let scheduler = Scheduler::new(h.pipeline.clone());
    let report = scheduler
        .run_batch(vec![raw_document(
            "Acme Burgers, LLC",
            DocumentType::Initial,
            (2023, 1, 15),
        )])
        .await;
    // One failed high-value section still completes the document with
    // reduced quality.
    assert_eq!(report.completed.len(), 1);
    let fdd_id = report.completed[0];

    let sections = h.store.list_sections(fdd_id).await.unwrap();
    let item20 = sections
        .iter()
        .find(|s| s.item_no == ItemNo::OUTLETS)
        .unwrap();
    assert_eq!(item20.extraction_status, ExtractionStatus::Failed);
    assert!(item20.needs_review);

    // No Item 20 rows were stored.
    assert!(h.store.get_payload(item20.id).await.unwrap().is_none());

    // Exactly one BUSINESS_RULE error is queryable.
    let issues = h.store.list_issues(item20.id).await.unwrap();
    let errors: Vec<_> = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].category, Category::BusinessRule);
    assert_eq!(errors[0].actual, Some(106.into()));
    assert_eq!(errors[0].expected, Some(105.into()));

    // Quality reflects the lost high-value weight.
    let fdd = h.store.get_fdd(fdd_id).await.unwrap().unwrap();
    let quality = fdd.quality_score.unwrap();
    assert!(quality < 1.0 && quality > 0.5, "quality={quality}");
}

#[tokio::test]
async fn fpr_ordering_failure_is_cross_field() {
    let h = harness_with(bad_fpr_answers, CancelToken::never(), |_| {});
    let scheduler = Scheduler::new(h.pipeline.clone());
    let report = scheduler
        .run_batch(vec![raw_document(
            "Acme Burgers, LLC",
            DocumentType::Initial,
            (2023, 1, 15),
        )])
        .await;
    assert_eq!(report.completed.len(), 1);
    let fdd_id = report.completed[0];

    let sections = h.store.list_sections(fdd_id).await.unwrap();
    let item19 = sections.iter().find(|s| s.item_no == ItemNo::FPR).unwrap();
    assert_eq!(item19.extraction_status, ExtractionStatus::Failed);
    assert!(h.store.get_payload(item19.id).await.unwrap().is_none());

    let issues = h.store.list_issues(item19.id).await.unwrap();
    assert!(issues
        .iter()
        .any(|i| i.severity == Severity::Error && i.category == Category::CrossField));
}

#[tokio::test]
async fn all_high_value_failures_fail_the_document() {
    // Every high-value item returns schema-invalid garbage; the rest
    // succeed.
    let h = harness_with(
        |request: &LlmRequest| {
            let p = &request.prompt;
            let high_value = p.contains("Item 5 section")
                || p.contains("Item 6 table")
                || p.contains("Item 7 section")
                || p.contains("Item 19 section")
                || p.contains("Item 20 section")
                || p.contains("Item 21 financial statements");
            if high_value {
                Ok(json!({"garbage": true}))
            } else {
                Ok(json!({"summary": "fine"}))
            }
        },
        CancelToken::never(),
        |_| {},
    );
    let scheduler = Scheduler::new(h.pipeline.clone());
    let report = scheduler
        .run_batch(vec![raw_document(
            "Acme Burgers, LLC",
            DocumentType::Initial,
            (2023, 1, 15),
        )])
        .await;
    assert_eq!(report.completed.len(), 0);
    assert_eq!(report.failed.len(), 1);

    let fdd_id = report.failed[0].0;
    let fdd = h.store.get_fdd(fdd_id).await.unwrap().unwrap();
    assert_eq!(fdd.processing_status, ProcessingStatus::Failed);
}
