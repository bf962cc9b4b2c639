//! Token-budget exhaustion: once the per-document budget is spent,
//! remaining sections are Skipped (not Failed), and the document
//! completes when anything succeeded.

mod common;

use common::{harness_with, raw_document, well_formed_answers};
use fdd_core::{DocumentType, ExtractionStatus, ProcessingStatus};
use fdd_pipeline::{CancelToken, Scheduler};
use fdd_store::MetadataStore;

#[tokio::test]
async fn exhausted_budget_skips_remaining_sections() {
    // Enough budget for roughly one call: the Item 5 section runs
    // first and lands it; the fan-out then sees an exhausted budget.
    let h = harness_with(well_formed_answers, CancelToken::never(), |config| {
        config.llm.budget.per_document_tokens = 1;
        config.max_concurrency.extract = 1;
    });
    let scheduler = Scheduler::new(h.pipeline.clone());
    let report = scheduler
        .run_batch(vec![raw_document(
            "Acme Burgers, LLC",
            DocumentType::Initial,
            (2023, 1, 15),
        )])
        .await;
    assert_eq!(report.completed.len(), 1, "failed: {:?}", report.failed);
    let fdd_id = report.completed[0];

    let sections = h.store.list_sections(fdd_id).await.unwrap();
    let succeeded = sections
        .iter()
        .filter(|s| s.extraction_status == ExtractionStatus::Success)
        .count();
    let skipped = sections
        .iter()
        .filter(|s| s.extraction_status == ExtractionStatus::Skipped)
        .count();
    assert_eq!(succeeded, 1, "only the first section fits the budget");
    assert_eq!(skipped, sections.len() - 1);

    // Skipped sections carry no payload and no error list.
    let skipped_section = sections
        .iter()
        .find(|s| s.extraction_status == ExtractionStatus::Skipped)
        .unwrap();
    assert!(h
        .store
        .get_payload(skipped_section.id)
        .await
        .unwrap()
        .is_none());
    assert!(h.store.list_issues(skipped_section.id).await.unwrap().is_empty());

    let fdd = h.store.get_fdd(fdd_id).await.unwrap().unwrap();
    assert_eq!(fdd.processing_status, ProcessingStatus::Completed);
    let quality = fdd.quality_score.unwrap();
    assert!(quality > 0.0 && quality < 0.5, "quality={quality}");
}

#[tokio::test]
async fn zero_budget_fails_the_document() {
    let h = harness_with(well_formed_answers, CancelToken::never(), |config| {
        config.llm.budget.per_document_tokens = 0;
    });
    let scheduler = Scheduler::new(h.pipeline.clone());
    let report = scheduler
        .run_batch(vec![raw_document(
            "Acme Burgers, LLC",
            DocumentType::Initial,
            (2023, 1, 15),
        )])
        .await;
    // Nothing succeeded, so the document fails.
    assert_eq!(report.completed.len(), 0);
    assert_eq!(report.failed.len(), 1);

    let fdd_id = report.failed[0].0;
    let sections = h.store.list_sections(fdd_id).await.unwrap();
    assert!(sections
        .iter()
        .all(|s| s.extraction_status == ExtractionStatus::Skipped));
    let fdd = h.store.get_fdd(fdd_id).await.unwrap().unwrap();
    assert_eq!(fdd.processing_status, ProcessingStatus::Failed);
}
