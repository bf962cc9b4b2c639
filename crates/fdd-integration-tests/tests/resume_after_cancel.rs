//! Resume after cancel: cancelling mid-run writes no partial state,
//! and re-running converges to the same final state as an
//! uninterrupted run.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use common::{harness, harness_with, raw_document, well_formed_answers};
use fdd_core::{DocumentType, ExtractionStatus, ProcessingStatus};
use fdd_pipeline::{CancelToken, PipelineError, Registered};
use fdd_store::MetadataStore;

#[tokio::test]
async fn cancelled_run_resumes_to_the_same_state() {
    // The scripted provider cancels the run after a few sections have
    // gone through, then keeps answering normally.
    let (handle, token) = CancelToken::new();
    let calls = Arc::new(AtomicU32::new(0));
    let handle = Arc::new(handle);
    let h = {
        let calls = calls.clone();
        let handle = handle.clone();
        harness_with(
            move |request| {
                if calls.fetch_add(1, Ordering::SeqCst) == 5 {
                    handle.cancel();
                }
                well_formed_answers(request)
            },
            token,
            |config| {
                // Serial extraction makes the cutoff deterministic-ish.
                config.max_concurrency.extract = 1;
            },
        )
    };

    let raw = raw_document("Acme Burgers, LLC", DocumentType::Initial, (2023, 1, 15));
    let Registered::New(fdd_id) = h.pipeline.register_document(&raw).await.unwrap() else {
        panic!("must register");
    };

    let result = h.pipeline.clone().process_document(fdd_id).await;
    assert!(
        matches!(result, Err(PipelineError::Cancelled)),
        "expected cancellation, got {result:?}"
    );

    // No partial state: the document is still Processing, and every
    // section is either untouched or fully terminal.
    let fdd = h.store.get_fdd(fdd_id).await.unwrap().unwrap();
    assert_eq!(fdd.processing_status, ProcessingStatus::Processing);
    let sections = h.store.list_sections(fdd_id).await.unwrap();
    for section in &sections {
        if section.extraction_status == ExtractionStatus::Success {
            assert!(
                h.store.get_payload(section.id).await.unwrap().is_some()
                    || !section.item_no.is_high_value(),
                "successful section must have its payload stored"
            );
        }
    }

    // Resume on a fresh, uncancelled pipeline sharing the same stores.
    let resumed = harness_resume(&h);
    let status = resumed.clone().process_document(fdd_id).await.unwrap();
    assert_eq!(status, ProcessingStatus::Completed);

    // Reference: the same input through an uninterrupted pipeline.
    let reference = harness();
    let raw = raw_document("Acme Burgers, LLC", DocumentType::Initial, (2023, 1, 15));
    let Registered::New(ref_id) = reference.pipeline.register_document(&raw).await.unwrap()
    else {
        panic!("must register");
    };
    reference
        .pipeline
        .clone()
        .process_document(ref_id)
        .await
        .unwrap();

    // Same terminal shape, modulo identifiers and timestamps.
    let resumed_sections = h.store.list_sections(fdd_id).await.unwrap();
    let reference_sections = reference.store.list_sections(ref_id).await.unwrap();
    assert_eq!(resumed_sections.len(), reference_sections.len());
    for (a, b) in resumed_sections.iter().zip(reference_sections.iter()) {
        assert_eq!(a.item_no, b.item_no);
        assert_eq!(a.start_page, b.start_page);
        assert_eq!(a.end_page, b.end_page);
        assert_eq!(a.extraction_status, b.extraction_status);
        let pa = h.store.get_payload(a.id).await.unwrap();
        let pb = reference.store.get_payload(b.id).await.unwrap();
        assert_eq!(pa, pb);
    }
    let final_fdd = h.store.get_fdd(fdd_id).await.unwrap().unwrap();
    let reference_fdd = reference.store.get_fdd(ref_id).await.unwrap().unwrap();
    assert_eq!(final_fdd.quality_score, reference_fdd.quality_score);
}

/// Rebuild a pipeline over the harness's stores with a token that
/// never cancels; models a process restart.
fn harness_resume(h: &common::Harness) -> std::sync::Arc<fdd_pipeline::Pipeline> {
    use fdd_document::StaticLayoutAnalyzer;
    use fdd_embed::mock::HashEmbedder;
    use fdd_extract::{CapacityClass, ExtractionEngine, MockLlmProvider, ModelRouter};
    use fdd_pipeline::{Pipeline, PipelineDeps};
    use fdd_validate::{BypassRegistry, OutlierRegistry, Validator};

    let config = fdd_core::PipelineConfig::default();
    let local = Arc::new(MockLlmProvider::new(
        "local",
        CapacityClass::Local,
        well_formed_answers,
    ));
    let primary = Arc::new(MockLlmProvider::new(
        "primary",
        CapacityClass::HighCapacity,
        well_formed_answers,
    ));
    let router = ModelRouter::new(vec![local, primary], &config.llm).expect("router");
    let deps = PipelineDeps {
        config,
        store: h.store.clone(),
        objects: h.objects.clone(),
        layout: Arc::new(StaticLayoutAnalyzer::new(common::synthetic_layout())),
        embedder: Arc::new(HashEmbedder::new()),
        engine: Arc::new(ExtractionEngine::new(router)),
        validator: Arc::new(Validator::new(
            BypassRegistry::new(Vec::new()),
            OutlierRegistry::new(),
        )),
    };
    Pipeline::new(deps, CancelToken::never())
}
