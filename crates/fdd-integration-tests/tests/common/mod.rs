//! Shared fixtures: a synthetic disclosure PDF, its layout record,
//! scripted providers, and a fully wired in-memory pipeline.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use fdd_core::{DocumentType, PipelineConfig, RawDocument};
use fdd_document::{
    BlockKind, LayoutBlock, LayoutPage, LayoutRecord, MemoryObjectStore, StaticLayoutAnalyzer,
};
use fdd_embed::mock::HashEmbedder;
use fdd_extract::{
    CapacityClass, ExtractionEngine, LlmRequest, MockLlmProvider, ModelRouter, ProviderError,
};
use fdd_pipeline::{CancelToken, Pipeline, PipelineDeps, RateLimiterSet};
use fdd_store::MemoryMetadataStore;
use fdd_validate::{BypassRegistry, OutlierRegistry, Validator};
use serde_json::{json, Value};

/// Total pages in the synthetic filing.
pub const TOTAL_PAGES: usize = 60;

/// Build a minimal classic-xref PDF with `n` single-stream pages.
pub fn synthetic_pdf(n: usize) -> Vec<u8> {
    let mut body = String::from("%PDF-1.4\n");
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + i)).collect();
    objects.push("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_string());
    objects.push(format!(
        "2 0 obj\n<< /Type /Pages /Kids [ {} ] /Count {} /MediaBox [0 0 612 792] >>\nendobj\n",
        kids.join(" "),
        n
    ));
    for i in 0..n {
        objects.push(format!(
            "{} 0 obj\n<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>\nendobj\n",
            3 + i,
            3 + n + i
        ));
    }
    for i in 0..n {
        let content = format!("BT (page {}) Tj ET", i + 1);
        objects.push(format!(
            "{} 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            3 + n + i,
            content.len(),
            content
        ));
    }
    let mut offsets = Vec::new();
    for obj in &objects {
        offsets.push(body.len());
        body.push_str(obj);
    }
    let xref_at = body.len();
    body.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    body.push_str("0000000000 65535 f \n");
    for off in offsets {
        body.push_str(&format!("{off:010} 00000 n \n"));
    }
    body.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    ));
    body.into_bytes()
}

/// A layout record with all 23 numbered headings plus an exhibit
/// marker, matching [`synthetic_pdf`]`(TOTAL_PAGES)`.
pub fn synthetic_layout() -> LayoutRecord {
    let header = |text: &str| LayoutBlock {
        kind: BlockKind::Header,
        bbox: [72.0, 720.0, 540.0, 750.0],
        text: text.to_string(),
        confidence: 0.97,
    };
    let mut pages = Vec::new();
    for item in 1..=23u32 {
        pages.push(LayoutPage {
            page_idx: item * 2,
            size: [612.0, 792.0],
            blocks: vec![
                header(&format!("ITEM {item}")),
                LayoutBlock {
                    kind: BlockKind::Text,
                    bbox: [72.0, 100.0, 540.0, 700.0],
                    text: format!("Disclosure text for item {item}."),
                    confidence: 0.9,
                },
            ],
        });
    }
    pages.push(LayoutPage {
        page_idx: 50,
        size: [612.0, 792.0],
        blocks: vec![LayoutBlock {
            kind: BlockKind::Text,
            bbox: [72.0, 700.0, 540.0, 730.0],
            text: "EXHIBIT A".to_string(),
            confidence: 0.9,
        }],
    });
    LayoutRecord { pages }
}

/// A raw scraped document around the synthetic PDF.
pub fn raw_document(franchisor: &str, doc_type: DocumentType, issue: (i32, u32, u32)) -> RawDocument {
    RawDocument {
        bytes: synthetic_pdf(TOTAL_PAGES),
        source_state: "MN".to_string(),
        source_url: "https://portal.example/mn/filing/1".to_string(),
        franchisor_name: franchisor.to_string(),
        document_type: doc_type,
        issue_date: NaiveDate::from_ymd_opt(issue.0, issue.1, issue.2).unwrap(),
        amendment_date: None,
        portal_metadata: BTreeMap::new(),
    }
}

/// Scripted answers for every item, internally consistent: the outlet
/// math balances, the balance sheet balances, the FPR orders, and the
/// Item 7 franchise-fee line brackets the Item 5 fee.
pub fn well_formed_answers(request: &LlmRequest) -> Result<Value, ProviderError> {
    let prompt = &request.prompt;
    if prompt.contains("Item 5 section") {
        Ok(json!({"fees": [
            {"name": "Initial Franchise Fee", "amount_cents": 4_500_000, "refundable": false}
        ]}))
    } else if prompt.contains("Item 6 table") {
        Ok(json!({"fees": [
            {"name": "Royalty", "amount_percentage": 6.0, "frequency": "weekly",
             "basis": "gross sales"}
        ]}))
    } else if prompt.contains("Item 7 section") {
        Ok(json!({"lines": [
            {"category": "Initial Franchise Fee", "low_cents": 4_500_000,
             "high_cents": 4_500_000, "when_due": "at signing", "to_whom": "franchisor"},
            {"category": "Leasehold Improvements", "low_cents": 10_000_000,
             "high_cents": 35_000_000, "when_due": "before opening", "to_whom": "suppliers"}
        ]}))
    } else if prompt.contains("Item 19 section") {
        Ok(json!({
            "disclosure_type": "historical revenue",
            "sample_size": 120,
            "time_period": "FY2022",
            "revenue": {"low_cents": 40_000_000, "average_cents": 95_000_000,
                         "median_cents": 90_000_000, "high_cents": 210_000_000}
        }))
    } else if prompt.contains("Item 20 section") {
        Ok(json!({"rows": [
            {"fiscal_year": 2022, "outlet_type": "Franchised", "count_start": 100,
             "opened": 10, "closed": 5, "transferred_in": 2, "transferred_out": 2,
             "count_end": 105},
            {"fiscal_year": 2022, "outlet_type": "CompanyOwned", "count_start": 8,
             "opened": 1, "closed": 0, "transferred_in": 0, "transferred_out": 0,
             "count_end": 9}
        ]}))
    } else if prompt.contains("Item 21 financial statements") {
        Ok(json!({"rows": [
            {"fiscal_year": 2022, "revenue_cents": 550_000_000,
             "net_income_cents": 42_000_000, "total_assets_cents": 300_000_000,
             "total_liabilities_cents": 120_000_000, "total_equity_cents": 180_000_000}
        ]}))
    } else {
        Ok(json!({"summary": "disclosed as required"}))
    }
}

/// A fully wired in-memory pipeline plus handles the tests assert on.
pub struct Harness {
    pub pipeline: Arc<Pipeline>,
    pub store: Arc<MemoryMetadataStore>,
    pub objects: Arc<MemoryObjectStore>,
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a harness with scripted providers and an optional config
/// mutation.
pub fn harness_with(
    handler: impl Fn(&LlmRequest) -> Result<Value, ProviderError> + Send + Sync + Clone + 'static,
    cancel: CancelToken,
    mutate: impl FnOnce(&mut PipelineConfig),
) -> Harness {
    init_tracing();
    let mut config = PipelineConfig::default();
    // Test-speed retry delays.
    config.retry.register.base_delay_ms = 1;
    config.retry.segment.base_delay_ms = 1;
    config.retry.extract.base_delay_ms = 1;
    config.retry.store.base_delay_ms = 1;
    mutate(&mut config);

    let store = Arc::new(MemoryMetadataStore::new());
    let objects = Arc::new(MemoryObjectStore::new());

    let local = Arc::new(MockLlmProvider::new(
        "local",
        CapacityClass::Local,
        handler.clone(),
    ));
    let primary = Arc::new(MockLlmProvider::new(
        "primary",
        CapacityClass::HighCapacity,
        handler,
    ));
    let router = ModelRouter::new(vec![local, primary], &config.llm).expect("router");
    let engine = Arc::new(ExtractionEngine::with_throttle(
        router,
        Arc::new(RateLimiterSet::new()),
    ));

    let validator = Arc::new(Validator::new(
        BypassRegistry::new(config.validation.bypass_reasons.clone()),
        OutlierRegistry::new(),
    ));

    let deps = PipelineDeps {
        config,
        store: store.clone(),
        objects: objects.clone(),
        layout: Arc::new(StaticLayoutAnalyzer::new(synthetic_layout())),
        embedder: Arc::new(HashEmbedder::new()),
        engine,
        validator,
    };
    let pipeline = Pipeline::new(deps, cancel);
    Harness {
        pipeline,
        store,
        objects,
    }
}

/// Default harness: well-formed answers, never cancelled.
pub fn harness() -> Harness {
    harness_with(well_formed_answers, CancelToken::never(), |_| {})
}
