//! # Pipeline — Per-Document Stage Driver
//!
//! Owns the stage semaphores, retry policies, and shared state, and
//! drives one document at a time through segmentation, extraction
//! fan-out, validation, and storage. Registration lives in
//! [`crate::registration`]; batch orchestration in
//! [`crate::scheduler`].
//!
//! Every stage re-enters idempotently: existing sections are reused,
//! terminal sections are skipped, and document finalization is a
//! compare-and-set.

use std::sync::Arc;

use fdd_core::{
    Category, ExtractionStatus, Fdd, FddId, ItemNo, PipelineConfig, ProcessingStatus,
    ReviewReason, ReviewRecord, Section,
};
use fdd_document::{paths, LayoutAnalyzer, LayoutRecord, ObjectStore, PdfDocument};
use fdd_embed::EmbeddingProvider;
use fdd_extract::{ExtractError, ExtractionEngine, SectionContext, TokenBudget};
use fdd_segment::{DetectError, Detection, SectionDetector};
use fdd_store::{ExtractionMeta, Finalization, MetadataStore, StorageRouter};
use fdd_validate::{ValidationContext, ValidationIssue, Validator};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::keyed_mutex::KeyedMutex;
use crate::registration::PrimaryFacts;
use crate::retry::{RetryOutcome, RetryPolicy};

/// Everything the pipeline needs, wired at startup and passed in
/// explicitly. Per-provider rate budgets attach to the extraction
/// engine via [`fdd_extract::Throttle`].
pub struct PipelineDeps {
    pub config: PipelineConfig,
    pub store: Arc<dyn MetadataStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub layout: Arc<dyn LayoutAnalyzer>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub engine: Arc<ExtractionEngine>,
    pub validator: Arc<Validator>,
}

/// Per-stage concurrency gates and retry policies.
pub(crate) struct Stages {
    pub register: Semaphore,
    pub segment: Semaphore,
    pub extract: Semaphore,
    pub validate: Semaphore,
    pub store: Semaphore,
    pub register_retry: RetryPolicy,
    pub segment_retry: RetryPolicy,
    pub extract_retry: RetryPolicy,
    pub store_retry: RetryPolicy,
}

/// The stage driver.
pub struct Pipeline {
    pub(crate) deps: PipelineDeps,
    pub(crate) stages: Stages,
    pub(crate) hash_locks: KeyedMutex,
    /// In-run cache of registered primaries by content hash; lets a
    /// repeat submission mint its duplicate record without a store
    /// lookup.
    pub(crate) seen_hashes:
        parking_lot::Mutex<std::collections::HashMap<fdd_core::ContentHash, PrimaryFacts>>,
    pub(crate) cancel: CancelToken,
    detector: SectionDetector,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, cancel: CancelToken) -> Arc<Self> {
        let c = &deps.config;
        let stages = Stages {
            register: Semaphore::new(c.max_concurrency.register.max(1)),
            segment: Semaphore::new(c.max_concurrency.segment.max(1)),
            extract: Semaphore::new(c.max_concurrency.extract.max(1)),
            validate: Semaphore::new(c.max_concurrency.validate.max(1)),
            store: Semaphore::new(c.max_concurrency.store.max(1)),
            register_retry: c.retry.register.into(),
            segment_retry: c.retry.segment.into(),
            extract_retry: c.retry.extract.into(),
            store_retry: c.retry.store.into(),
        };
        let detector = SectionDetector::new(c.detector);
        Arc::new(Self {
            deps,
            stages,
            hash_locks: KeyedMutex::new(),
            seen_hashes: parking_lot::Mutex::new(std::collections::HashMap::new()),
            cancel,
            detector,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.deps.config
    }

    pub fn store(&self) -> &dyn MetadataStore {
        self.deps.store.as_ref()
    }

    pub(crate) fn check_cancel(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) async fn permit<'a>(
        &self,
        semaphore: &'a Semaphore,
    ) -> Result<SemaphorePermit<'a>, PipelineError> {
        semaphore
            .acquire()
            .await
            .map_err(|_| PipelineError::Cancelled)
    }

    /// Drive one document from its current state to a terminal state,
    /// under the per-document deadline.
    pub async fn process_document(
        self: Arc<Self>,
        fdd_id: FddId,
    ) -> Result<ProcessingStatus, PipelineError> {
        let seconds = self.deps.config.document.deadline_seconds;
        let deadline = std::time::Duration::from_secs(seconds);
        let driver = Arc::clone(&self);
        match tokio::time::timeout(deadline, driver.run_stages(fdd_id)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%fdd_id, seconds, "document deadline expired");
                self.deps
                    .store
                    .update_fdd_status(fdd_id, ProcessingStatus::Processing, ProcessingStatus::Failed)
                    .await?;
                Err(PipelineError::DeadlineExceeded { fdd_id, seconds })
            }
        }
    }

    async fn run_stages(self: Arc<Self>, fdd_id: FddId) -> Result<ProcessingStatus, PipelineError> {
        let fdd = self
            .deps
            .store
            .get_fdd(fdd_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("fdd {fdd_id}")))?;

        // Duplicates never process; terminal documents are a no-op.
        if fdd.duplicate_of.is_some() || fdd.processing_status.is_terminal() {
            return Ok(fdd.processing_status);
        }
        if fdd.processing_status == ProcessingStatus::Pending {
            self.deps
                .store
                .update_fdd_status(fdd_id, ProcessingStatus::Pending, ProcessingStatus::Processing)
                .await?;
        }
        self.check_cancel()?;

        // --- Segmentation ---------------------------------------------
        let segmented = {
            let _permit = self.permit(&self.stages.segment).await?;
            self.segment_document(&fdd).await?
        };
        let Some((sections, layout)) = segmented else {
            // Layout was fatally missing; the document is Failed.
            return Ok(ProcessingStatus::Failed);
        };
        self.check_cancel()?;

        // --- Extraction fan-out ---------------------------------------
        let pending: Vec<Section> = sections
            .iter()
            .filter(|s| !s.extraction_status.is_terminal())
            .cloned()
            .collect();
        if !pending.is_empty() {
            let budget = Arc::new(TokenBudget::new(
                self.deps.config.llm.budget.per_document_tokens,
            ));
            let layout = Arc::new(layout);
            let fdd = Arc::new(fdd.clone());
            let franchisor_name = Arc::new(
                self.deps
                    .store
                    .get_franchisor(fdd.franchisor_id)
                    .await?
                    .map(|f| f.canonical_name)
                    .unwrap_or_default(),
            );

            // Item 5 first: the Item 7 bracketing rule reads its result.
            let (first, rest): (Vec<Section>, Vec<Section>) = pending
                .into_iter()
                .partition(|s| s.item_no == ItemNo::INITIAL_FEES);
            for section in first {
                self.check_cancel()?;
                Arc::clone(&self)
                    .process_section(
                        Arc::clone(&fdd),
                        Arc::clone(&franchisor_name),
                        section,
                        Arc::clone(&layout),
                        Arc::clone(&budget),
                    )
                    .await?;
            }

            let mut tasks = tokio::task::JoinSet::new();
            for section in rest {
                let pipeline = Arc::clone(&self);
                let fdd = Arc::clone(&fdd);
                let franchisor_name = Arc::clone(&franchisor_name);
                let layout = Arc::clone(&layout);
                let budget = Arc::clone(&budget);
                tasks.spawn(async move {
                    pipeline
                        .process_section(fdd, franchisor_name, section, layout, budget)
                        .await
                });
            }
            let mut first_error = None;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => first_error = first_error.or(Some(e)),
                    Err(join) => {
                        first_error =
                            first_error.or(Some(PipelineError::NotFound(join.to_string())))
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }
        self.check_cancel()?;

        // --- Finalization ---------------------------------------------
        let router = StorageRouter::new(self.deps.store.as_ref());
        match router.finalize_document(fdd_id).await? {
            Finalization::Finalized { status, .. } => Ok(status),
            Finalization::NotYet | Finalization::AlreadyFinal => {
                let fdd = self
                    .deps
                    .store
                    .get_fdd(fdd_id)
                    .await?
                    .ok_or_else(|| PipelineError::NotFound(format!("fdd {fdd_id}")))?;
                Ok(fdd.processing_status)
            }
        }
    }

    /// Segmentation: reuse existing sections or detect, persist, and
    /// slice. Returns `None` when the layout is fatally missing (the
    /// document has been marked Failed).
    async fn segment_document(
        &self,
        fdd: &Fdd,
    ) -> Result<Option<(Vec<Section>, LayoutRecord)>, PipelineError> {
        let existing = self.deps.store.list_sections(fdd.id).await?;
        let all_terminal =
            !existing.is_empty() && existing.iter().all(|s| s.extraction_status.is_terminal());
        if all_terminal {
            // Nothing left to extract; no need to re-analyze.
            return Ok(Some((existing, LayoutRecord::default())));
        }

        let bytes = self.fetch_raw(&fdd.storage_path).await?;
        let layout = self.analyze_layout(&bytes).await?;

        if !existing.is_empty() {
            return Ok(Some((existing, layout)));
        }

        let detection = match self.detector.detect(&layout, fdd.total_pages) {
            Ok(detection) => detection,
            Err(DetectError::InsufficientAnchors { found, required }) => {
                tracing::warn!(
                    fdd_id = %fdd.id,
                    found,
                    required,
                    "detection fell back to a single full-document section"
                );
                let review = ReviewRecord::new(
                    fdd.id,
                    ReviewReason::SectionDetection,
                    format!("only {found} of 25 items detected ({required} required)"),
                );
                self.deps.store.insert_review(&review).await?;
                SectionDetector::fallback_single_section(fdd.total_pages)
            }
            Err(DetectError::LayoutMissing) => {
                tracing::error!(fdd_id = %fdd.id, "layout record missing, document failed");
                self.deps
                    .store
                    .update_fdd_status(
                        fdd.id,
                        ProcessingStatus::Processing,
                        ProcessingStatus::Failed,
                    )
                    .await?;
                return Ok(None);
            }
        };

        let sections = self.persist_sections(fdd, &detection).await?;
        self.slice_sections(fdd, &bytes, &sections).await;
        Ok(Some((sections, layout)))
    }

    async fn persist_sections(
        &self,
        fdd: &Fdd,
        detection: &Detection,
    ) -> Result<Vec<Section>, PipelineError> {
        for detected in &detection.sections {
            let mut section =
                Section::new(fdd.id, detected.item_no, detected.start_page, detected.end_page);
            section.needs_review = detected.needs_review;
            self.deps.store.upsert_section(&section).await?;
            if detected.needs_review {
                let review = ReviewRecord::new(
                    fdd.id,
                    ReviewReason::SectionDetection,
                    format!(
                        "{} boundaries interpolated at pages {}..={}",
                        detected.item_no, detected.start_page, detected.end_page
                    ),
                );
                self.deps.store.insert_review(&review).await?;
            }
        }
        // Read back so resumed runs and fresh runs see identical state.
        Ok(self.deps.store.list_sections(fdd.id).await?)
    }

    /// Best-effort slicing of per-section PDFs. Structural parse
    /// failures skip slicing; extraction still proceeds from layout
    /// text.
    async fn slice_sections(&self, fdd: &Fdd, bytes: &[u8], sections: &[Section]) {
        let doc = match PdfDocument::parse(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(fdd_id = %fdd.id, error = %e, "PDF not sliceable, skipping section files");
                return;
            }
        };
        for section in sections {
            if section.storage_path.is_some() {
                continue;
            }
            match doc.slice_pages(section.start_page, section.end_page) {
                Ok(slice) => {
                    let path = paths::section_path(fdd.id, section.item_no);
                    if let Err(e) = self.deps.objects.put(&path, &slice).await {
                        tracing::warn!(fdd_id = %fdd.id, %path, error = %e, "section PDF write failed");
                        continue;
                    }
                    if let Err(e) = self
                        .deps
                        .store
                        .set_section_storage_path(section.id, &path)
                        .await
                    {
                        tracing::warn!(fdd_id = %fdd.id, error = %e, "section path update failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        fdd_id = %fdd.id,
                        item = %section.item_no,
                        error = %e,
                        "section slice failed, skipping"
                    );
                }
            }
        }
    }

    /// One section through extraction, validation, and storage.
    async fn process_section(
        self: Arc<Self>,
        fdd: Arc<Fdd>,
        franchisor_name: Arc<String>,
        section: Section,
        layout: Arc<LayoutRecord>,
        budget: Arc<TokenBudget>,
    ) -> Result<(), PipelineError> {
        self.check_cancel()?;
        let _permit = self.permit(&self.stages.extract).await?;
        self.check_cancel()?;

        self.deps.store.mark_section_processing(section.id).await?;

        let ctx = SectionContext {
            fdd_id: fdd.id,
            item_no: section.item_no,
            franchisor_name: franchisor_name.as_str().to_string(),
            issue_year: chrono::Datelike::year(&fdd.issue_date),
            section_text: section_text(&layout, &section),
        };

        let engine = Arc::clone(&self.deps.engine);
        let outcome = self
            .stages
            .extract_retry
            .run(&self.cancel, ExtractError::is_transient, || {
                let engine = Arc::clone(&engine);
                let ctx = ctx.clone();
                let budget = Arc::clone(&budget);
                async move { engine.extract(&ctx, &budget).await }
            })
            .await;

        let router = StorageRouter::new(self.deps.store.as_ref());
        match outcome {
            Ok(extraction) => {
                let report = {
                    let _permit = self.permit(&self.stages.validate).await?;
                    let item5_fee = if section.item_no == ItemNo::INITIAL_INVESTMENT {
                        self.item5_primary_fee(fdd.id).await?
                    } else {
                        None
                    };
                    let vctx = ValidationContext {
                        section_id: section.id,
                        issue_date: fdd.issue_date,
                        amendment_date: fdd.amendment_date,
                        item5_primary_fee_cents: item5_fee,
                    };
                    self.deps.validator.validate(&extraction.item, &vctx)
                };

                let meta = ExtractionMeta {
                    model: Some(extraction.model.clone()),
                    template_version: Some(extraction.template_version),
                    attempts: extraction.attempts,
                    tokens_used: extraction.tokens_used,
                };
                let _permit = self.permit(&self.stages.store).await?;
                self.commit_with_retry(|| async {
                    router
                        .store_section(
                            section.id,
                            fdd.id,
                            extraction.item.clone(),
                            &report,
                            meta.clone(),
                        )
                        .await
                        .map(|_| ())
                })
                .await?;
            }
            Err(RetryOutcome::Cancelled) => return Err(PipelineError::Cancelled),
            Err(RetryOutcome::Fatal(e)) | Err(RetryOutcome::Exhausted(e)) => {
                let (status, issues) = match &e {
                    ExtractError::BudgetExceeded { spent, limit } => {
                        tracing::warn!(
                            fdd_id = %fdd.id,
                            item = %section.item_no,
                            spent,
                            limit,
                            "token budget exhausted, section skipped"
                        );
                        (ExtractionStatus::Skipped, Vec::new())
                    }
                    _ => {
                        let issue = ValidationIssue::error(
                            "$extraction",
                            match e {
                                ExtractError::SchemaInvalid { .. } | ExtractError::BadPayload(_) => {
                                    Category::Schema
                                }
                                _ => Category::Reference,
                            },
                            e.to_string(),
                        );
                        (ExtractionStatus::Failed, vec![issue])
                    }
                };
                let needs_review = status == ExtractionStatus::Failed;
                let _permit = self.permit(&self.stages.store).await?;
                self.commit_with_retry(|| async {
                    router
                        .store_section_failure(section.id, status, needs_review, &issues)
                        .await
                })
                .await?;
            }
        }
        Ok(())
    }

    /// The largest Item 5 fee stored for this document, for the Item 7
    /// bracketing rule.
    async fn item5_primary_fee(&self, fdd_id: FddId) -> Result<Option<i64>, PipelineError> {
        let sections = self.deps.store.list_sections(fdd_id).await?;
        let Some(item5) = sections.iter().find(|s| s.item_no == ItemNo::INITIAL_FEES) else {
            return Ok(None);
        };
        match self.deps.store.get_payload(item5.id).await? {
            Some(fdd_core::ExtractedItem::InitialFees(fees)) => {
                Ok(fees.iter().map(|f| f.amount_cents).max())
            }
            _ => Ok(None),
        }
    }

    pub(crate) async fn fetch_raw(&self, path: &str) -> Result<Vec<u8>, PipelineError> {
        let objects = Arc::clone(&self.deps.objects);
        self.stages
            .segment_retry
            .run(
                &self.cancel,
                |e: &fdd_document::StoreError| e.is_transient(),
                || {
                    let objects = Arc::clone(&objects);
                    let path = path.to_string();
                    async move { objects.get(&path).await }
                },
            )
            .await
            .map_err(flatten_retry)
    }

    async fn analyze_layout(&self, bytes: &[u8]) -> Result<LayoutRecord, PipelineError> {
        let analyzer = Arc::clone(&self.deps.layout);
        let bytes = bytes.to_vec();
        self.stages
            .segment_retry
            .run(
                &self.cancel,
                |e: &fdd_document::LayoutError| e.is_transient(),
                || {
                    let analyzer = Arc::clone(&analyzer);
                    let bytes = bytes.clone();
                    async move { analyzer.analyze(&bytes).await }
                },
            )
            .await
            .map_err(flatten_retry)
    }

    async fn commit_with_retry<Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> Result<(), PipelineError>
    where
        Fut: std::future::Future<Output = Result<(), fdd_store::MetaError>>,
    {
        self.stages
            .store_retry
            .run(&self.cancel, fdd_store::MetaError::is_transient, || op())
            .await
            .map_err(flatten_retry)
    }
}

/// Map retry outcomes onto pipeline errors.
pub(crate) fn flatten_retry<E>(outcome: RetryOutcome<E>) -> PipelineError
where
    PipelineError: From<E>,
{
    match outcome {
        RetryOutcome::Cancelled => PipelineError::Cancelled,
        RetryOutcome::Fatal(e) | RetryOutcome::Exhausted(e) => PipelineError::from(e),
    }
}

/// Concatenated layout text for a section's page range.
fn section_text(layout: &LayoutRecord, section: &Section) -> String {
    let mut text = String::new();
    for page in section.start_page..=section.end_page {
        // Layout pages are zero-indexed.
        let page_text = layout.page_text(page.saturating_sub(1));
        if !page_text.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&page_text);
        }
    }
    text
}
