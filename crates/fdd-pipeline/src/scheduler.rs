//! # Scheduler — Batch Orchestration
//!
//! Feeds scraped documents through a bounded intake queue into the
//! registration pool, then drives each new filing through its stages.
//! Stage-level concurrency is bounded by the pipeline's semaphores;
//! the intake queue provides backpressure when scrapers outrun
//! registration.
//!
//! Cancellation drains cleanly: queued documents are dropped, in-flight
//! documents observe the token at their next stage boundary, and the
//! batch report counts them as cancelled. A cancelled batch is safe to
//! resume — every stage re-enters idempotently.

use std::sync::Arc;

use fdd_core::{FddId, ProcessingStatus, RawDocument};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::registration::Registered;

/// Outcome summary for one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub registered: Vec<FddId>,
    pub duplicates: Vec<FddId>,
    pub completed: Vec<FddId>,
    pub failed: Vec<(FddId, String)>,
    pub cancelled: usize,
    /// Registration-level failures (bad PDFs, store outages).
    pub rejected: Vec<String>,
}

/// Batch scheduler over a shared pipeline.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Register and process a batch of scraped documents.
    pub async fn run_batch(&self, documents: Vec<RawDocument>) -> BatchReport {
        let mut report = BatchReport::default();

        // Bounded intake: registration backpressure propagates to the
        // producer instead of buffering the whole batch.
        let queue_depth = self.pipeline.config().max_concurrency.register.max(1) * 2;
        let (tx, mut rx) = mpsc::channel::<RawDocument>(queue_depth);

        let producer = tokio::spawn(async move {
            for doc in documents {
                if tx.send(doc).await.is_err() {
                    break;
                }
            }
        });

        let mut registrations: JoinSet<Result<Registered, PipelineError>> = JoinSet::new();
        let mut processing: JoinSet<(FddId, Result<ProcessingStatus, PipelineError>)> =
            JoinSet::new();
        while let Some(raw) = rx.recv().await {
            // Keep the in-flight registration set bounded so intake
            // backpressure reaches the producer.
            while registrations.len() >= queue_depth {
                if let Some(joined) = registrations.join_next().await {
                    self.handle_registration(joined, &mut report, &mut processing);
                }
            }
            let pipeline = Arc::clone(&self.pipeline);
            registrations.spawn(async move { pipeline.register_document(&raw).await });
        }
        let _ = producer.await;
        while let Some(joined) = registrations.join_next().await {
            self.handle_registration(joined, &mut report, &mut processing);
        }

        self.collect_processing(&mut processing, &mut report).await;
        report
    }

    fn handle_registration(
        &self,
        joined: Result<Result<Registered, PipelineError>, tokio::task::JoinError>,
        report: &mut BatchReport,
        processing: &mut JoinSet<(FddId, Result<ProcessingStatus, PipelineError>)>,
    ) {
        match joined {
            Ok(Ok(Registered::New(fdd_id))) => {
                report.registered.push(fdd_id);
                let pipeline = Arc::clone(&self.pipeline);
                processing.spawn(async move { (fdd_id, pipeline.process_document(fdd_id).await) });
            }
            Ok(Ok(Registered::Duplicate { existing })) => {
                report.duplicates.push(existing);
            }
            Ok(Err(PipelineError::Cancelled)) => report.cancelled += 1,
            Ok(Err(e)) => report.rejected.push(e.to_string()),
            Err(join) => report.rejected.push(join.to_string()),
        }
    }

    /// Re-drive documents that did not reach a terminal state (after a
    /// crash or cancellation).
    pub async fn resume(&self, fdd_ids: Vec<FddId>) -> BatchReport {
        let mut report = BatchReport::default();
        let mut processing: JoinSet<(FddId, Result<ProcessingStatus, PipelineError>)> =
            JoinSet::new();
        for fdd_id in fdd_ids {
            let pipeline = Arc::clone(&self.pipeline);
            processing.spawn(async move { (fdd_id, pipeline.process_document(fdd_id).await) });
        }
        self.collect_processing(&mut processing, &mut report).await;
        report
    }

    async fn collect_processing(
        &self,
        processing: &mut JoinSet<(FddId, Result<ProcessingStatus, PipelineError>)>,
        report: &mut BatchReport,
    ) {
        while let Some(joined) = processing.join_next().await {
            match joined {
                Ok((fdd_id, Ok(ProcessingStatus::Completed))) => report.completed.push(fdd_id),
                Ok((fdd_id, Ok(status))) => {
                    // Failed, or left non-terminal by a concurrent actor.
                    if status == ProcessingStatus::Failed {
                        report.failed.push((fdd_id, "processing failed".to_string()));
                    }
                }
                Ok((_, Err(PipelineError::Cancelled))) => report.cancelled += 1,
                Ok((fdd_id, Err(e))) => {
                    if e.is_fatal_system() {
                        tracing::error!(%fdd_id, error = %e, "fatal system error, halting batch");
                        processing.abort_all();
                        report.failed.push((fdd_id, e.to_string()));
                        break;
                    }
                    report.failed.push((fdd_id, e.to_string()));
                }
                Err(join) => {
                    if join.is_cancelled() {
                        report.cancelled += 1;
                    } else {
                        tracing::error!(error = %join, "processing task panicked");
                    }
                }
            }
        }
        // Drain anything aborted by a halt.
        while let Some(joined) = processing.join_next().await {
            if matches!(&joined, Err(j) if j.is_cancelled()) {
                report.cancelled += 1;
            }
        }
    }
}
