//! End-to-end extraction pipeline: segment a document, extract each page
//! group concurrently, score the results, and assemble a report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, Semaphore};
use tracing::{info, warn};

use invrec_providers::{DraftExtraction, Orchestrator, OrchestratorError};

use crate::error::{InvrecError, Result};
use crate::models::config::InvrecConfig;
use crate::models::document::{PageGroup, UploadedDocument};
use crate::models::invoice::ParsedInvoice;
use crate::models::training::TrainingExample;
use crate::score::score_draft;
use crate::segment::segment;

/// Pipeline stage, reported through the progress callback in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Uploading,
    Segmenting,
    Extracting,
    Scoring,
    Complete,
    Error,
}

/// Cooperative cancellation handle. Cloneable; cancelling any clone cancels
/// the job. In-flight provider calls are abandoned (their futures dropped)
/// and partial results are discarded, never persisted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelInner>);

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is cancelled. Registration happens before the
    /// flag re-check, so a cancel racing this call is never missed.
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// A page group that produced no invoice, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionFailure {
    /// 1-indexed pages of the failed group.
    pub pages: Vec<u32>,

    /// Human-readable failure reason.
    pub reason: String,
}

/// Advisory quality numbers for one extraction run, each in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// `parsing_success * extraction_quality`.
    pub overall_accuracy: f32,

    /// Mean aggregate confidence across extracted invoices.
    pub extraction_quality: f32,

    /// Fraction of page groups that produced an invoice.
    pub parsing_success: f32,
}

/// Outcome of one pipeline run over a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Document the run processed.
    pub document_id: uuid::Uuid,

    /// Extracted invoices, in page group order.
    pub invoices: Vec<ParsedInvoice>,

    /// Page groups that produced no invoice.
    pub failures: Vec<ExtractionFailure>,

    /// Sum of extracted invoice totals.
    pub total_amount: Decimal,

    /// One-line human-readable summary.
    pub summary: String,

    /// Run quality metrics.
    pub metrics: QualityMetrics,

    /// Non-fatal warnings, e.g. from segmentation.
    pub warnings: Vec<String>,
}

/// Progress callback invoked on each stage transition.
pub type ProgressCallback = Box<dyn Fn(Stage) + Send + Sync>;

enum GroupOutcome {
    Extracted(DraftExtraction),
    Failed(OrchestratorError),
    Cancelled,
}

/// Runs the segment/extract/score pipeline for one uploaded document.
pub struct ExtractionPipeline {
    orchestrator: Orchestrator,
    config: InvrecConfig,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
}

impl ExtractionPipeline {
    pub fn new(orchestrator: Orchestrator, config: InvrecConfig) -> Self {
        Self {
            orchestrator,
            config,
            progress: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Register a progress callback for stage transitions.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Handle callers can use to cancel the running job.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    fn emit(&self, stage: Stage) {
        info!(?stage, "Pipeline stage");
        if let Some(progress) = &self.progress {
            progress(stage);
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.emit(Stage::Error);
            return Err(InvrecError::Cancelled);
        }
        Ok(())
    }

    /// Run the pipeline over a document's per-page text.
    ///
    /// Page groups are extracted concurrently under the configured limit, but
    /// the report lists invoices in page group order regardless of which
    /// extraction finished first. Groups whose providers are all exhausted
    /// become failure entries rather than aborting the run.
    pub async fn run(
        &self,
        document: &UploadedDocument,
        pages: &[String],
        examples: &[TrainingExample],
    ) -> Result<ExtractionReport> {
        self.emit(Stage::Uploading);
        self.checkpoint()?;

        self.emit(Stage::Segmenting);
        let segmentation = segment(pages, &self.config.segmenter)?;
        let mut warnings = segmentation.warnings;
        self.checkpoint()?;

        self.emit(Stage::Extracting);
        let outcomes = self.extract_groups(&segmentation.groups).await;
        self.checkpoint()?;

        self.emit(Stage::Scoring);
        let mut invoices = Vec::new();
        let mut failures = Vec::new();
        for (group, outcome) in segmentation.groups.iter().zip(outcomes) {
            match outcome {
                GroupOutcome::Extracted(draft) => {
                    let invoice =
                        score_draft(&draft, document, group, examples, &self.config.scoring);
                    invoices.push(invoice);
                }
                GroupOutcome::Failed(OrchestratorError::NoProviders) => {
                    self.emit(Stage::Error);
                    return Err(OrchestratorError::NoProviders.into());
                }
                GroupOutcome::Failed(err) => {
                    warn!(pages = ?group.pages, error = %err, "Page group failed");
                    failures.push(ExtractionFailure {
                        pages: group.pages.clone(),
                        reason: err.to_string(),
                    });
                }
                GroupOutcome::Cancelled => {
                    self.emit(Stage::Error);
                    return Err(InvrecError::Cancelled);
                }
            }
        }
        self.checkpoint()?;

        let total_amount: Decimal = invoices.iter().map(|i| i.total_amount).sum();
        let group_count = segmentation.groups.len();
        let parsing_success = if group_count == 0 {
            0.0
        } else {
            invoices.len() as f32 / group_count as f32
        };
        let extraction_quality = if invoices.is_empty() {
            0.0
        } else {
            invoices.iter().map(|i| i.confidence).sum::<f32>() / invoices.len() as f32
        };
        let metrics = QualityMetrics {
            overall_accuracy: parsing_success * extraction_quality,
            extraction_quality,
            parsing_success,
        };

        let summary = format!(
            "{} invoice(s) from {} page group(s), {} failed, total {}",
            invoices.len(),
            group_count,
            failures.len(),
            total_amount
        );
        if !failures.is_empty() {
            warnings.push(format!(
                "{} page group(s) require manual entry",
                failures.len()
            ));
        }

        self.emit(Stage::Complete);
        Ok(ExtractionReport {
            document_id: document.id,
            invoices,
            failures,
            total_amount,
            summary,
            metrics,
            warnings,
        })
    }

    async fn extract_groups(&self, groups: &[PageGroup]) -> Vec<GroupOutcome> {
        let limit = self.config.extraction.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));

        let futures = groups.iter().map(|group| {
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return GroupOutcome::Cancelled,
                };
                if cancel.is_cancelled() {
                    return GroupOutcome::Cancelled;
                }
                // Racing against the flag abandons the in-flight provider
                // call on cancel instead of letting it run to completion.
                tokio::select! {
                    _ = cancel.cancelled() => GroupOutcome::Cancelled,
                    result = self.orchestrator.extract_invoice(&group.text) => match result {
                        Ok(draft) => GroupOutcome::Extracted(draft),
                        Err(err) => GroupOutcome::Failed(err),
                    },
                }
            }
        });

        // join_all preserves input order, so results line up with groups.
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use invrec_providers::{
        ExtractionOptions, ExtractionProvider, ProviderError, ProviderKind, ProviderResponse,
        RawExtraction,
    };

    use super::*;
    use crate::models::document::UploadChannel;

    /// Extracts the invoice number from a "#XYZ" token in the text, so each
    /// page group gets a distinguishable result.
    struct EchoProvider {
        delay_ms: u64,
    }

    #[async_trait]
    impl ExtractionProvider for EchoProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Ollama
        }

        async fn extract(
            &self,
            text: &str,
            _options: &ExtractionOptions,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            let number = text
                .split_whitespace()
                .find_map(|t| t.strip_prefix('#'))
                .unwrap_or("UNKNOWN")
                .to_string();
            Ok(ProviderResponse {
                fields: RawExtraction {
                    invoice_number: Some(number),
                    vendor_name: Some("Acme Supply".to_string()),
                    invoice_date: None,
                    subtotal: None,
                    tax_amount: None,
                    total_amount: Some("1200".parse().unwrap()),
                    line_items: vec![],
                    field_confidence: HashMap::new(),
                },
                confidence: Some(0.9),
                raw: "{}".to_string(),
            })
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ExtractionProvider for FailingProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        async fn extract(
            &self,
            _text: &str,
            _options: &ExtractionOptions,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Permanent("invalid api key".to_string()))
        }
    }

    fn document() -> UploadedDocument {
        UploadedDocument::new("batch.pdf".to_string(), 8192, UploadChannel::Dashboard)
    }

    fn pipeline(providers: Vec<Box<dyn ExtractionProvider>>) -> ExtractionPipeline {
        let orchestrator = Orchestrator::new(providers, Default::default());
        ExtractionPipeline::new(orchestrator, InvrecConfig::default())
    }

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn invoices_come_back_in_page_group_order() {
        // The first group sleeps so the second finishes first; the report
        // must still list A100 before B200.
        let pipe = pipeline(vec![Box::new(EchoProvider { delay_ms: 30 })]);
        let input = pages(&["Invoice #A100 details", "Invoice #B200 details"]);

        let report = pipe.run(&document(), &input, &[]).await.unwrap();

        assert_eq!(report.invoices.len(), 2);
        assert_eq!(report.invoices[0].invoice_number, "A100");
        assert_eq!(report.invoices[1].invoice_number, "B200");
        assert_eq!(report.invoices[0].page_group.pages, vec![1]);
        assert_eq!(report.total_amount, "2400".parse().unwrap());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn exhausted_group_becomes_failure_entry() {
        let pipe = pipeline(vec![Box::new(FailingProvider)]);
        let input = pages(&["Invoice #A100 details"]);

        let report = pipe.run(&document(), &input, &[]).await.unwrap();

        assert!(report.invoices.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].pages, vec![1]);
        assert!(report.failures[0].reason.contains("attempts failed"));
        assert_eq!(report.metrics.parsing_success, 0.0);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("manual entry")));
    }

    #[tokio::test]
    async fn fallback_provider_serves_all_groups() {
        // The failing primary falls through to the echo provider for both
        // groups, so the run succeeds with no failure entries.
        let pipe = pipeline(vec![
            Box::new(FailingProvider),
            Box::new(EchoProvider { delay_ms: 0 }),
        ]);
        let input = pages(&["Invoice #A100", "Invoice #B200"]);

        let report = pipe.run(&document(), &input, &[]).await.unwrap();

        assert_eq!(report.invoices.len(), 2);
        assert_eq!(report.metrics.parsing_success, 1.0);
        assert_eq!(report.invoices[0].invoice_number, "A100");
        assert_eq!(report.invoices[1].invoice_number, "B200");
    }

    #[tokio::test]
    async fn cancellation_discards_partial_results() {
        let pipe = pipeline(vec![Box::new(EchoProvider { delay_ms: 0 })]);
        let input = pages(&["Invoice #A100"]);

        pipe.cancel_flag().cancel();
        let err = pipe.run(&document(), &input, &[]).await.unwrap_err();

        assert!(matches!(err, InvrecError::Cancelled));
    }

    #[tokio::test]
    async fn cancel_mid_extraction_abandons_in_flight_calls() {
        // The provider sleeps far longer than the cancel delay; the run must
        // return as soon as the flag fires, not after the call completes.
        let pipe = pipeline(vec![Box::new(EchoProvider { delay_ms: 5_000 })]);
        let input = pages(&["Invoice #A100"]);
        let flag = pipe.cancel_flag();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.cancel();
        });

        let start = std::time::Instant::now();
        let err = pipe.run(&document(), &input, &[]).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, InvrecError::Cancelled));
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "run should stop on cancel, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn empty_document_is_fatal() {
        let pipe = pipeline(vec![Box::new(EchoProvider { delay_ms: 0 })]);
        let err = pipe.run(&document(), &[], &[]).await.unwrap_err();
        assert!(matches!(err, InvrecError::Segment(_)));
    }

    #[tokio::test]
    async fn no_providers_is_fatal() {
        let pipe = pipeline(vec![]);
        let input = pages(&["Invoice #A100"]);
        let err = pipe.run(&document(), &input, &[]).await.unwrap_err();
        assert!(matches!(err, InvrecError::Extraction(_)));
    }

    #[tokio::test]
    async fn stages_are_reported_in_order() {
        let seen: Arc<Mutex<Vec<Stage>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let pipe = pipeline(vec![Box::new(EchoProvider { delay_ms: 0 })])
            .with_progress(Box::new(move |stage| {
                sink.lock().unwrap().push(stage);
            }));
        let input = pages(&["Invoice #A100"]);

        pipe.run(&document(), &input, &[]).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Stage::Uploading,
                Stage::Segmenting,
                Stage::Extracting,
                Stage::Scoring,
                Stage::Complete,
            ]
        );
    }
}
