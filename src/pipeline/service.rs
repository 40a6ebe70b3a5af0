//! Pipeline service sequencing upload storage, extraction, prompting, and summarization.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    extraction::{ExtractionError, ExtractionResult, TextExtractor},
    metrics::{MetricsSnapshot, PipelineMetrics},
    pipeline::types::{PipelineError, PipelineStage, SummaryOutcome},
    prompt::{SummaryRequest, build_prompt},
    summarization::{SummarizationClient, SummarizationRequest},
    upload::{IncomingDocument, UploadError, UploadReceiver},
};

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait SummaryApi: Send + Sync {
    /// Run one upload through the full pipeline.
    ///
    /// `upload` is `None` when the request carried no document.
    async fn summarize_upload(
        &self,
        upload: Option<IncomingDocument>,
        request: SummaryRequest,
    ) -> Result<SummaryOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates a single document from upload to summary.
///
/// Collaborators are injected at construction so the HTTP surface and tests share the same
/// sequencing logic. Build it once at startup and share it through an `Arc`; runs do not share
/// any state beyond the upload directory and the metrics counters.
pub struct SummaryPipeline {
    uploads: UploadReceiver,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn SummarizationClient>,
    model: String,
    metrics: Arc<PipelineMetrics>,
}

impl SummaryPipeline {
    /// Assemble a pipeline from its collaborators.
    pub fn new(
        uploads: UploadReceiver,
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn SummarizationClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            uploads,
            extractor,
            summarizer,
            model: model.into(),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Receive, extract, prompt, and summarize a single upload.
    ///
    /// The stored file is removed as soon as the extractor has exited, before the prompt is built,
    /// so it never outlives the run whichever way the run ends.
    pub async fn summarize_upload(
        &self,
        upload: Option<IncomingDocument>,
        request: SummaryRequest,
    ) -> Result<SummaryOutcome, PipelineError> {
        let span = tracing::info_span!(
            "summarize_upload",
            request_id = %Uuid::new_v4(),
            length_mode = %request.length_mode
        );
        async move {
            self.metrics.record_received();
            let started = Instant::now();
            let result = self.run(upload, request).await;
            self.record_outcome(&result);
            match &result {
                Ok(outcome) => tracing::info!(
                    summary_chars = outcome.summary.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Summary generated"
                ),
                Err(error) => tracing::warn!(
                    stage = %error.stage(),
                    error = %error,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Pipeline run rejected"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        upload: Option<IncomingDocument>,
        request: SummaryRequest,
    ) -> Result<SummaryOutcome, PipelineError> {
        let incoming = upload.ok_or(UploadError::MissingFile)?;
        let document = self.uploads.store(incoming).await?;
        tracing::info!(
            path = %document.path().display(),
            original_name = %document.original_name(),
            mime = %document.declared_mime_type(),
            "Upload accepted"
        );

        let extraction = self.extractor.extract(document.path()).await;
        document.discard().await;
        let ExtractionResult {
            text, diagnostics, ..
        } = extraction.inspect_err(log_extraction_failure)?;
        if !diagnostics.trim().is_empty() {
            tracing::debug!(diagnostics = %diagnostics.trim(), "Extraction tool diagnostics");
        }
        tracing::debug!(text_chars = text.len(), "Text extracted");

        let prompt = build_prompt(request.length_mode, &text);
        let summary = self
            .summarizer
            .generate_summary(SummarizationRequest {
                model: self.model.clone(),
                prompt: prompt.render(),
            })
            .await
            .inspect_err(|error| {
                tracing::error!(model = %self.model, error = %error, "Error calling summarization API");
            })?;

        Ok(SummaryOutcome {
            summary,
            length_mode: request.length_mode,
        })
    }

    fn record_outcome(&self, result: &Result<SummaryOutcome, PipelineError>) {
        match result.as_ref().map_err(PipelineError::stage) {
            Ok(_) => self.metrics.record_summary(),
            Err(PipelineStage::Upload) => self.metrics.record_upload_rejected(),
            Err(PipelineStage::Extraction) => self.metrics.record_extraction_failure(),
            Err(PipelineStage::Summarization) => self.metrics.record_summarization_failure(),
            Err(PipelineStage::Timeout) => self.metrics.record_timeout(),
        }
    }
}

fn log_extraction_failure(error: &ExtractionError) {
    match error {
        ExtractionError::Failed {
            exit_status,
            diagnostics,
        } => tracing::error!(
            exit_status,
            diagnostics = %diagnostics.trim(),
            "Extraction tool error"
        ),
        other => tracing::error!(error = %other, "Extraction tool error"),
    }
}

#[async_trait]
impl SummaryApi for SummaryPipeline {
    async fn summarize_upload(
        &self,
        upload: Option<IncomingDocument>,
        request: SummaryRequest,
    ) -> Result<SummaryOutcome, PipelineError> {
        SummaryPipeline::summarize_upload(self, upload, request).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
