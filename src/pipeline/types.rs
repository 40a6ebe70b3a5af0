//! Outcome and error types for the document-to-summary pipeline.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::prompt::LengthMode;
use crate::summarization::SummarizationClientError;
use crate::upload::UploadError;

/// Generic message returned when the extraction tool fails; diagnostics stay in the logs.
pub const EXTRACTION_FAILED_MESSAGE: &str = "Error processing document.";

/// Stage at which a pipeline run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    /// Upload was missing, malformed, or could not be stored.
    Upload,
    /// Extraction tool failed or could not be launched.
    Extraction,
    /// Summarization service call failed.
    Summarization,
    /// Extraction or summarization exceeded its time budget.
    Timeout,
}

impl PipelineStage {
    /// Lowercase name used in error bodies.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Extraction => "extraction",
            Self::Summarization => "summarization",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors emitted by a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upload rejected or not stored.
    #[error(transparent)]
    Upload(#[from] UploadError),
    /// Extraction tool did not yield text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Summarization service did not yield a summary.
    #[error(transparent)]
    Summarization(#[from] SummarizationClientError),
}

impl PipelineError {
    /// Stage the run stopped at; timeouts from either external call report [`PipelineStage::Timeout`].
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Upload(_) => PipelineStage::Upload,
            Self::Extraction(ExtractionError::Timeout { .. })
            | Self::Summarization(SummarizationClientError::Timeout { .. }) => {
                PipelineStage::Timeout
            }
            Self::Extraction(_) => PipelineStage::Extraction,
            Self::Summarization(_) => PipelineStage::Summarization,
        }
    }

    /// Short headline safe to show the caller.
    pub fn public_message(&self) -> String {
        match self.stage() {
            PipelineStage::Upload => match self {
                Self::Upload(UploadError::Storage { .. }) => "Failed to store upload.".into(),
                other => other.to_string(),
            },
            PipelineStage::Extraction => EXTRACTION_FAILED_MESSAGE.into(),
            PipelineStage::Summarization => "Summarization API failed".into(),
            PipelineStage::Timeout => "Processing timed out".into(),
        }
    }

    /// Best-effort detail for the caller; extractor diagnostics and file paths are never included.
    pub fn public_details(&self) -> String {
        match self {
            Self::Upload(UploadError::Storage { .. }) => {
                "The server could not write the upload to temporary storage.".into()
            }
            Self::Upload(error) => error.to_string(),
            Self::Extraction(ExtractionError::Timeout { seconds }) => {
                format!("Text extraction did not finish within {seconds}s.")
            }
            Self::Extraction(_) => "The document could not be converted to text.".into(),
            Self::Summarization(error) => error.to_string(),
        }
    }
}

/// Successful pipeline result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutcome {
    /// Generated summary text.
    pub summary: String,
    /// Template the summary was produced with.
    pub length_mode: LengthMode,
}
