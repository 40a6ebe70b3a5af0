//! Document-to-summary pipeline: upload storage, text extraction, prompting, and summarization.

mod service;
pub mod types;

pub use service::{SummaryApi, SummaryPipeline};
pub use types::{EXTRACTION_FAILED_MESSAGE, PipelineError, PipelineStage, SummaryOutcome};
