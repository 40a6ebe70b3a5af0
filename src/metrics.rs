use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity since startup.
#[derive(Default)]
pub struct PipelineMetrics {
    documents_received: AtomicU64,
    summaries_generated: AtomicU64,
    upload_rejections: AtomicU64,
    extraction_failures: AtomicU64,
    summarization_failures: AtomicU64,
    timeouts: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request handed to the pipeline.
    pub fn record_received(&self) {
        self.documents_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a summary returned to the caller.
    pub fn record_summary(&self) {
        self.summaries_generated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an upload rejected before anything was stored.
    pub fn record_upload_rejected(&self) {
        self.upload_rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an extractor run that did not produce text.
    pub fn record_extraction_failure(&self) {
        self.extraction_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed call to the summarization service.
    pub fn record_summarization_failure(&self) {
        self.summarization_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stage that exceeded its time budget.
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_received: self.documents_received.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            upload_rejections: self.upload_rejections.load(Ordering::Relaxed),
            extraction_failures: self.extraction_failures.load(Ordering::Relaxed),
            summarization_failures: self.summarization_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Upload requests handed to the pipeline.
    pub documents_received: u64,
    /// Summaries successfully returned.
    pub summaries_generated: u64,
    /// Uploads rejected during validation.
    pub upload_rejections: u64,
    /// Extractor runs that exited non-zero or could not be launched.
    pub extraction_failures: u64,
    /// Summarization calls that failed for reasons other than a timeout.
    pub summarization_failures: u64,
    /// Extraction or summarization stages that timed out.
    pub timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_each_outcome_independently() {
        let metrics = PipelineMetrics::new();
        metrics.record_received();
        metrics.record_received();
        metrics.record_received();
        metrics.record_summary();
        metrics.record_extraction_failure();
        metrics.record_timeout();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.documents_received, 3);
        assert_eq!(snapshot.summaries_generated, 1);
        assert_eq!(snapshot.extraction_failures, 1);
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.upload_rejections, 0);
        assert_eq!(snapshot.summarization_failures, 0);
    }

    #[test]
    fn snapshot_starts_empty() {
        assert_eq!(PipelineMetrics::new().snapshot(), MetricsSnapshot::default());
    }
}
