//! Progress-callback trait for ingestion events.
//!
//! Inject an `Arc<dyn IngestProgressCallback>` via
//! [`crate::config::ServiceConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline moves through its stages and pages.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a broadcast channel, a WebSocket, a database row,
//! or a terminal progress bar — without the library knowing anything about
//! how the host application communicates. The trait is `Send + Sync`
//! because pages are recognised concurrently.

use std::sync::Arc;

use crate::pipeline::ingest::IngestStage;

/// Called by the ingestion pipeline as it advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Page events may arrive concurrently and out of
/// page order; implementations must synchronise shared mutable state.
pub trait IngestProgressCallback: Send + Sync {
    /// Called when the pipeline enters a stage.
    fn on_stage_start(&self, stage: IngestStage) {
        let _ = stage;
    }

    /// Called just before a page image is handed to the recognition engine.
    fn on_page_start(&self, page: usize, total_pages: usize) {
        let _ = (page, total_pages);
    }

    /// Called when a page's text is in hand.
    ///
    /// `text_len` is the byte length of the recognised text; zero is a
    /// blank page, not a failure.
    fn on_page_recognized(&self, page: usize, total_pages: usize, text_len: usize) {
        let _ = (page, total_pages, text_len);
    }

    /// Called once after the processing stages finish, before commit.
    fn on_pipeline_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::ServiceConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        stages: AtomicUsize,
        pages: AtomicUsize,
        completes: AtomicUsize,
    }

    impl IngestProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: IngestStage) {
            self.stages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_recognized(&self, _page: usize, _total: usize, _len: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_pipeline_complete(&self, _total: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(IngestStage::Repairing);
        cb.on_page_start(1, 3);
        cb.on_page_recognized(1, 3, 42);
        cb.on_pipeline_complete(3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            stages: AtomicUsize::new(0),
            pages: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
        };

        tracker.on_stage_start(IngestStage::Repairing);
        tracker.on_stage_start(IngestStage::Rasterizing);
        tracker.on_page_recognized(1, 2, 100);
        tracker.on_page_recognized(2, 2, 0);
        tracker.on_pipeline_complete(2);

        assert_eq!(tracker.stages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn IngestProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_stage_start(IngestStage::Done);
        cb.on_page_start(1, 10);
    }
}
