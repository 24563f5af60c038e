//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::PdfAnalyzer::with_progress`] to receive real-time events as a
//! request moves through the pipeline. Callbacks replace the mutable
//! task-status map a web deployment might otherwise keep: hosts forward
//! events to a progress bar, a WebSocket, or a status store without the
//! library knowing which.
//!
//! When the scan stage runs pages concurrently, `on_page_complete` may be
//! called from different tasks at once; implementations must synchronise
//! shared mutable state themselves.

use std::sync::Arc;

/// Called by the pipeline as a request advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once after validation, when the page count is known.
    fn on_scan_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when one page's extraction has finished.
    ///
    /// `page_num` is 1-indexed. Pages may complete out of order.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when the scan stage is done and the analysis call begins.
    fn on_analysis_start(&self) {}

    /// Called once with the final outcome: `Ok(analysis_len)` or the
    /// failing stage's name.
    fn on_complete(&self, outcome: Result<usize, &str>) {
        let _ = outcome;
    }
}

/// Shared handle passed into the pipeline.
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        pages: AtomicUsize,
    }

    impl AnalysisProgressCallback for Counting {
        fn on_page_complete(&self, _page: usize, _total: usize, _len: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn default_methods_are_noops() {
        let cb = Counting {
            pages: AtomicUsize::new(0),
        };
        cb.on_scan_start(3);
        cb.on_analysis_start();
        cb.on_complete(Ok(10));
        cb.on_page_complete(1, 3, 100);
        assert_eq!(cb.pages.load(Ordering::SeqCst), 1);
    }
}
