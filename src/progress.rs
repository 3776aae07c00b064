//! Progress-callback trait for per-document and per-illustration events.
//!
//! Inject an [`Arc<dyn IllustrationProgress>`] via
//! [`crate::config::IllustrationConfigBuilder::progress`] to receive
//! real-time events as the pipeline works through the spine.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a channel, a WebSocket, a database record, or a
//! terminal progress bar — without the library knowing anything about how
//! the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use epub_illustrator::{IllustrationProgress, IllustrationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingProgress {
//!     documents: AtomicUsize,
//! }
//!
//! impl IllustrationProgress for CountingProgress {
//!     fn on_document_complete(
//!         &self,
//!         doc_num: usize,
//!         total: usize,
//!         _outcome: &epub_illustrator::DocumentOutcome,
//!     ) {
//!         self.documents.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Document {}/{} done", doc_num, total);
//!     }
//! }
//!
//! let counter = Arc::new(CountingProgress {
//!     documents: AtomicUsize::new(0),
//! });
//!
//! let config = IllustrationConfig::builder()
//!     .progress(counter as Arc<dyn IllustrationProgress>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{DocumentOutcome, IllustrationOutcome, RunStats};
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it processes each spine entry.
///
/// The pipeline is strictly sequential, so methods are never invoked
/// concurrently; the `Send + Sync` bound exists because the hook is shared
/// through an `Arc` inside a cloneable config. All methods have default
/// no-op implementations so callers only override what they care about.
pub trait IllustrationProgress: Send + Sync {
    /// Called once after spine resolution, before any document is processed.
    ///
    /// # Arguments
    /// * `total_documents` — spine entries that will be processed (after any
    ///   `max_files` truncation)
    fn on_run_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called just before a document enters the state machine.
    ///
    /// # Arguments
    /// * `doc_num` — 1-indexed position in the spine
    /// * `total`   — total documents in this run
    /// * `path`    — document path relative to the working-tree root
    fn on_document_start(&self, doc_num: usize, total: usize, path: &Path) {
        let _ = (doc_num, total, path);
    }

    /// Called when a document reaches a terminal state.
    fn on_document_complete(&self, doc_num: usize, total: usize, outcome: &DocumentOutcome) {
        let _ = (doc_num, total, outcome);
    }

    /// Called once per extracted marker, after its cache/generate round.
    ///
    /// # Arguments
    /// * `index`       — global generation index (the cache key basis)
    /// * `description` — marker description text
    /// * `outcome`     — placed, unplaced, or failed
    fn on_illustration(&self, index: u64, description: &str, outcome: &IllustrationOutcome) {
        let _ = (index, description, outcome);
    }

    /// Called once after the output archive is written.
    fn on_run_complete(&self, stats: &RunStats) {
        let _ = stats;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgress;

impl IllustrationProgress for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::IllustrationConfig`].
pub type ProgressHook = Arc<dyn IllustrationProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingProgress {
        doc_starts: AtomicUsize,
        doc_completes: AtomicUsize,
        illustrations: AtomicUsize,
        run_total: AtomicUsize,
    }

    impl IllustrationProgress for TrackingProgress {
        fn on_run_start(&self, total_documents: usize) {
            self.run_total.store(total_documents, Ordering::SeqCst);
        }

        fn on_document_start(&self, _doc_num: usize, _total: usize, _path: &Path) {
            self.doc_starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _doc_num: usize, _total: usize, _outcome: &DocumentOutcome) {
            self.doc_completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_illustration(
            &self,
            _index: u64,
            _description: &str,
            _outcome: &IllustrationOutcome,
        ) {
            self.illustrations.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_progress_does_not_panic() {
        let cb = NoopProgress;
        cb.on_run_start(5);
        cb.on_document_start(1, 5, &PathBuf::from("OEBPS/ch1.xhtml"));
        cb.on_document_complete(1, 5, &DocumentOutcome::NoMarkers);
        cb.on_illustration(
            0,
            "a lighthouse at dusk",
            &IllustrationOutcome::Placed {
                source: crate::output::ImageSource::Generated,
            },
        );
        cb.on_run_complete(&RunStats::default());
    }

    #[test]
    fn tracking_progress_receives_events() {
        let tracker = TrackingProgress {
            doc_starts: AtomicUsize::new(0),
            doc_completes: AtomicUsize::new(0),
            illustrations: AtomicUsize::new(0),
            run_total: AtomicUsize::new(0),
        };

        tracker.on_run_start(2);
        assert_eq!(tracker.run_total.load(Ordering::SeqCst), 2);

        let path = PathBuf::from("ch1.xhtml");
        tracker.on_document_start(1, 2, &path);
        tracker.on_illustration(
            0,
            "a storm at sea",
            &IllustrationOutcome::Failed {
                error: crate::error::GenerationError::NoArtifact,
            },
        );
        tracker.on_document_complete(
            1,
            2,
            &DocumentOutcome::Rewritten {
                placed: 0,
                failed: 1,
            },
        );

        assert_eq!(tracker.doc_starts.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.doc_completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.illustrations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_hook_works() {
        let cb: ProgressHook = Arc::new(NoopProgress);
        cb.on_run_start(10);
        cb.on_document_start(1, 10, &PathBuf::from("ch1.xhtml"));
    }
}
