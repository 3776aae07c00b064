//! Run report types: per-document outcomes, per-illustration outcomes, and
//! aggregate statistics.
//!
//! Everything here is serialisable so callers can persist or print a run
//! summary as JSON. Non-fatal failures are *data* in these types rather than
//! `Err` values: a run that produced an output archive returns `Ok` even
//! when individual documents or illustrations failed, and the report says
//! which ones.

use crate::error::{DocumentError, GenerationError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where an illustration's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSource {
    /// Reused from the on-disk cache; the image service was not contacted.
    Cached,
    /// Freshly produced by the image service and stored in the cache.
    Generated,
}

/// Outcome of a single illustration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IllustrationOutcome {
    /// The image was written and its marker replaced with an `<img>`
    /// reference.
    Placed { source: ImageSource },

    /// The image was produced but the canonical marker text was absent at
    /// replacement time (the augmentation service emitted non-canonical
    /// spacing), so no reference was inserted.
    MarkerNotFound { source: ImageSource },

    /// Generation or storage failed; the marker comment remains verbatim in
    /// the output document.
    Failed { error: GenerationError },
}

/// One illustration request: its global sequential index (the cache key
/// basis), the description the augmentation service wrote, and what became
/// of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IllustrationReport {
    /// Global, monotonically increasing across all documents in the run.
    pub index: u64,
    /// Free-text description extracted from the marker.
    pub description: String,
    pub outcome: IllustrationOutcome,
}

/// Terminal state of one content document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DocumentOutcome {
    /// Raw text was below the minimum length threshold; the document was
    /// never sent to any service and is byte-identical in the output.
    Skipped { chars: usize },

    /// Augmentation or document I/O failed; the original text is kept.
    Failed { error: DocumentError },

    /// Augmentation succeeded but produced no markers; the file was left
    /// untouched.
    NoMarkers,

    /// The document was rewritten in place. `placed` markers became image
    /// references; `failed` did not.
    Rewritten { placed: usize, failed: usize },
}

/// Result of processing one spine entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Document path relative to the working-tree root.
    pub path: PathBuf,
    pub outcome: DocumentOutcome,
    /// One entry per extracted marker, in extraction order. Empty unless the
    /// document reached the illustrating state.
    pub illustrations: Vec<IllustrationReport>,
}

/// Aggregate statistics for one run.
///
/// Duration fields split the wall-clock total into time spent inside
/// augmentation calls (including retry backoff) and time spent fetching or
/// generating images.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Spine entries considered (after any `max_files` truncation).
    pub documents_total: usize,
    pub documents_rewritten: usize,
    pub documents_skipped: usize,
    pub documents_failed: usize,
    pub documents_without_markers: usize,
    /// Markers extracted across all documents (= indices consumed).
    pub illustrations_requested: usize,
    pub illustrations_generated: usize,
    pub illustrations_cached: usize,
    pub illustrations_failed: usize,
    pub total_duration_ms: u64,
    pub augment_duration_ms: u64,
    pub generation_duration_ms: u64,
}

impl RunStats {
    /// Aggregate the countable fields from per-document reports.
    ///
    /// Duration fields are not derivable from reports; the orchestrator
    /// fills them in afterwards.
    pub(crate) fn tally(documents: &[DocumentReport]) -> Self {
        let mut stats = RunStats {
            documents_total: documents.len(),
            ..RunStats::default()
        };

        for doc in documents {
            match &doc.outcome {
                DocumentOutcome::Skipped { .. } => stats.documents_skipped += 1,
                DocumentOutcome::Failed { .. } => stats.documents_failed += 1,
                DocumentOutcome::NoMarkers => stats.documents_without_markers += 1,
                DocumentOutcome::Rewritten { .. } => stats.documents_rewritten += 1,
            }

            for ill in &doc.illustrations {
                stats.illustrations_requested += 1;
                match &ill.outcome {
                    IllustrationOutcome::Placed { source }
                    | IllustrationOutcome::MarkerNotFound { source } => match source {
                        ImageSource::Cached => stats.illustrations_cached += 1,
                        ImageSource::Generated => stats.illustrations_generated += 1,
                    },
                    IllustrationOutcome::Failed { .. } => stats.illustrations_failed += 1,
                }
            }
        }

        stats
    }
}

/// Complete result of one illustration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Path of the archive that was written.
    pub output_path: PathBuf,
    /// Working-tree location, present only when the run was configured to
    /// keep it for inspection.
    pub working_tree: Option<PathBuf>,
    /// One report per spine entry, in reading order.
    pub documents: Vec<DocumentReport>,
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(index: u64, source: ImageSource) -> IllustrationReport {
        IllustrationReport {
            index,
            description: format!("illustration {index}"),
            outcome: IllustrationOutcome::Placed { source },
        }
    }

    #[test]
    fn tally_counts_document_outcomes() {
        let documents = vec![
            DocumentReport {
                path: PathBuf::from("ch1.xhtml"),
                outcome: DocumentOutcome::Rewritten {
                    placed: 2,
                    failed: 0,
                },
                illustrations: vec![
                    placed(0, ImageSource::Generated),
                    placed(1, ImageSource::Cached),
                ],
            },
            DocumentReport {
                path: PathBuf::from("toc.xhtml"),
                outcome: DocumentOutcome::Skipped { chars: 120 },
                illustrations: vec![],
            },
            DocumentReport {
                path: PathBuf::from("ch2.xhtml"),
                outcome: DocumentOutcome::NoMarkers,
                illustrations: vec![],
            },
        ];

        let stats = RunStats::tally(&documents);
        assert_eq!(stats.documents_total, 3);
        assert_eq!(stats.documents_rewritten, 1);
        assert_eq!(stats.documents_skipped, 1);
        assert_eq!(stats.documents_without_markers, 1);
        assert_eq!(stats.documents_failed, 0);
        assert_eq!(stats.illustrations_requested, 2);
        assert_eq!(stats.illustrations_generated, 1);
        assert_eq!(stats.illustrations_cached, 1);
    }

    #[test]
    fn tally_counts_failed_illustrations() {
        let documents = vec![DocumentReport {
            path: PathBuf::from("ch1.xhtml"),
            outcome: DocumentOutcome::Rewritten {
                placed: 0,
                failed: 1,
            },
            illustrations: vec![IllustrationReport {
                index: 0,
                description: "a storm at sea".into(),
                outcome: IllustrationOutcome::Failed {
                    error: crate::error::GenerationError::NoArtifact,
                },
            }],
        }];

        let stats = RunStats::tally(&documents);
        assert_eq!(stats.illustrations_requested, 1);
        assert_eq!(stats.illustrations_failed, 1);
        assert_eq!(stats.illustrations_generated, 0);
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = RunReport {
            output_path: PathBuf::from("book_illustrated.epub"),
            working_tree: None,
            documents: vec![],
            stats: RunStats::default(),
        };
        let json = serde_json::to_string(&report).expect("serialise");
        let back: RunReport = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back.output_path, report.output_path);
    }
}
