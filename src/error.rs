//! Error types for the epub-illustrator library.
//!
//! Three layers reflect three distinct failure modes:
//!
//! * [`IllustrateError`] — **Fatal**: the run cannot proceed at all (missing
//!   input, unreadable archive, unresolvable spine, no service configured).
//!   Returned as `Err(IllustrateError)` from the top-level `illustrate*`
//!   functions.
//!
//! * [`DocumentError`] — **Non-fatal, per document**: one content document
//!   could not be augmented or written back, but every other document is
//!   fine. Stored inside [`crate::output::DocumentReport`] so callers can
//!   inspect partial success.
//!
//! * [`GenerationError`] — **Non-fatal, per illustration**: one image could
//!   not be produced or stored; its marker stays in the text and processing
//!   continues with the remaining markers.
//!
//! [`AugmentError`] is the augmentation-service seam: clients classify
//! transport and API failures into it, and the retry policy consults
//! [`AugmentError::is_transient`] to decide whether another attempt is worth
//! making.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the epub-illustrator library.
///
/// Document-level failures use [`DocumentError`] and illustration-level
/// failures use [`GenerationError`]; both are stored in the
/// [`crate::output::RunReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum IllustrateError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("EPUB file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The archive could not be opened or unpacked as a zip container.
    #[error("Failed to read EPUB archive '{path}': {source}")]
    ArchiveRead {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// The container or OPF structure violates the expected EPUB shape, so
    /// no spine can be resolved.
    #[error("Malformed EPUB package: {detail}")]
    MalformedPackage { detail: String },

    // ── Service errors ────────────────────────────────────────────────────
    /// Neither external service has a credential, so no work can be done.
    #[error(
        "No AI service is configured.\n\
         Set GOOGLE_API_KEY to enable illustration placement (Gemini) and/or\n\
         STABILITY_API_KEY to enable image generation (Stability AI)."
    )]
    NoServicesConfigured,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or populate the temporary working tree.
    #[error("Failed to prepare the working directory: {source}")]
    WorkingTree {
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output archive file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip writer rejected an entry while producing the output archive.
    #[error("Failed to assemble output archive '{path}': {source}")]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors surfaced by an augmentation-service client.
///
/// The distinction that matters downstream is transient vs not: the retry
/// policy in [`crate::pipeline::augment`] retries only while
/// [`is_transient`](AugmentError::is_transient) holds.
#[derive(Debug, Error)]
pub enum AugmentError {
    /// The service signalled overload (HTTP 429/503 or an "overloaded"
    /// message). Worth retrying after a backoff.
    #[error("Augmentation service overloaded: {0}")]
    Overloaded(String),

    /// The request failed for a non-transient reason (auth, bad request,
    /// transport failure). Retrying will not help.
    #[error("Augmentation request failed: {0}")]
    Service(String),

    /// The service answered 200 but the body did not match the structured
    /// output contract.
    #[error("Augmentation response malformed: {0}")]
    BadResponse(String),
}

impl AugmentError {
    /// Whether the retry policy should attempt the call again.
    pub fn is_transient(&self) -> bool {
        matches!(self, AugmentError::Overloaded(_))
    }
}

/// A non-fatal error for a single content document.
///
/// Stored in [`crate::output::DocumentReport`] when a document fails.
/// The overall run continues with the next spine entry.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// No augmentation service is configured; the document cannot be
    /// processed and keeps its original text.
    #[error("Augmentation service is not configured (set GOOGLE_API_KEY)")]
    AugmentorMissing,

    /// Augmentation gave up after the retry ceiling or a non-transient
    /// error; the document keeps its original text.
    #[error("Augmentation failed after {attempts} attempt(s): {detail}")]
    AugmentFailed { attempts: u32, detail: String },

    /// The document file could not be read or written back.
    #[error("Document I/O failed: {detail}")]
    Io { detail: String },
}

/// A non-fatal error for a single illustration.
///
/// Stored in [`crate::output::IllustrationReport`]; the marker comment for
/// the failed illustration remains verbatim in the output document.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum GenerationError {
    /// No image service is configured; nothing can be generated.
    #[error("Image service is not configured (set STABILITY_API_KEY)")]
    GeneratorMissing,

    /// The image service rejected or failed the request.
    #[error("Image generation failed: {detail}")]
    Service { detail: String },

    /// The service answered but every candidate was filtered or empty.
    #[error("Image service returned no usable artifact")]
    NoArtifact,

    /// The generated bytes could not be written to the destination or the
    /// cache store.
    #[error("Failed to store illustration: {detail}")]
    Storage { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = IllustrateError::FileNotFound {
            path: PathBuf::from("missing.epub"),
        };
        let msg = e.to_string();
        assert!(msg.contains("missing.epub"), "got: {msg}");
    }

    #[test]
    fn malformed_package_display() {
        let e = IllustrateError::MalformedPackage {
            detail: "no rootfile element in META-INF/container.xml".into(),
        };
        assert!(e.to_string().contains("rootfile"));
    }

    #[test]
    fn no_services_names_both_variables() {
        let msg = IllustrateError::NoServicesConfigured.to_string();
        assert!(msg.contains("GOOGLE_API_KEY"));
        assert!(msg.contains("STABILITY_API_KEY"));
    }

    #[test]
    fn overloaded_is_transient() {
        assert!(AugmentError::Overloaded("503".into()).is_transient());
        assert!(!AugmentError::Service("bad key".into()).is_transient());
        assert!(!AugmentError::BadResponse("not json".into()).is_transient());
    }

    #[test]
    fn augment_failed_display() {
        let e = DocumentError::AugmentFailed {
            attempts: 5,
            detail: "overloaded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("5 attempt"), "got: {msg}");
        assert!(msg.contains("overloaded"));
    }

    #[test]
    fn generation_error_display() {
        let e = GenerationError::Service {
            detail: "engine not found".into(),
        };
        assert!(e.to_string().contains("engine not found"));
        assert!(GenerationError::NoArtifact.to_string().contains("artifact"));
    }
}
