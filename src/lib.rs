//! # epub-illustrator
//!
//! Illustrate EPUB books with AI-generated images.
//!
//! ## Why this crate?
//!
//! Illustrating a book by hand means reading every chapter, deciding where a
//! picture would help, writing a prompt, generating the image, and editing
//! the markup — per illustration. This crate automates the loop: a language
//! model reads each chapter and inserts `<!-- illustration: ... -->` markers
//! where a picture would genuinely help, an image model renders each
//! one-sentence description, and the pipeline rewrites the markup and
//! repackages a valid EPUB. Generated images are cached on disk so repeated
//! runs over the same book cost nothing to re-illustrate.
//!
//! ## Pipeline Overview
//!
//! ```text
//! EPUB
//!  │
//!  ├─ 1. Extract  unzip to a working tree, resolve the spine
//!  ├─ 2. Augment  Gemini inserts illustration markers per document
//!  ├─ 3. Markers  parse one-sentence descriptions, one marker per line
//!  ├─ 4. Images   cache hit, or Stability AI text-to-image
//!  ├─ 5. Rewrite  replace markers with <img> references, write in place
//!  └─ 6. Repack   zip the tree: mimetype first and stored, rest deflated
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use epub_illustrator::{illustrate, IllustrationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Services picked up from GOOGLE_API_KEY / STABILITY_API_KEY
//!     let config = IllustrationConfig::default();
//!     let report = illustrate("book.epub", &config).await?;
//!     println!("wrote {}", report.output_path.display());
//!     eprintln!(
//!         "{} illustration(s) placed, {} failed",
//!         report.stats.illustrations_generated + report.stats.illustrations_cached,
//!         report.stats.illustrations_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `epub-illustrator` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! epub-illustrator = { version = "0.3", default-features = false }
//! ```
//!
//! ## Services
//!
//! | Service | Credential | Default model/engine |
//! |---------|-----------|----------------------|
//! | Gemini (marker placement) | `GOOGLE_API_KEY` | `gemini-2.5-pro` |
//! | Stability AI (image generation) | `STABILITY_API_KEY` | `stable-diffusion-xl-1024-v1-0` |
//!
//! Either service may be absent: without Gemini, documents pass through
//! unaugmented; without Stability, markers stay in the text as comments.
//! Only the absence of both aborts a run.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod illustrate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod services;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IllustrationConfig, IllustrationConfigBuilder};
pub use error::{AugmentError, DocumentError, GenerationError, IllustrateError};
pub use illustrate::{default_output_path, illustrate, illustrate_with};
pub use output::{
    DocumentOutcome, DocumentReport, IllustrationOutcome, IllustrationReport, ImageSource,
    RunReport, RunStats,
};
pub use progress::{IllustrationProgress, NoopProgress, ProgressHook};
pub use services::{
    AugmentRequest, AugmentationService, GeminiAugmentor, ImageService, Services,
    StabilityImageService,
};
