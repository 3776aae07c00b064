//! Configuration types for an illustration run.
//!
//! All run behaviour is controlled through [`IllustrationConfig`], built via
//! its [`IllustrationConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across calls and to diff two runs to
//! understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::IllustrateError;
use crate::pipeline::augment::RetryPolicy;
use crate::progress::ProgressHook;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one EPUB illustration run.
///
/// Built via [`IllustrationConfig::builder()`] or using
/// [`IllustrationConfig::default()`].
///
/// # Example
/// ```rust
/// use epub_illustrator::IllustrationConfig;
///
/// let config = IllustrationConfig::builder()
///     .max_files(3)
///     .retry_backoff_ms(1_000)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct IllustrationConfig {
    /// Minimum raw character count for a document to be processed. Default: 400.
    ///
    /// Spine entries shorter than this (title pages, tables of contents,
    /// copyright boilerplate) are skipped outright: they are never sent to
    /// the augmentation service and pass through byte-identical. Set to 0 to
    /// process everything.
    pub min_document_chars: usize,

    /// Process only the first N spine entries. Default: `None` (all).
    ///
    /// Intended for bounded test runs against a large book — each skipped
    /// chapter saves one augmentation call and possibly several image
    /// generations.
    pub max_files: Option<usize>,

    /// Total augmentation attempts per document, including the first call.
    /// Default: 5.
    ///
    /// Only transient overload signals are retried; auth failures and other
    /// hard errors abort the document after a single attempt.
    pub max_attempts: u32,

    /// Fixed delay between augmentation attempts in milliseconds. Default: 5000.
    ///
    /// Overload responses usually clear within a few seconds; a fixed wait
    /// is enough for a strictly sequential pipeline that never hammers the
    /// endpoint with concurrent calls.
    pub retry_backoff_ms: u64,

    /// Directory holding previously generated illustrations. Default: `./illustrations`.
    ///
    /// Entries are keyed by the global generation index
    /// (`illustration_<index>.png`) and persist across runs, so re-running
    /// the same book reuses images instead of paying for regeneration. The
    /// key is positional, not content-addressed: if the augmentation output
    /// changes between runs, an index may map to an image generated for a
    /// different description.
    pub cache_dir: PathBuf,

    /// Output archive path. Default: `None`, which derives
    /// `<input-without-extension>_illustrated.epub` next to the input.
    pub output: Option<PathBuf>,

    /// Keep the extracted working tree on disk after the run. Default: false.
    ///
    /// The kept location is reported in
    /// [`crate::output::RunReport::working_tree`].
    pub keep_working_dir: bool,

    /// Model identifier for the augmentation service. Default: "gemini-2.5-pro".
    pub augment_model: String,

    /// Engine identifier for the image service. Default: "stable-diffusion-xl-1024-v1-0".
    pub image_engine: String,

    /// Custom augmentation instruction. If `None`, uses the built-in
    /// template from [`crate::prompts`], parameterised with the book and
    /// document names.
    pub instruction: Option<String>,

    /// Per-service-call HTTP timeout in seconds. Default: 120.
    ///
    /// Image generation at 30 diffusion steps can take the better part of a
    /// minute on a busy engine; augmentation of a long chapter is similar.
    pub api_timeout_secs: u64,

    /// Progress callback fired on document and illustration events.
    pub progress: Option<ProgressHook>,
}

impl Default for IllustrationConfig {
    fn default() -> Self {
        Self {
            min_document_chars: 400,
            max_files: None,
            max_attempts: 5,
            retry_backoff_ms: 5_000,
            cache_dir: PathBuf::from("./illustrations"),
            output: None,
            keep_working_dir: false,
            augment_model: "gemini-2.5-pro".to_string(),
            image_engine: "stable-diffusion-xl-1024-v1-0".to_string(),
            instruction: None,
            api_timeout_secs: 120,
            progress: None,
        }
    }
}

impl fmt::Debug for IllustrationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IllustrationConfig")
            .field("min_document_chars", &self.min_document_chars)
            .field("max_files", &self.max_files)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("cache_dir", &self.cache_dir)
            .field("output", &self.output)
            .field("keep_working_dir", &self.keep_working_dir)
            .field("augment_model", &self.augment_model)
            .field("image_engine", &self.image_engine)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress",
                &self.progress.as_ref().map(|_| "<dyn IllustrationProgress>"),
            )
            .finish()
    }
}

impl IllustrationConfig {
    /// Create a new builder for `IllustrationConfig`.
    pub fn builder() -> IllustrationConfigBuilder {
        IllustrationConfigBuilder {
            config: Self::default(),
        }
    }

    /// The augmentation retry policy derived from this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

/// Builder for [`IllustrationConfig`].
#[derive(Debug)]
pub struct IllustrationConfigBuilder {
    config: IllustrationConfig,
}

impl IllustrationConfigBuilder {
    pub fn min_document_chars(mut self, chars: usize) -> Self {
        self.config.min_document_chars = chars;
        self
    }

    pub fn max_files(mut self, n: usize) -> Self {
        self.config.max_files = Some(n);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = Some(path.into());
        self
    }

    pub fn keep_working_dir(mut self, v: bool) -> Self {
        self.config.keep_working_dir = v;
        self
    }

    pub fn augment_model(mut self, model: impl Into<String>) -> Self {
        self.config.augment_model = model.into();
        self
    }

    pub fn image_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.image_engine = engine.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn progress(mut self, hook: ProgressHook) -> Self {
        self.config.progress = Some(hook);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IllustrationConfig, IllustrateError> {
        let c = &self.config;
        if c.max_files == Some(0) {
            return Err(IllustrateError::InvalidConfig(
                "max_files must be ≥ 1 when set".into(),
            ));
        }
        if c.augment_model.is_empty() {
            return Err(IllustrateError::InvalidConfig(
                "augment_model must not be empty".into(),
            ));
        }
        if c.image_engine.is_empty() {
            return Err(IllustrateError::InvalidConfig(
                "image_engine must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
