//! External service clients and the capability seam.
//!
//! Two services power a run: a content-augmentation service that inserts
//! illustration markers into document text ([`AugmentationService`], Gemini
//! in production) and an image-generation service that renders each marker
//! description ([`ImageService`], Stability AI in production). Both are
//! modelled as traits so tests can script them, and both are *optional*:
//! [`Services`] carries each as an `Option`, and a run proceeds with
//! whichever capability is present. Only the absence of both is fatal.

use crate::config::IllustrationConfig;
use crate::error::{AugmentError, GenerationError, IllustrateError};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

pub mod gemini;
pub mod stability;

pub use gemini::GeminiAugmentor;
pub use stability::StabilityImageService;

/// Environment variable holding the augmentation-service credential.
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
/// Environment variable holding the image-service credential.
pub const STABILITY_API_KEY: &str = "STABILITY_API_KEY";

/// One augmentation request: the instruction and a document's full text.
#[derive(Debug, Clone, Copy)]
pub struct AugmentRequest<'a> {
    /// What the service should do with the text (see [`crate::prompts`]).
    pub instruction: &'a str,
    /// The document's complete current content.
    pub text: &'a str,
}

/// A service that returns document text with illustration markers inserted.
///
/// Implementations classify failures into [`AugmentError`]; the retry loop
/// in [`crate::pipeline::augment`] retries only transient ones.
pub trait AugmentationService: Send + Sync {
    fn augment(
        &self,
        request: &AugmentRequest<'_>,
    ) -> impl Future<Output = Result<String, AugmentError>> + Send;
}

/// A service that renders raw image bytes for a one-sentence description.
pub trait ImageService: Send + Sync {
    fn generate(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<Vec<u8>, GenerationError>> + Send;
}

/// The optional external capabilities available to a run.
///
/// A missing augmentor means documents keep their original text; a missing
/// imager means markers stay in place unreplaced. Both missing means there
/// is no work the pipeline can do, which
/// [`ensure_configured`](Services::ensure_configured) reports as fatal.
#[derive(Debug)]
pub struct Services<A, S> {
    pub augmentor: Option<A>,
    pub imager: Option<S>,
}

impl<A, S> Services<A, S> {
    pub fn new(augmentor: Option<A>, imager: Option<S>) -> Self {
        Self { augmentor, imager }
    }

    /// Fail fast when neither capability is present.
    pub fn ensure_configured(&self) -> Result<(), IllustrateError> {
        if self.augmentor.is_none() && self.imager.is_none() {
            return Err(IllustrateError::NoServicesConfigured);
        }
        Ok(())
    }
}

impl Services<GeminiAugmentor, StabilityImageService> {
    /// Build production clients from the environment.
    ///
    /// Reads [`GOOGLE_API_KEY`] and [`STABILITY_API_KEY`]; an unset or empty
    /// variable disables that service with a warning rather than failing.
    pub fn from_env(config: &IllustrationConfig) -> Result<Self, IllustrateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| IllustrateError::Internal(format!("failed to build HTTP client: {e}")))?;

        let augmentor = match std::env::var(GOOGLE_API_KEY) {
            Ok(key) if !key.is_empty() => {
                info!("Augmentation service: {}", config.augment_model);
                Some(GeminiAugmentor::new(
                    http.clone(),
                    key,
                    config.augment_model.clone(),
                ))
            }
            _ => {
                warn!("{GOOGLE_API_KEY} not set; illustration placement disabled");
                None
            }
        };

        let imager = match std::env::var(STABILITY_API_KEY) {
            Ok(key) if !key.is_empty() => {
                info!("Image service: {}", config.image_engine);
                Some(StabilityImageService::new(
                    http,
                    key,
                    config.image_engine.clone(),
                ))
            }
            _ => {
                warn!("{STABILITY_API_KEY} not set; image generation disabled");
                None
            }
        };

        Ok(Services::new(augmentor, imager))
    }
}
