//! Stability AI client for image generation.
//!
//! One text-to-image call per illustration against the v1 REST endpoint.
//! The response carries a list of candidate artifacts; candidates flagged
//! `CONTENT_FILTERED` are logged and skipped, and the first candidate with
//! actual image data wins. A response with no usable candidate at all is
//! [`GenerationError::NoArtifact`], which the pipeline treats like any other
//! per-illustration failure: the marker stays in the text and the run moves
//! on.

use crate::error::GenerationError;
use crate::services::ImageService;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.stability.ai/v1/generation";

/// Diffusion step count for every generation request.
const DIFFUSION_STEPS: u32 = 30;

/// Client for the Stability AI text-to-image REST endpoint.
pub struct StabilityImageService {
    http: reqwest::Client,
    api_key: String,
    engine: String,
}

impl StabilityImageService {
    pub fn new(http: reqwest::Client, api_key: String, engine: String) -> Self {
        Self {
            http,
            api_key,
            engine,
        }
    }

    async fn call(&self, description: &str) -> Result<Vec<u8>, GenerationError> {
        let url = format!("{API_BASE}/{}/text-to-image", self.engine);
        debug!("Generating image with {}: {description}", self.engine);

        let body = json!({
            "text_prompts": [{ "text": description }],
            "steps": DIFFUSION_STEPS,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Service {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Service {
                detail: format!("HTTP {status}: {body}"),
            });
        }

        let payload = response.text().await.map_err(|e| GenerationError::Service {
            detail: e.to_string(),
        })?;
        first_image_artifact(&payload)
    }
}

impl ImageService for StabilityImageService {
    fn generate(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<Vec<u8>, GenerationError>> + Send {
        self.call(description)
    }
}

impl fmt::Debug for StabilityImageService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StabilityImageService")
            .field("engine", &self.engine)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

#[derive(Deserialize)]
struct Artifact {
    #[serde(default)]
    base64: String,
    #[serde(rename = "finishReason", default)]
    finish_reason: String,
}

/// Decode the first usable image candidate from a generation response.
fn first_image_artifact(payload: &str) -> Result<Vec<u8>, GenerationError> {
    let response: GenerationResponse =
        serde_json::from_str(payload).map_err(|e| GenerationError::Service {
            detail: format!("invalid response JSON: {e}"),
        })?;

    for artifact in &response.artifacts {
        if artifact.finish_reason == "CONTENT_FILTERED" {
            warn!("Image candidate filtered by the service");
            continue;
        }
        if artifact.base64.is_empty() {
            continue;
        }
        return STANDARD
            .decode(&artifact.base64)
            .map_err(|e| GenerationError::Service {
                detail: format!("artifact is not valid base64: {e}"),
            });
    }

    Err(GenerationError::NoArtifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_with(artifacts: &[(&str, &str)]) -> String {
        let artifacts: Vec<_> = artifacts
            .iter()
            .map(|(b64, reason)| json!({ "base64": b64, "finishReason": reason }))
            .collect();
        json!({ "artifacts": artifacts }).to_string()
    }

    #[test]
    fn decodes_first_successful_artifact() {
        let encoded = STANDARD.encode(b"png bytes");
        let payload = payload_with(&[(&encoded, "SUCCESS")]);
        assert_eq!(first_image_artifact(&payload).unwrap(), b"png bytes");
    }

    #[test]
    fn filtered_candidates_are_skipped() {
        let encoded = STANDARD.encode(b"second try");
        let payload = payload_with(&[("aWdub3JlZA==", "CONTENT_FILTERED"), (&encoded, "SUCCESS")]);
        assert_eq!(first_image_artifact(&payload).unwrap(), b"second try");
    }

    #[test]
    fn all_filtered_is_no_artifact() {
        let payload = payload_with(&[("eA==", "CONTENT_FILTERED"), ("eQ==", "CONTENT_FILTERED")]);
        assert!(matches!(
            first_image_artifact(&payload),
            Err(GenerationError::NoArtifact)
        ));
    }

    #[test]
    fn empty_artifact_list_is_no_artifact() {
        assert!(matches!(
            first_image_artifact(r#"{"artifacts": []}"#),
            Err(GenerationError::NoArtifact)
        ));
    }

    #[test]
    fn invalid_base64_is_service_error() {
        let payload = payload_with(&[("not valid base64!!!", "SUCCESS")]);
        assert!(matches!(
            first_image_artifact(&payload),
            Err(GenerationError::Service { .. })
        ));
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = StabilityImageService::new(
            reqwest::Client::new(),
            "sk-secret".into(),
            "stable-diffusion-xl-1024-v1-0".into(),
        );
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("stable-diffusion-xl-1024-v1-0"));
    }
}
