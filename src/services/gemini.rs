//! Gemini client for illustration placement.
//!
//! One `generateContent` call per document: the instruction and the full
//! document text go in as two text parts, and a structured-output schema
//! forces the model to answer with a JSON object holding a single `content`
//! field — the original text with `<!-- illustration: ... -->` markers
//! inserted. Constraining the shape this way means no fence-stripping or
//! fuzzy extraction on the way out; the reply either parses or it is a
//! [`AugmentError::BadResponse`].

use crate::error::AugmentError;
use crate::services::{AugmentRequest, AugmentationService};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::future::Future;
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiAugmentor {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiAugmentor {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
        }
    }

    async fn call(&self, request: &AugmentRequest<'_>) -> Result<String, AugmentError> {
        let url = format!(
            "{API_BASE}/{}:generateContent?key={}",
            self.model, self.api_key
        );
        debug!(
            "Augmenting {} chars with {}",
            request.text.len(),
            self.model
        );

        let response = self
            .http
            .post(&url)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| AugmentError::Service(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        let payload = response
            .text()
            .await
            .map_err(|e| AugmentError::Service(e.to_string()))?;
        parse_augmented_content(&payload)
    }
}

impl AugmentationService for GeminiAugmentor {
    fn augment(
        &self,
        request: &AugmentRequest<'_>,
    ) -> impl Future<Output = Result<String, AugmentError>> + Send {
        self.call(request)
    }
}

impl fmt::Debug for GeminiAugmentor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiAugmentor")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// `generateContent` request body with the structured-output schema.
fn request_body(request: &AugmentRequest<'_>) -> serde_json::Value {
    json!({
        "contents": [{
            "parts": [
                { "text": request.instruction },
                { "text": request.text },
            ]
        }],
        "generationConfig": {
            "response_mime_type": "application/json",
            "response_schema": {
                "type": "object",
                "properties": {
                    "content": { "type": "string" }
                },
                "required": ["content"]
            }
        }
    })
}

/// Sort an HTTP failure into transient-overload vs everything else.
fn classify_failure(status: u16, body: &str) -> AugmentError {
    let overloaded =
        status == 429 || status == 503 || body.contains("overloaded") || body.contains("UNAVAILABLE");
    if overloaded {
        AugmentError::Overloaded(format!("HTTP {status}: {body}"))
    } else {
        AugmentError::Service(format!("HTTP {status}: {body}"))
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: String,
}

/// The object the response schema forces the model to emit.
#[derive(Deserialize)]
struct AugmentedDocument {
    content: String,
}

/// Pull the augmented text out of a `generateContent` response payload.
fn parse_augmented_content(payload: &str) -> Result<String, AugmentError> {
    let response: GenerateContentResponse = serde_json::from_str(payload)
        .map_err(|e| AugmentError::BadResponse(format!("invalid response JSON: {e}")))?;

    let text = response
        .candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .map(|p| p.text.as_str())
        .ok_or_else(|| AugmentError::BadResponse("response has no candidate text".into()))?;

    let document: AugmentedDocument = serde_json::from_str(text).map_err(|e| {
        AugmentError::BadResponse(format!("candidate text is not the schema object: {e}"))
    })?;
    Ok(document.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_schema_constrained_response() {
        let payload = r#"{
            "candidates": [{
                "content": {
                    "parts": [{ "text": "{\"content\": \"Hello <!-- illustration: a sunrise --> world\"}" }]
                }
            }]
        }"#;
        let content = parse_augmented_content(payload).unwrap();
        assert_eq!(content, "Hello <!-- illustration: a sunrise --> world");
    }

    #[test]
    fn empty_candidates_is_bad_response() {
        let err = parse_augmented_content(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, AugmentError::BadResponse(_)));
    }

    #[test]
    fn non_schema_candidate_text_is_bad_response() {
        let payload = r#"{
            "candidates": [{ "content": { "parts": [{ "text": "plain prose, not JSON" }] } }]
        }"#;
        let err = parse_augmented_content(payload).unwrap_err();
        assert!(matches!(err, AugmentError::BadResponse(_)));
    }

    #[test]
    fn overload_statuses_are_transient() {
        assert!(classify_failure(503, "").is_transient());
        assert!(classify_failure(429, "").is_transient());
        assert!(classify_failure(500, "model is overloaded, try later").is_transient());
        assert!(classify_failure(500, r#"{"status": "UNAVAILABLE"}"#).is_transient());
        assert!(!classify_failure(401, "invalid key").is_transient());
        assert!(!classify_failure(400, "bad request").is_transient());
    }

    #[test]
    fn request_body_carries_schema_and_both_parts() {
        let request = AugmentRequest {
            instruction: "insert markers",
            text: "chapter text",
        };
        let body = request_body(&request);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "insert markers");
        assert_eq!(parts[1]["text"], "chapter text");
        assert_eq!(
            body["generationConfig"]["response_schema"]["required"][0],
            "content"
        );
        assert_eq!(
            body["generationConfig"]["response_mime_type"],
            "application/json"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = GeminiAugmentor::new(
            reqwest::Client::new(),
            "sk-secret".into(),
            "gemini-2.5-pro".into(),
        );
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("gemini-2.5-pro"));
    }
}
