//! Gemini `generateContent` adapter.
//!
//! Sends the prompt and the frame (inline JPEG, base64) in a single
//! non-streaming request:
//!
//! ```text
//! POST {base_url}/v1beta/models/{model}:generateContent
//! x-goog-api-key: <key>
//! ```
//!
//! The text parts of the first candidate are concatenated and trimmed.

use super::InferenceClient;
use crate::capture::Frame;
use crate::config::InferenceConfig;
use crate::error::{OverlayError, Result};
use async_trait::async_trait;
use base64::Engine as _;
use tracing::debug;

/// Connection settings for [`GeminiClient`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (defaults to `https://generativelanguage.googleapis.com`).
    pub base_url: String,
    /// The model to use.
    pub model: String,
    /// System instruction attached to every request.
    pub system_instruction: String,
    /// JPEG quality for frame upload.
    pub jpeg_quality: u8,
}

impl GeminiConfig {
    /// Create a config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let defaults = InferenceConfig::default();
        Self {
            api_key: api_key.into(),
            base_url: defaults.base_url,
            model: model.into(),
            system_instruction: defaults.system_instruction,
            jpeg_quality: defaults.jpeg_quality,
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Build from the `[inference]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::Config`] when no API key is configured or set
    /// in the environment.
    pub fn from_inference_config(config: &InferenceConfig) -> Result<Self> {
        Self::with_resolved_key(config, config.effective_api_key())
    }

    fn with_resolved_key(config: &InferenceConfig, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key.ok_or_else(|| {
            OverlayError::Config(format!(
                "no inference API key: set inference.api_key or {}",
                crate::config::API_KEY_ENV
            ))
        })?;
        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            system_instruction: config.system_instruction.clone(),
            jpeg_quality: config.jpeg_quality,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Build the JSON request body.
pub fn build_generate_request(
    system_instruction: &str,
    prompt: &str,
    jpeg_base64: &str,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": prompt },
                { "inline_data": { "mime_type": "image/jpeg", "data": jpeg_base64 } },
            ],
        }],
    });

    if !system_instruction.trim().is_empty()
        && let Some(obj) = body.as_object_mut()
    {
        obj.insert(
            "system_instruction".into(),
            serde_json::json!({ "parts": [{ "text": system_instruction }] }),
        );
    }

    body
}

/// Concatenate the text parts of the first candidate.
///
/// Returns `None` when the response carries no text at all.
pub fn extract_text(response: &serde_json::Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_owned())
    }
}

/// Extract an error message from a Gemini error response body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Map an HTTP error status to an [`OverlayError`].
fn map_http_error(status: reqwest::StatusCode, body: &str) -> OverlayError {
    let message = extract_error_message(body);
    match status.as_u16() {
        401 | 403 => OverlayError::Inference(format!("authentication failed: {message}")),
        429 => OverlayError::Inference(format!("rate limited: {message}")),
        code => OverlayError::Inference(format!("HTTP {code}: {message}")),
    }
}

/// Gemini vision client.
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        Self { config, client }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn infer(&self, prompt: &str, frame: &Frame) -> Result<String> {
        let jpeg = frame.to_jpeg(self.config.jpeg_quality)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        let body = build_generate_request(&self.config.system_instruction, prompt, &encoded);

        debug!(
            model = %self.config.model,
            image_bytes = jpeg.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.config.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OverlayError::Inference(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OverlayError::Inference(format!("invalid response body: {e}")))?;

        if let Some(reason) = json
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(|r| r.as_str())
        {
            return Err(OverlayError::Inference(format!("prompt blocked: {reason}")));
        }

        extract_text(&json).ok_or_else(|| OverlayError::Inference("empty response".into()))
    }
}
