//! services/api/src/adapters/face_llm.rs
//!
//! This module contains the adapter for the face-comparison collaborator.
//! It implements the `FaceComparisonService` port from the `core` crate by
//! asking a Gemini vision model (through its OpenAI-compatible endpoint)
//! whether two photos show the same person.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs,
        ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use geoattend_core::{
    domain::FaceMatch,
    error::{CoreError, CoreResult},
    ports::FaceComparisonService,
};
use serde::Deserialize;
use tracing::{debug, warn};

const FACE_PROMPT: &str = r#"As an expert facial recognition system, determine if the two images contain the same person.
Analyze facial features carefully.
Respond ONLY with a JSON object matching this schema:
{
  "is_same_person": boolean,
  "confidence": number (from 0.0 to 1.0)
}"#;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `FaceComparisonService` using a Gemini vision
/// model behind the OpenAI-compatible chat API.
#[derive(Clone)]
pub struct GeminiFaceAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiFaceAdapter {
    /// Creates a new `GeminiFaceAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn data_url(image: &[u8]) -> String {
        format!("data:image/png;base64,{}", BASE64.encode(image))
    }
}

/// The JSON verdict the model is instructed to return.
#[derive(Debug, Deserialize)]
struct FaceVerdict {
    #[serde(alias = "isSamePerson")]
    is_same_person: bool,
    confidence: f64,
}

/// Parses the model's reply, tolerating markdown code fences around the
/// JSON object. A reply that still fails to parse is a collaborator
/// failure, distinct from "compared, not a match".
fn parse_verdict(raw: &str) -> CoreResult<FaceMatch> {
    let mut text = raw.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        text = stripped;
    } else if let Some(stripped) = text.strip_prefix("```") {
        text = stripped;
    }
    text = text.strip_suffix("```").unwrap_or(text).trim();

    let verdict: FaceVerdict = serde_json::from_str(text).map_err(|e| {
        CoreError::VerificationService(format!("could not parse model verdict: {e}"))
    })?;
    if !(0.0..=1.0).contains(&verdict.confidence) {
        return Err(CoreError::VerificationService(format!(
            "model confidence {} is outside [0, 1]",
            verdict.confidence
        )));
    }
    Ok(FaceMatch {
        same_person: verdict.is_same_person,
        confidence: verdict.confidence,
    })
}

//=========================================================================================
// `FaceComparisonService` Trait Implementation
//=========================================================================================

#[async_trait]
impl FaceComparisonService for GeminiFaceAdapter {
    /// Sends both photos to the vision model and parses its JSON verdict.
    async fn compare(&self, reference: &[u8], capture: &[u8]) -> CoreResult<FaceMatch> {
        let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(Self::data_url(reference))
                        .build()
                        .map_err(|e| CoreError::VerificationService(e.to_string()))?,
                )
                .build()
                .map_err(|e| CoreError::VerificationService(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(Self::data_url(capture))
                        .build()
                        .map_err(|e| CoreError::VerificationService(e.to_string()))?,
                )
                .build()
                .map_err(|e| CoreError::VerificationService(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(FACE_PROMPT)
                .build()
                .map_err(|e| CoreError::VerificationService(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestUserMessageArgs::default()
                .content(parts)
                .build()
                .map_err(|e| CoreError::VerificationService(e.to_string()))?
                .into()])
            .build()
            .map_err(|e| CoreError::VerificationService(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| CoreError::VerificationService(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                CoreError::VerificationService(
                    "face model returned no text content".to_string(),
                )
            })?;

        let verdict = parse_verdict(&content)?;
        debug!(
            same_person = verdict.same_person,
            confidence = verdict.confidence,
            "face comparison verdict"
        );
        Ok(verdict)
    }
}

//=========================================================================================
// Degraded Mode (no API key)
//=========================================================================================

/// The demo-mode collaborator used when no API key is configured: after a
/// short delay it reports a confident match, so the rest of the workflow
/// stays exercisable.
pub struct SimulatedFaceAdapter;

impl SimulatedFaceAdapter {
    pub fn new() -> Self {
        warn!(
            "GEMINI_API_KEY not set. Face comparisons will be simulated as successful matches; \
             provide the key to enable real face verification."
        );
        Self
    }
}

impl Default for SimulatedFaceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FaceComparisonService for SimulatedFaceAdapter {
    async fn compare(&self, _reference: &[u8], _capture: &[u8]) -> CoreResult<FaceMatch> {
        // Mimic a real round trip so callers see realistic latency.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        Ok(FaceMatch {
            same_person: true,
            confidence: 1.0,
        })
    }
}
