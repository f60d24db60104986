//! Google Gemini backend (`generativelanguage.googleapis.com`).
//!
//! Supports:
//! - `generateContent` (non-streaming)
//! - `streamGenerateContent?alt=sse` (streaming)
//! - model discovery via `GET /models`
//!
//! Each endpoint has one canonical response schema; anything that does not
//! match it is an `InvalidResponse`.

use async_trait::async_trait;
use bolty_core::error::ProviderError;
use bolty_core::provider::*;
use bolty_core::turn::{ConversationTurn, TurnRole};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::http::{self, SseLines};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Upper bound on discovery pages fetched per `list_models` call.
const MAX_MODEL_PAGES: usize = 10;

pub struct GeminiBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            client: http::client(Duration::from_secs(120)),
        }
    }

    /// Use a custom base URL (e.g., a proxy or a test server).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http::client(timeout);
        self
    }

    fn to_api_contents(turns: &[ConversationTurn]) -> Vec<ApiContent> {
        turns
            .iter()
            .map(|t| ApiContent {
                role: Some(
                    match t.role {
                        TurnRole::User => "user",
                        TurnRole::Model => "model",
                    }
                    .into(),
                ),
                parts: vec![ApiPart {
                    text: Some(t.text.clone()),
                }],
            })
            .collect()
    }

    fn request_body(request: &BackendRequest) -> GenerateBody {
        GenerateBody {
            contents: Self::to_api_contents(&request.contents),
            generation_config: GenerationConfig {
                max_output_tokens: request.max_output_tokens,
                temperature: request.temperature,
            },
        }
    }

    /// Map Gemini's method names onto capabilities. `None` means the model
    /// advertises methods but none of them generate text.
    fn capabilities(methods: &[String]) -> Option<Vec<Capability>> {
        if methods.is_empty() {
            return Some(Vec::new());
        }
        let caps: Vec<Capability> = methods
            .iter()
            .filter_map(|m| match m.as_str() {
                "generateContent" => Some(Capability::NonStreaming),
                "streamGenerateContent" => Some(Capability::Streaming),
                _ => None,
            })
            .collect();
        if caps.is_empty() { None } else { Some(caps) }
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: BackendRequest,
    ) -> std::result::Result<BackendResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);

        debug!(model = %request.model, turns = request.contents.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(http::send_error)?;

        if !response.status().is_success() {
            return Err(http::status_error(response, &request.model).await);
        }

        let api_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let text = api_response.text().ok_or_else(|| match api_response.block_reason() {
            Some(reason) => ProviderError::InvalidResponse(format!("Prompt blocked: {reason}")),
            None => ProviderError::InvalidResponse("No candidates in response".into()),
        })?;

        Ok(BackendResponse {
            text,
            model: api_response.model_version.unwrap_or(request.model),
            usage: api_response.usage_metadata.map(Into::into),
        })
    }

    async fn generate_stream(
        &self,
        request: BackendRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url, request.model
        );

        debug!(model = %request.model, turns = request.contents.len(), "Sending streamGenerateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Accept", "text/event-stream")
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(http::send_error)?;

        if !response.status().is_success() {
            return Err(http::status_error(response, &request.model).await);
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let model = request.model.clone();

        // Spawn task to read the SSE byte stream and forward text deltas
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLines::default();
            let mut usage = None;

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let err = if e.is_timeout() {
                            ProviderError::Timeout(e.to_string())
                        } else {
                            ProviderError::StreamInterrupted(e.to_string())
                        };
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                };

                for data in lines.push(&bytes) {
                    if !forward(&tx, &model, &data, &mut usage).await {
                        return;
                    }
                }
            }

            if let Some(data) = lines.finish()
                && !forward(&tx, &model, &data, &mut usage).await
            {
                return;
            }

            let _ = tx.send(Ok(StreamChunk::done(usage))).await;
        });

        Ok(rx)
    }

    async fn list_models(&self) -> std::result::Result<Vec<ModelDescriptor>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let mut descriptors = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_MODEL_PAGES {
            let mut req = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let response = req.send().await.map_err(http::send_error)?;
            if !response.status().is_success() {
                return Err(http::status_error(response, "models").await);
            }

            let page: ModelList = response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse model list: {e}")))?;

            for model in page.models {
                let Some(caps) = Self::capabilities(&model.supported_generation_methods) else {
                    trace!(model = %model.name, "Skipping model without text generation methods");
                    continue;
                };
                let id = model.name.strip_prefix("models/").unwrap_or(&model.name);
                descriptors.push(ModelDescriptor::new(id, caps));
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(descriptors)
    }
}

/// Parse one SSE payload and forward its text. Returns false once the
/// receiver is gone or the payload was rejected.
async fn forward(
    tx: &tokio::sync::mpsc::Sender<std::result::Result<StreamChunk, ProviderError>>,
    model: &str,
    data: &str,
    usage: &mut Option<Usage>,
) -> bool {
    match serde_json::from_str::<GenerateResponse>(data) {
        Ok(mut resp) => {
            if let Some(u) = resp.usage_metadata.take() {
                *usage = Some(u.into());
            }
            if let Some(reason) = resp.block_reason() {
                let _ = tx
                    .send(Err(ProviderError::InvalidResponse(format!(
                        "Prompt blocked: {reason}"
                    ))))
                    .await;
                return false;
            }
            match resp.text() {
                Some(text) if !text.is_empty() => tx.send(Ok(StreamChunk::text(text))).await.is_ok(),
                _ => true,
            }
        }
        Err(e) => {
            let _ = tx
                .send(Err(ProviderError::InvalidResponse(format!(
                    "{model}: unparseable stream event: {e}"
                ))))
                .await;
            false
        }
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
struct GenerateBody {
    contents: Vec<ApiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        Some(
            candidate
                .content
                .as_ref()
                .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
                .unwrap_or_default(),
        )
    }

    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

impl From<UsageMetadata> for Usage {
    fn from(u: UsageMetadata) -> Self {
        Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelList {
    #[serde(default)]
    models: Vec<ApiModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiModel {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}
