//! Model backend trait: the abstraction over remote text-generation services.
//!
//! A backend knows how to send a conversation to one named model and get the
//! generated text back, either as one blob or as a stream of fragments, and
//! how to list the models it currently serves.
//!
//! Implementations: Gemini (`generativelanguage.googleapis.com`) and any
//! OpenAI-compatible endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use crate::error::ProviderError;
use crate::turn::ConversationTurn;

/// A generation mode a model may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Incremental delivery of text fragments
    Streaming,
    /// A single blocking response
    NonStreaming,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming => write!(f, "streaming"),
            Self::NonStreaming => write!(f, "non_streaming"),
        }
    }
}

/// A model advertised by a backend's discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Identifier accepted by the generation endpoint
    pub identifier: String,

    /// Advertised generation modes. Empty means the backend did not say.
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

impl ModelDescriptor {
    pub fn new(identifier: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            identifier: identifier.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    /// Whether this model may be used for `capability`.
    ///
    /// Models with no advertised capabilities are considered eligible.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.is_empty() || self.capabilities.contains(&capability)
    }
}

/// Everything needed for one logical generation, independent of the model
/// that ends up serving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The ordered conversation, system instruction first
    pub conversation: Vec<ConversationTurn>,

    /// Models to try first, in order
    #[serde(default)]
    pub model_preferences: Vec<String>,

    /// Maximum tokens to generate
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_output_tokens() -> u32 {
    9000
}

fn default_temperature() -> f32 {
    0.7
}

impl GenerationRequest {
    pub fn new(conversation: Vec<ConversationTurn>) -> Self {
        Self {
            conversation,
            model_preferences: Vec::new(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
        }
    }

    /// The concrete call sent to a backend for `model`.
    pub fn for_model(&self, model: &str) -> BackendRequest {
        BackendRequest {
            model: model.to_string(),
            contents: self.conversation.clone(),
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        }
    }
}

/// A single generation call against one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendRequest {
    pub model: String,
    pub contents: Vec<ConversationTurn>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete (non-streaming) response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResponse {
    /// The generated text
    pub text: String,

    /// Which model actually responded
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single fragment of a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text delta; may be empty
    #[serde(default)]
    pub text: String,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn done(usage: Option<Usage>) -> Self {
        Self {
            text: String::new(),
            done: true,
            usage,
        }
    }
}

/// The receiving half of a streaming generation.
pub type ChunkReceiver =
    tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The core backend trait.
///
/// The resilient invoker drives every backend through this interface without
/// knowing which service sits behind it.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a request and get the complete generated text.
    async fn generate(&self, request: BackendRequest) -> std::result::Result<BackendResponse, ProviderError>;

    /// Send a request and get a stream of text fragments.
    ///
    /// Default implementation calls `generate()` and wraps the result as a single chunk.
    async fn generate_stream(
        &self,
        request: BackendRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let response = self.generate(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let _ = tx.send(Ok(StreamChunk::text(response.text))).await;
        let _ = tx.send(Ok(StreamChunk::done(response.usage))).await;
        Ok(rx)
    }

    /// List the models this backend currently serves.
    async fn list_models(&self) -> std::result::Result<Vec<ModelDescriptor>, ProviderError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::TurnRole;

    struct EchoBackend;

    #[async_trait]
    impl ModelBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: BackendRequest) -> std::result::Result<BackendResponse, ProviderError> {
            let last = request.contents.last().map(|t| t.text.clone()).unwrap_or_default();
            Ok(BackendResponse {
                text: last,
                model: request.model,
                usage: None,
            })
        }
    }

    #[test]
    fn request_defaults() {
        let req = GenerationRequest::new(vec![]);
        assert_eq!(req.max_output_tokens, 9000);
        assert!((req.temperature - 0.7).abs() < f32::EPSILON);
        assert!(req.model_preferences.is_empty());
    }

    #[test]
    fn for_model_copies_generation_settings() {
        let mut req = GenerationRequest::new(vec![ConversationTurn::transient(TurnRole::User, "hi")]);
        req.max_output_tokens = 128;
        req.temperature = 0.2;
        let call = req.for_model("gemini-2.5-flash");
        assert_eq!(call.model, "gemini-2.5-flash");
        assert_eq!(call.contents.len(), 1);
        assert_eq!(call.max_output_tokens, 128);
    }

    #[test]
    fn descriptor_capabilities() {
        let both = ModelDescriptor::new("a", [Capability::Streaming, Capability::NonStreaming]);
        assert!(both.supports(Capability::Streaming));

        let blocking = ModelDescriptor::new("b", [Capability::NonStreaming]);
        assert!(!blocking.supports(Capability::Streaming));
        assert!(blocking.supports(Capability::NonStreaming));

        let unknown = ModelDescriptor::new("c", []);
        assert!(unknown.supports(Capability::Streaming));
    }

    #[tokio::test]
    async fn default_stream_wraps_generate() {
        let backend = EchoBackend;
        let req = GenerationRequest::new(vec![ConversationTurn::transient(TurnRole::User, "hello")]);
        let mut rx = backend.generate_stream(req.for_model("m")).await.unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.text, "hello");
        assert!(!first.done);
        let last = rx.recv().await.unwrap().unwrap();
        assert!(last.done);
        assert!(rx.recv().await.is_none());
    }
}
