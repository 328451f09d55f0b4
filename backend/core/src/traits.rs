use std::time::Duration;

use async_trait::async_trait;

use crate::error::ModelError;

/// A multimodal model that can read an image and answer a text prompt.
///
/// Implementations are stateless and shared across concurrent requests.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Provider name (e.g., "groq", "ollama").
    fn name(&self) -> &str;

    /// Whether the credentials this provider needs are present.
    fn is_configured(&self) -> bool;

    /// Send one image with its prompt and return the model's text reply.
    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, ModelError>;
}

/// Request to a vision model.
#[derive(Debug, Clone)]
pub struct VisionRequest {
    pub prompt: String,
    pub image_base64: String,
    pub mime_type: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Response from a vision model.
#[derive(Debug, Clone)]
pub struct VisionResponse {
    /// `None` when the provider answered without any text.
    pub content: Option<String>,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}
