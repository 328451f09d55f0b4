use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pantry_core::{ModelError, VisionModel, VisionRequest, VisionResponse};
use pantry_logging::redact_secrets;

use super::{provider_body_excerpt, transport_error};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2-vision";

/// Ollama local vision provider.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct OllamaChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    images: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaReply>,
    eval_count: Option<u64>,
    prompt_eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct OllamaReply {
    content: Option<String>,
}

#[async_trait]
impl VisionModel for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    // Local daemon, no credential.
    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, ModelError> {
        let start = Instant::now();

        let body = OllamaChatRequest {
            model: &self.model,
            messages: vec![OllamaChatMessage {
                role: "user",
                content: &request.prompt,
                images: vec![&request.image_base64],
            }],
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        debug!(model = %self.model, "Sending image to Ollama");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), request.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %redact_secrets(&error_body),
                "Ollama rejected the request"
            );
            return Err(ModelError::Provider {
                provider: self.name().to_string(),
                status: status.as_u16(),
                body: provider_body_excerpt(&error_body),
            });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| transport_error(self.name(), request.timeout, e))?;

        let tokens_used = chat_response.eval_count.unwrap_or(0)
            + chat_response.prompt_eval_count.unwrap_or(0);

        Ok(VisionResponse {
            content: chat_response.message.and_then(|m| m.content),
            provider: self.name().to_string(),
            model: self.model.clone(),
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
