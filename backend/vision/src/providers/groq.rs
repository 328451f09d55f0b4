use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pantry_core::{ModelError, VisionModel, VisionRequest, VisionResponse};
use pantry_logging::redact_secrets;

use super::{provider_body_excerpt, transport_error};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Groq vision provider.
///
/// Speaks the OpenAI chat-completions dialect, so any compatible endpoint works
/// through `with_base_url`.
pub struct GroqProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GroqProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
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

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

#[async_trait]
impl VisionModel for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, ModelError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ModelError::MissingCredential {
            provider: self.name().to_string(),
        })?;

        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: &request.prompt,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!(
                                "data:{};base64,{}",
                                request.mime_type, request.image_base64
                            ),
                        },
                    },
                ],
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        debug!(model = %self.model, "Sending image to Groq");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
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
                "Groq rejected the request"
            );
            return Err(ModelError::Provider {
                provider: self.name().to_string(),
                status: status.as_u16(),
                body: provider_body_excerpt(&error_body),
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| transport_error(self.name(), request.timeout, e))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);

        Ok(VisionResponse {
            content,
            provider: self.name().to_string(),
            model: self.model.clone(),
            tokens_used: chat_response
                .usage
                .and_then(|u| u.total_tokens)
                .unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
