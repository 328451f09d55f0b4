use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pantry_core::{ModelError, VisionModel, VisionRequest, VisionResponse};

#[derive(Debug, Clone)]
enum Reply {
    Content(Option<String>),
    Failure { status: u16, body: String },
}

/// A vision model that returns canned replies. Counts how often it was called.
#[derive(Debug, Clone)]
pub struct MockVisionModel {
    reply: Reply,
    delay: Option<Duration>,
    configured: bool,
    calls: Arc<AtomicUsize>,
}

impl MockVisionModel {
    pub fn with_response(response: impl Into<String>) -> Self {
        Self::from_reply(Reply::Content(Some(response.into())))
    }

    /// Replies without any text content.
    pub fn empty() -> Self {
        Self::from_reply(Reply::Content(None))
    }

    /// Fails every call as the provider would on an API error.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self::from_reply(Reply::Failure {
            status,
            body: body.into(),
        })
    }

    fn from_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: None,
            configured: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for MockVisionModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn complete(&self, _request: &VisionRequest) -> Result<VisionResponse, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.reply {
            Reply::Content(content) => Ok(VisionResponse {
                content: content.clone(),
                provider: "mock".to_string(),
                model: "mock".to_string(),
                tokens_used: 0,
                latency_ms: 0,
            }),
            Reply::Failure { status, body } => Err(ModelError::Provider {
                provider: "mock".to_string(),
                status: *status,
                body: body.clone(),
            }),
        }
    }
}
