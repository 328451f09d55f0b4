pub mod groq;
pub mod mock;
pub mod ollama;

use std::time::Duration;

use pantry_core::ModelError;
use pantry_logging::redact_secrets;

const BODY_EXCERPT_CHARS: usize = 512;

fn transport_error(provider: &str, timeout: Duration, err: reqwest::Error) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout {
            provider: provider.to_string(),
            timeout,
        }
    } else if err.is_decode() {
        ModelError::Decode {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    } else {
        ModelError::Transport {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

/// Redacted, length-capped copy of a provider error body.
fn provider_body_excerpt(body: &str) -> String {
    redact_secrets(body).chars().take(BODY_EXCERPT_CHARS).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use axum::Router;
    use pantry_core::VisionRequest;
    use tokio::net::TcpListener;

    /// Serve `app` on an ephemeral port and return its base URL.
    pub async fn spawn_stub(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub fn sample_request() -> VisionRequest {
        VisionRequest {
            prompt: "list the food".into(),
            image_base64: "AAEC".into(),
            mime_type: "image/jpeg".into(),
            max_tokens: 4000,
            temperature: 0.5,
            timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_is_capped_and_redacted() {
        let body = format!("key gsk_{} {}", "a".repeat(40), "x".repeat(2000));
        let excerpt = provider_body_excerpt(&body);
        assert!(excerpt.chars().count() <= BODY_EXCERPT_CHARS);
        assert!(!excerpt.contains("gsk_aaaa"));
    }
}
