//! Vision model providers used by the relay to read receipt images.

pub mod providers;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use pantry_core::VisionModel;

pub use providers::groq::GroqProvider;
pub use providers::mock::MockVisionModel;
pub use providers::ollama::OllamaProvider;

/// Which backend serves vision requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Groq,
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" | "openai" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown model provider: {other}")),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Groq => f.write_str("groq"),
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

/// Everything needed to construct the process-wide model handle.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub groq_base_url: Option<String>,
    pub ollama_url: Option<String>,
    pub model: Option<String>,
}

/// Build the shared model handle once at startup.
pub fn build_provider(settings: &ProviderSettings) -> Arc<dyn VisionModel> {
    match settings.kind {
        ProviderKind::Groq => {
            let mut provider = GroqProvider::new(settings.api_key.clone());
            if let Some(url) = &settings.groq_base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &settings.model {
                provider = provider.with_model(model);
            }
            Arc::new(provider)
        }
        ProviderKind::Ollama => {
            let mut provider = OllamaProvider::new();
            if let Some(url) = &settings.ollama_url {
                provider = provider.with_base_url(url);
            }
            if let Some(model) = &settings.model {
                provider = provider.with_model(model);
            }
            Arc::new(provider)
        }
    }
}
