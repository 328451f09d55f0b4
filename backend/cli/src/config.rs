use std::path::PathBuf;

use anyhow::{Context, Result};

use pantry_client::DEFAULT_API_URL;
use pantry_relay::DEFAULT_CORS_ORIGINS;
use pantry_vision::{ProviderKind, ProviderSettings};

/// Pantry runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Relay bind address
    pub bind_address: String,
    /// Relay port
    pub port: u16,
    /// Vision model backend
    pub provider: ProviderSettings,
    /// Browser origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Base URL the scan client talks to
    pub api_url: String,
    /// Log level when `RUST_LOG` is unset
    pub log_level: String,
    /// Directory for rolling JSON logs
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            provider: ProviderSettings::default(),
            cors_origins: default_origins(),
            api_url: DEFAULT_API_URL.to_string(),
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match var("PORT") {
            Some(p) => p.trim().parse().with_context(|| format!("invalid PORT: {p}"))?,
            None => defaults.port,
        };

        let kind = match var("PANTRY_MODEL_PROVIDER") {
            Some(k) => k.parse::<ProviderKind>().map_err(anyhow::Error::msg)?,
            None => ProviderKind::default(),
        };

        let cors_origins = var("PANTRY_CORS_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.cors_origins);

        Ok(Self {
            bind_address: var("PANTRY_BIND").unwrap_or(defaults.bind_address),
            port,
            provider: ProviderSettings {
                kind,
                api_key: var("GROQ_API_KEY"),
                groq_base_url: var("GROQ_BASE_URL"),
                ollama_url: var("OLLAMA_URL"),
                model: var("PANTRY_MODEL"),
            },
            cors_origins,
            api_url: var("PANTRY_API_URL").unwrap_or(defaults.api_url),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_dir: var("PANTRY_LOG_DIR").map(PathBuf::from),
        })
    }
}

fn default_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect()
}
