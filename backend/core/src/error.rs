use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ErrorBody;

/// The single error shape surfaced to whoever renders a scan result.
///
/// Built once at the failure boundary and passed through unchanged. A status of `0`
/// means the client could not reach the network at all.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct PipelineError {
    pub message: String,
    #[serde(rename = "httpStatus")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl PipelineError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            details: None,
            timestamp: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn invalid_file_type() -> Self {
        Self::new("Invalid file type", 400).with_details("Please provide a valid image file")
    }

    pub fn file_too_large() -> Self {
        Self::new("File too large", 400)
            .with_details("Image file is too large. Please select an image under 10MB")
    }

    pub fn invalid_capture() -> Self {
        Self::new("Invalid capture", 400).with_details("Failed to process camera image")
    }

    pub fn server_unavailable() -> Self {
        Self::new("Server unavailable", 503)
            .with_details("The server is currently unavailable. Please try again in a few moments")
    }

    pub fn timeout() -> Self {
        Self::new("Request timeout", 408).with_details("The request took too long to complete")
    }

    pub fn offline() -> Self {
        Self::new("Network error", 0).with_details("Please check your internet connection")
    }

    pub fn network() -> Self {
        Self::new("Network error", 500)
            .with_details("Failed to communicate with the server. Please try again")
    }

    pub fn empty_result() -> Self {
        Self::new("Invalid response", 500).with_details("The server returned an empty result")
    }

    pub fn invalid_format() -> Self {
        Self::new("Invalid response format", 500)
            .with_details("The server returned data that is not a list of items")
    }

    pub fn unknown() -> Self {
        Self::new("Unknown error", 500).with_details("An unexpected error occurred")
    }

    /// Build an error from a non-2xx relay response.
    ///
    /// `body` is `None` when the response carried no parseable JSON error object.
    pub fn from_response(status: u16, body: Option<ErrorBody>) -> Self {
        let Some(body) = body else {
            return Self::unknown().with_status(status);
        };

        let message = if body.error.is_empty() {
            "Server error".to_string()
        } else {
            body.error
        };
        let details = body
            .details
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| "Failed to process the image".to_string());

        Self {
            message,
            status,
            details: Some(details),
            timestamp: body.timestamp,
        }
    }

    fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// One line suitable for a toast or a terminal note.
    pub fn display_message(&self) -> String {
        match &self.details {
            Some(details) if !details.is_empty() => format!("{}: {}", self.message, details),
            _ => self.message.clone(),
        }
    }
}

/// Failures talking to the external vision model.
///
/// These carry provider detail for server-side logs only; the relay never forwards
/// them to callers.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no credential configured for {provider}")]
    MissingCredential { provider: String },

    #[error("{provider} returned {status}: {body}")]
    Provider {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} request timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("{provider} transport error: {message}")]
    Transport { provider: String, message: String },

    #[error("failed to decode {provider} response: {message}")]
    Decode { provider: String, message: String },
}
