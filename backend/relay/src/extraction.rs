//! The fixed instruction sent with every receipt image, and the check applied to
//! whatever the model sends back.

use std::time::Duration;

use pantry_core::{UploadedImage, VisionRequest};

use crate::error::RelayError;

/// Non-receipt images must produce `[]`, never prose.
pub const EXTRACTION_PROMPT: &str = "Analyze this receipt image and extract all food items \
with their quantities. Format the response as a JSON array with objects containing 'name' \
(normalized product name), 'quantity', and 'unit'. Only include food items. If the image is \
not a food receipt, return an empty array. Respond with the JSON array only, for example: \
[{\"name\": \"apple\", \"quantity\": 1, \"unit\": \"kg\"}]";

/// Decoding parameters for extraction calls.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4000,
            temperature: 0.5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ExtractionSettings {
    /// Build the model request, consuming the image so its bytes are released
    /// as soon as they are encoded.
    pub fn request_for(&self, image: UploadedImage) -> VisionRequest {
        VisionRequest {
            prompt: EXTRACTION_PROMPT.to_string(),
            image_base64: image.to_base64(),
            mime_type: image.mime_type,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

/// Accept the model's text only if it is a JSON array. Element shape is left to the client.
pub fn validate_item_list(content: &str) -> Result<(), RelayError> {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(serde_json::Value::Array(_)) => Ok(()),
        Ok(other) => Err(RelayError::InvalidModelOutput(format!(
            "expected a JSON array, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(RelayError::InvalidModelOutput(e.to_string())),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
