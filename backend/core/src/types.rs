use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Multipart field that carries the receipt image on `POST /api/analyze-image`.
pub const IMAGE_FIELD: &str = "image";

/// One food entry extracted from a receipt by the vision model.
///
/// Deserialization is lenient: models drift from the requested shape, and one odd
/// field should not cost the user the whole scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub name: String,
    /// `None` when the model gave no usable amount.
    #[serde(
        default,
        deserialize_with = "lenient_quantity",
        skip_serializing_if = "Option::is_none"
    )]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub unit: String,
}

impl ExtractedItem {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: Some(quantity),
            unit: unit.into(),
        }
    }

    pub fn without_quantity(name: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: None,
            unit: unit.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Number(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

// Accepts 2, "2", " 2.5 " and "1/2". Anything else, null included, is no quantity.
fn lenient_quantity<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Number(n) => Some(n),
        Loose::Text(s) => parse_amount(&s),
        Loose::Other(_) => None,
    })
}

fn parse_amount(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(n) = text.parse::<f64>() {
        return n.is_finite().then_some(n);
    }
    let (num, den) = text.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den != 0.0).then(|| num / den).filter(|n| n.is_finite())
}

// null, numbers and nested values all become "".
fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(s) => s,
        Loose::Number(_) | Loose::Other(_) => String::new(),
    })
}

/// An image held in memory for the duration of a single request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

/// Success body of `POST /api/analyze-image`.
///
/// `result` holds the model's JSON array exactly as the model wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub result: Option<String>,
}

/// Error body returned by every failing relay endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
            timestamp: None,
        }
    }

    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub services: ServiceStatus,
}

impl HealthReport {
    pub fn ok(model_backend: bool) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            services: ServiceStatus { model_backend },
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    /// Whether the model credential is configured. Not a live upstream check.
    pub model_backend: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_model_items() {
        let items: Vec<ExtractedItem> =
            serde_json::from_str(r#"[{"name":"milk","quantity":1,"unit":"liter"}]"#).unwrap();
        assert_eq!(items, vec![ExtractedItem::new("milk", 1.0, "liter")]);
    }

    #[test]
    fn accepts_quoted_quantity_and_missing_unit() {
        let item: ExtractedItem =
            serde_json::from_str(r#"{"name":"eggs","quantity":" 12 "}"#).unwrap();
        assert_eq!(item.quantity, Some(12.0));
        assert_eq!(item.unit, "");
    }

    #[test]
    fn null_unit_reads_as_empty() {
        let item: ExtractedItem =
            serde_json::from_str(r#"{"name":"bread","quantity":1,"unit":null}"#).unwrap();
        assert_eq!(item, ExtractedItem::new("bread", 1.0, ""));
    }

    #[test]
    fn fractional_string_quantity_is_evaluated() {
        let item: ExtractedItem =
            serde_json::from_str(r#"{"name":"butter","quantity":"1/2","unit":"lb"}"#).unwrap();
        assert_eq!(item.quantity, Some(0.5));
        assert_eq!(parse_amount("3/0"), None);
    }

    #[test]
    fn missing_or_unusable_quantity_is_none() {
        let missing: ExtractedItem =
            serde_json::from_str(r#"{"name":"salt","unit":"box"}"#).unwrap();
        assert_eq!(missing, ExtractedItem::without_quantity("salt", "box"));

        let wordy: ExtractedItem =
            serde_json::from_str(r#"{"name":"eggs","quantity":"a dozen","unit":""}"#).unwrap();
        assert_eq!(wordy.quantity, None);

        let null: ExtractedItem =
            serde_json::from_str(r#"{"name":"eggs","quantity":null}"#).unwrap();
        assert_eq!(null.quantity, None);
    }

    #[test]
    fn missing_quantity_is_omitted_when_serialized() {
        let json = serde_json::to_string(&ExtractedItem::without_quantity("salt", "")).unwrap();
        assert_eq!(json, r#"{"name":"salt","unit":""}"#);
    }

    #[test]
    fn health_report_uses_camel_case() {
        let json = serde_json::to_value(HealthReport::ok(true)).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["services"]["modelBackend"], true);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn error_body_omits_empty_fields() {
        let json = serde_json::to_string(&ErrorBody {
            error: "Not found".into(),
            details: None,
            timestamp: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"error":"Not found"}"#);
    }

    #[test]
    fn base64_encodes_image_bytes() {
        let image = UploadedImage::new("image/png", vec![0u8, 1, 2]);
        assert_eq!(image.to_base64(), "AAEC");
        assert_eq!(image.len(), 3);
    }
}
