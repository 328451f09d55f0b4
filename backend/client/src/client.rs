//! The scan client: validates an image, gates on relay health, uploads once,
//! and turns whatever comes back into items or a [`PipelineError`].

use std::time::Duration;

use reqwest::{header::ACCEPT, multipart, StatusCode};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use pantry_core::{
    validate_image, AnalyzeResponse, ErrorBody, ExtractedItem, HealthReport, ImageRejection,
    PipelineError, IMAGE_FIELD,
};

use crate::backoff::{with_backoff, BackoffPolicy};
use crate::source::{FileBlob, ImageSource};

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a single health probe attempt failed.
#[derive(Debug, Error)]
enum ProbeError {
    #[error("health endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("health endpoint returned {0}")]
    Status(StatusCode),

    #[error("server reported status {0:?}")]
    Unhealthy(String),
}

/// Client for the relay's analysis pipeline.
#[derive(Debug, Clone)]
pub struct ScanClient {
    http: reqwest::Client,
    base_url: String,
    backoff: BackoffPolicy,
    upload_timeout: Duration,
    health_timeout: Duration,
}

impl Default for ScanClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ScanClient {
    /// `base_url` is the API root, e.g. `http://localhost:3000/api`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            backoff: BackoffPolicy::default(),
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run the whole pipeline for one image.
    #[instrument(skip_all)]
    pub async fn submit_image(
        &self,
        source: impl Into<ImageSource>,
    ) -> Result<Vec<ExtractedItem>, PipelineError> {
        let blob = source.into().into_blob()?;
        validate_image(&blob.mime_type, blob.len()).map_err(|rejection| match rejection {
            ImageRejection::NotAnImage(_) => PipelineError::invalid_file_type(),
            ImageRejection::TooLarge { .. } => PipelineError::file_too_large(),
        })?;

        self.check_health().await?;

        let result = self.upload(blob).await?;
        let items = parse_items(&result)?;
        info!(items = items.len(), "Receipt analyzed");
        Ok(items)
    }

    /// Probe `GET /health` under the backoff policy. Fails with 503 once every attempt
    /// has failed or reported an unhealthy status.
    pub async fn check_health(&self) -> Result<HealthReport, PipelineError> {
        with_backoff(&self.backoff, |attempt| async move {
            debug!(attempt = attempt + 1, "Probing relay health");
            self.probe_health().await
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "Relay unavailable, not uploading");
            PipelineError::server_unavailable()
        })
    }

    async fn probe_health(&self) -> Result<HealthReport, ProbeError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .header(ACCEPT, "application/json")
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status()));
        }

        let report: HealthReport = response
            .json()
            .await
            .map_err(|e| ProbeError::Unreachable(e.to_string()))?;

        if report.is_healthy() {
            Ok(report)
        } else {
            Err(ProbeError::Unhealthy(report.status))
        }
    }

    /// Upload once, bounded by the upload timeout. Returns the raw `result` string.
    pub(crate) async fn upload(&self, blob: FileBlob) -> Result<String, PipelineError> {
        let part = multipart::Part::bytes(blob.data.to_vec())
            .file_name(blob.name)
            .mime_str(&blob.mime_type)
            .map_err(|_| PipelineError::invalid_file_type())?;
        let form = multipart::Form::new().part(IMAGE_FIELD, part);

        let exchange = async {
            let response = self
                .http
                .post(format!("{}/analyze-image", self.base_url))
                .header(ACCEPT, "application/json")
                .multipart(form)
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        // Dropping `exchange` on timeout closes the connection.
        let (status, body) = match tokio::time::timeout(self.upload_timeout, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(transport_failure(&e)),
            Err(_) => {
                warn!(timeout_secs = self.upload_timeout.as_secs_f64(), "Upload timed out");
                return Err(PipelineError::timeout());
            }
        };

        if !status.is_success() {
            let error_body = serde_json::from_slice::<ErrorBody>(&body).ok();
            return Err(PipelineError::from_response(status.as_u16(), error_body));
        }

        let payload: AnalyzeResponse =
            serde_json::from_slice(&body).map_err(|_| PipelineError::invalid_format())?;

        payload
            .result
            .filter(|r| !r.is_empty())
            .ok_or_else(PipelineError::empty_result)
    }
}

fn transport_failure(err: &reqwest::Error) -> PipelineError {
    if err.is_connect() {
        warn!(error = %err, "Could not connect to relay");
        PipelineError::offline()
    } else {
        warn!(error = %err, "Upload failed in transit");
        PipelineError::network()
    }
}

/// Parse the relay's `result` string. Anything but a JSON array is rejected; entries
/// that are not item objects are skipped rather than failing the scan.
pub fn parse_items(result: &str) -> Result<Vec<ExtractedItem>, PipelineError> {
    let value: serde_json::Value =
        serde_json::from_str(result).map_err(|_| PipelineError::invalid_format())?;
    let serde_json::Value::Array(entries) = value else {
        return Err(PipelineError::invalid_format());
    };

    let total = entries.len();
    let items: Vec<ExtractedItem> = entries
        .into_iter()
        .filter(serde_json::Value::is_object)
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if items.len() < total {
        warn!(skipped = total - items.len(), "Ignoring entries that are not items");
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{
        http::StatusCode as AxumStatus,
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use pantry_core::VisionModel;
    use pantry_relay::{build_router, cors_layer, RelayState, DEFAULT_CORS_ORIGINS};
    use pantry_vision::MockVisionModel;
    use tokio::net::TcpListener;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            multiplier: 2.0,
        }
    }

    fn receipt() -> FileBlob {
        FileBlob::new("receipt.jpg", "image/jpeg", JPEG.to_vec())
    }

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    async fn spawn_relay(model: Arc<dyn VisionModel>) -> String {
        spawn(build_router(RelayState::new(model), cors_layer(DEFAULT_CORS_ORIGINS))).await
    }

    /// A relay stand-in whose health endpoint always answers ok and whose analyze
    /// endpoint replies with `status` and `body`.
    async fn spawn_stub(status: u16, body: &'static str, content_type: &'static str) -> String {
        let app = Router::new()
            .route("/api/health", get(|| async { Json(HealthReport::ok(true)) }))
            .route(
                "/api/analyze-image",
                post(move || async move {
                    (
                        AxumStatus::from_u16(status).unwrap(),
                        [("content-type", content_type)],
                        body,
                    )
                        .into_response()
                }),
            );
        spawn(app).await
    }

    #[tokio::test]
    async fn round_trips_items_through_the_relay() {
        let model = MockVisionModel::with_response(
            r#"[{"name":"milk","quantity":1,"unit":"liter"},{"name":"apples","quantity":"6","unit":"pieces"}]"#,
        );
        let url = spawn_relay(Arc::new(model.clone())).await;

        let items = ScanClient::new(url).submit_image(receipt()).await.unwrap();

        assert_eq!(
            items,
            vec![
                ExtractedItem::new("milk", 1.0, "liter"),
                ExtractedItem::new("apples", 6.0, "pieces"),
            ]
        );
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn captured_frame_is_uploaded_as_jpeg() {
        let model = MockVisionModel::with_response("[]");
        let url = spawn_relay(Arc::new(model.clone())).await;

        let items = ScanClient::new(url)
            .submit_image(ImageSource::CapturedFrame(
                "data:image/jpeg;base64,/9j/4AAQ".into(),
            ))
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn non_image_is_rejected_before_any_request() {
        // Nothing listens here; reaching the network would fail with a different error.
        let client = ScanClient::new("http://127.0.0.1:9/api").with_backoff(fast_backoff());
        let err = client
            .submit_image(FileBlob::new("notes.txt", "text/plain", b"hello".to_vec()))
            .await
            .unwrap_err();

        assert_eq!(err.status, 400);
        assert_eq!(err.message, "Invalid file type");
    }

    #[tokio::test]
    async fn oversized_image_is_rejected_locally() {
        let client = ScanClient::new("http://127.0.0.1:9/api").with_backoff(fast_backoff());
        let big = vec![0u8; pantry_core::MAX_IMAGE_BYTES + 1];
        let err = client
            .submit_image(FileBlob::new("huge.jpg", "image/jpeg", big))
            .await
            .unwrap_err();

        assert_eq!(err.status, 400);
        assert_eq!(err.message, "File too large");
    }

    #[tokio::test]
    async fn unhealthy_relay_gets_no_upload() {
        let health_hits = Arc::new(AtomicUsize::new(0));
        let analyze_hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/api/health",
                get({
                    let hits = Arc::clone(&health_hits);
                    move || async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        AxumStatus::SERVICE_UNAVAILABLE
                    }
                }),
            )
            .route(
                "/api/analyze-image",
                post({
                    let hits = Arc::clone(&analyze_hits);
                    move || async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Json(AnalyzeResponse {
                            result: Some("[]".into()),
                        })
                    }
                }),
            );
        let url = spawn(app).await;

        let err = ScanClient::new(url)
            .with_backoff(fast_backoff())
            .submit_image(receipt())
            .await
            .unwrap_err();

        assert_eq!(err.status, 503);
        assert_eq!(err.message, "Server unavailable");
        assert_eq!(health_hits.load(Ordering::SeqCst), 3);
        assert_eq!(analyze_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_ok_health_status_counts_as_failure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/api/health",
            get({
                let hits = Arc::clone(&hits);
                move || async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let mut report = HealthReport::ok(false);
                    report.status = "degraded".into();
                    Json(report)
                }
            }),
        );
        let url = spawn(app).await;

        let err = ScanClient::new(url)
            .with_backoff(fast_backoff())
            .check_health()
            .await
            .unwrap_err();

        assert_eq!(err.status, 503);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn health_recovers_on_second_probe() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/api/health",
                get({
                    let hits = Arc::clone(&hits);
                    move || async move {
                        if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                            AxumStatus::SERVICE_UNAVAILABLE.into_response()
                        } else {
                            Json(HealthReport::ok(true)).into_response()
                        }
                    }
                }),
            )
            .route(
                "/api/analyze-image",
                post(|| async {
                    Json(AnalyzeResponse {
                        result: Some(r#"[{"name":"bread","quantity":1,"unit":"loaf"}]"#.into()),
                    })
                }),
            );
        let url = spawn(app).await;

        let items = ScanClient::new(url)
            .with_backoff(fast_backoff())
            .submit_image(receipt())
            .await
            .unwrap();

        assert_eq!(items, vec![ExtractedItem::new("bread", 1.0, "loaf")]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_relay_times_out_with_408() {
        let model = MockVisionModel::with_response("[]").with_delay(Duration::from_secs(2));
        let url = spawn_relay(Arc::new(model.clone())).await;

        let err = ScanClient::new(url)
            .with_upload_timeout(Duration::from_millis(200))
            .submit_image(receipt())
            .await
            .unwrap_err();

        assert_eq!(err.status, 408);
        assert_eq!(err.message, "Request timeout");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn relay_error_body_is_surfaced() {
        let url = spawn_relay(Arc::new(MockVisionModel::with_response("not json"))).await;

        let err = ScanClient::new(url).submit_image(receipt()).await.unwrap_err();

        assert_eq!(err.status, 500);
        assert_eq!(err.message, "Invalid response");
        assert!(err.details.is_some());
        assert!(err.timestamp.is_some());
    }

    #[tokio::test]
    async fn missing_result_is_empty_result() {
        let url = spawn_stub(200, "{}", "application/json").await;

        let err = ScanClient::new(url).submit_image(receipt()).await.unwrap_err();

        assert_eq!(err.status, 500);
        assert_eq!(err.display_message(), "Invalid response: The server returned an empty result");
    }

    #[tokio::test]
    async fn non_array_result_is_invalid_format() {
        let url = spawn_stub(200, r#"{"result":"{\"name\":\"milk\"}"}"#, "application/json").await;

        let err = ScanClient::new(url).submit_image(receipt()).await.unwrap_err();

        assert_eq!(err.status, 500);
        assert_eq!(err.message, "Invalid response format");
    }

    #[tokio::test]
    async fn plain_text_failure_keeps_the_status() {
        let url = spawn_stub(502, "Bad Gateway", "text/plain").await;

        let err = ScanClient::new(url).submit_image(receipt()).await.unwrap_err();

        assert_eq!(err.status, 502);
        assert_eq!(err.message, "Unknown error");
    }

    #[tokio::test]
    async fn refused_connection_is_offline() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ScanClient::new(format!("http://{addr}/api"))
            .upload(receipt())
            .await
            .unwrap_err();

        assert_eq!(err.status, 0);
        assert_eq!(err.message, "Network error");
    }

    #[test]
    fn parse_items_requires_an_array() {
        assert_eq!(parse_items("[]").unwrap(), Vec::new());
        assert_eq!(parse_items(r#"{"items":[]}"#).unwrap_err().status, 500);
        assert_eq!(parse_items("milk, eggs").unwrap_err().status, 500);
    }

    #[test]
    fn parse_items_tolerates_loose_entries() {
        let items = parse_items(
            r#"[{"name":"bread","quantity":1,"unit":null},
                {"name":"butter","quantity":"1/2","unit":"lb"},
                {"name":"salt","unit":"box"},
                "not an item"]"#,
        )
        .unwrap();

        assert_eq!(
            items,
            vec![
                ExtractedItem::new("bread", 1.0, ""),
                ExtractedItem::new("butter", 0.5, "lb"),
                ExtractedItem::without_quantity("salt", "box"),
            ]
        );
    }

    #[tokio::test]
    async fn loose_items_from_the_relay_still_succeed() {
        let model = MockVisionModel::with_response(
            r#"[{"name":"bread","quantity":1,"unit":null},{"name":"salt"}]"#,
        );
        let url = spawn_relay(Arc::new(model)).await;

        let items = ScanClient::new(url).submit_image(receipt()).await.unwrap();

        assert_eq!(
            items,
            vec![
                ExtractedItem::new("bread", 1.0, ""),
                ExtractedItem::without_quantity("salt", ""),
            ]
        );
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        assert_eq!(ScanClient::new("http://x/api/").base_url(), "http://x/api");
    }
}
