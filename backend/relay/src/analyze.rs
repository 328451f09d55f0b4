//! `POST /api/analyze-image`

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use tracing::{debug, info, instrument};

use pantry_core::{
    image::is_image, validate_image, AnalyzeResponse, ModelError, UploadedImage, IMAGE_FIELD,
};

use crate::error::RelayError;
use crate::extraction::validate_item_list;
use crate::server::RelayState;

#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn analyze_image(
    State(state): State<RelayState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, RelayError> {
    let multipart = multipart.map_err(|e| RelayError::Upload(e.body_text()))?;
    let image = read_image(multipart).await?;

    info!(mime = %image.mime_type, bytes = image.len(), "Analyzing image");

    let request = state.settings.request_for(image);
    let reply = tokio::time::timeout(state.settings.timeout, state.model.complete(&request))
        .await
        .map_err(|_| ModelError::Timeout {
            provider: state.model.name().to_string(),
            timeout: state.settings.timeout,
        })??;

    debug!(
        provider = %reply.provider,
        model = %reply.model,
        tokens = reply.tokens_used,
        latency_ms = reply.latency_ms,
        "Model replied"
    );

    let content = reply
        .content
        .filter(|c| !c.is_empty())
        .ok_or(RelayError::EmptyModelReply)?;

    validate_item_list(&content)?;

    Ok(Json(AnalyzeResponse {
        result: Some(content),
    }))
}

/// Pull the `image` field out of the form, skipping any other fields.
async fn read_image(mut multipart: Multipart) -> Result<UploadedImage, RelayError> {
    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !is_image(&mime) {
            return Err(RelayError::InvalidFileType(mime));
        }

        let data = field.bytes().await.map_err(upload_error)?;
        validate_image(&mime, data.len())?;
        return Ok(UploadedImage::new(mime, data));
    }

    Err(RelayError::MissingImage)
}

fn upload_error(err: MultipartError) -> RelayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        RelayError::FileTooLarge
    } else {
        RelayError::Upload(err.body_text())
    }
}
