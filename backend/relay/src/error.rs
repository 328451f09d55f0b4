use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use pantry_core::{ErrorBody, ImageRejection, ModelError};

/// Every way an analysis request can fail at the relay.
///
/// The `Display` text is for server logs. Callers only ever see [`RelayError::body`].
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("request carried no image field")]
    MissingImage,

    #[error("uploaded file is {0:?}, not an image")]
    InvalidFileType(String),

    #[error("uploaded file exceeds the size limit")]
    FileTooLarge,

    #[error("malformed upload: {0}")]
    Upload(String),

    #[error("vision model failed: {0}")]
    Model(#[from] ModelError),

    #[error("vision model returned no content")]
    EmptyModelReply,

    #[error("vision model returned invalid data: {0}")]
    InvalidModelOutput(String),

    #[error("no route")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ImageRejection> for RelayError {
    fn from(rejection: ImageRejection) -> Self {
        match rejection {
            ImageRejection::NotAnImage(mime) => Self::InvalidFileType(mime),
            ImageRejection::TooLarge { .. } => Self::FileTooLarge,
        }
    }
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingImage | Self::InvalidFileType(_) | Self::Upload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Model(_)
            | Self::EmptyModelReply
            | Self::InvalidModelOutput(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The body sent to the client. Provider and internal detail never appear here.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::MissingImage => ErrorBody::new("No image provided", "Please provide an image file"),
            Self::InvalidFileType(_) => {
                ErrorBody::new("Invalid file type", "Please provide a valid image file")
            }
            Self::FileTooLarge => ErrorBody::new(
                "File too large",
                "The image file size exceeds the maximum limit of 10MB",
            ),
            Self::Upload(reason) => ErrorBody::new("Upload error", reason.clone()),
            Self::Model(_) => ErrorBody::new(
                "AI processing error",
                "Failed to analyze the image. Please try again.",
            ),
            Self::EmptyModelReply => {
                ErrorBody::new("Processing error", "Failed to analyze the image content")
            }
            Self::InvalidModelOutput(_) => {
                ErrorBody::new("Invalid response", "The image analysis produced invalid data")
            }
            Self::NotFound => {
                ErrorBody::new("Not found", "The requested endpoint does not exist")
            }
            Self::Internal(_) => {
                ErrorBody::new("Internal server error", "An unexpected error occurred")
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Analysis request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Rejected analysis request");
        }
        (status, Json(self.body().stamped())).into_response()
    }
}
