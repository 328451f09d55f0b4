pub mod error;
pub mod image;
pub mod traits;
pub mod types;

pub use error::{ModelError, PipelineError};
pub use image::{detect_mime_type, validate_image, ImageRejection, MAX_IMAGE_BYTES};
pub use traits::{VisionModel, VisionRequest, VisionResponse};
pub use types::{
    AnalyzeResponse, ErrorBody, ExtractedItem, HealthReport, ServiceStatus, UploadedImage,
    IMAGE_FIELD,
};
