//! Image checks shared by the client and the relay.
//!
//! Both sides enforce the same limits so obviously bad input never reaches the network.

use std::path::Path;

use thiserror::Error;

/// Largest image either side accepts: 10 MiB.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRejection {
    #[error("declared type {0:?} is not an image")]
    NotAnImage(String),

    #[error("image is {len} bytes, limit is {MAX_IMAGE_BYTES}")]
    TooLarge { len: usize },
}

/// Whether a MIME type is for an image.
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Check a declared MIME type and byte length against the upload limits.
pub fn validate_image(mime: &str, len: usize) -> Result<(), ImageRejection> {
    if !is_image(mime) {
        return Err(ImageRejection::NotAnImage(mime.to_string()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(ImageRejection::TooLarge { len });
    }
    Ok(())
}

/// Detect a MIME type from a file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        "heic"         => "image/heic",
        "heif"         => "image/heif",
        "avif"         => "image/avif",
        "bmp"          => "image/bmp",
        "tiff" | "tif" => "image/tiff",

        "pdf"          => "application/pdf",
        "txt"          => "text/plain",
        "json"         => "application/json",

        _              => "application/octet-stream",
    }
}
