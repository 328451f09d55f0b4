//! Where a receipt image comes from: a camera snapshot or a file the user picked.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;

use pantry_core::{detect_mime_type, PipelineError};

/// MIME type assigned to every camera snapshot.
pub const CAPTURE_MIME: &str = "image/jpeg";
const CAPTURE_FILE_NAME: &str = "webcam-image.jpg";

/// A user-selected file with its declared type.
#[derive(Debug, Clone)]
pub struct FileBlob {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(name, detect_mime_type(path), data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Input to [`crate::ScanClient::submit_image`].
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An encoded camera snapshot: a `data:` URL or bare base64.
    CapturedFrame(String),
    File(FileBlob),
}

impl ImageSource {
    /// Normalize to a file blob. Camera snapshots are always declared `image/jpeg`.
    pub fn into_blob(self) -> Result<FileBlob, PipelineError> {
        match self {
            Self::File(blob) => Ok(blob),
            Self::CapturedFrame(encoded) => {
                let data = decode_frame(&encoded)?;
                Ok(FileBlob::new(CAPTURE_FILE_NAME, CAPTURE_MIME, data))
            }
        }
    }
}

impl From<FileBlob> for ImageSource {
    fn from(blob: FileBlob) -> Self {
        Self::File(blob)
    }
}

fn decode_frame(encoded: &str) -> Result<Bytes, PipelineError> {
    let payload = match encoded.split_once(',') {
        Some((header, data)) if header.starts_with("data:") => data,
        _ => encoded,
    };
    let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    match STANDARD.decode(payload.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => Ok(Bytes::from(bytes)),
        _ => Err(PipelineError::invalid_capture()),
    }
}
