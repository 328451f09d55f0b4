//! `pantry scan`: run the client pipeline on an image and print what was found.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use pantry_client::{FileBlob, ImageSource, ScanClient};

use crate::terminal_output::{note_info, report_error, report_items};

/// Load `path` as a picked file, or as a saved camera frame (data URL or base64 text).
pub async fn load_source(path: &Path, captured: bool) -> Result<ImageSource> {
    if captured {
        let frame = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading captured frame {}", path.display()))?;
        Ok(ImageSource::CapturedFrame(frame))
    } else {
        let blob = FileBlob::from_path(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(ImageSource::File(blob))
    }
}

pub async fn run(path: &Path, captured: bool, api_url: &str) -> Result<bool> {
    let source = load_source(path, captured).await?;
    let client = ScanClient::new(api_url);

    note_info(&format!("Analyzing {} ...", path.display()));
    match client.submit_image(source).await {
        Ok(items) => {
            info!(items = items.len(), "Scan finished");
            report_items(&items);
            Ok(true)
        }
        Err(err) => {
            report_error(&err);
            Ok(false)
        }
    }
}
