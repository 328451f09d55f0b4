//! Pantry relay: accepts receipt images over HTTP, asks a vision model for the food
//! items on them, and returns the model's JSON array or a structured error.

pub mod analyze;
pub mod error;
pub mod extraction;
pub mod health_api;
pub mod server;

pub use error::RelayError;
pub use extraction::{ExtractionSettings, EXTRACTION_PROMPT};
pub use server::{
    build_router, cors_layer, serve, shutdown_signal, RelayState, DEFAULT_CORS_ORIGINS,
    SHUTDOWN_GRACE,
};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use pantry_core::VisionModel;
    use tokio::net::TcpListener;

    use crate::server::{build_router, cors_layer, RelayState, DEFAULT_CORS_ORIGINS};

    /// Run a relay backed by `model` on an ephemeral port; returns `http://host:port`.
    pub async fn spawn_relay(model: Arc<dyn VisionModel>) -> String {
        spawn_relay_with(RelayState::new(model)).await
    }

    pub async fn spawn_relay_with(state: RelayState) -> String {
        let app = build_router(state, cors_layer(DEFAULT_CORS_ORIGINS));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub fn image_form(bytes: Vec<u8>, mime: &str) -> reqwest::multipart::Form {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name("receipt.jpg")
            .mime_str(mime)
            .unwrap();
        reqwest::multipart::Form::new().part("image", part)
    }
}
