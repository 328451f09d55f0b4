//! Relay HTTP server: routing, CORS, body limits, and graceful shutdown.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use pantry_core::{VisionModel, MAX_IMAGE_BYTES};

use crate::analyze::analyze_image;
use crate::error::RelayError;
use crate::extraction::ExtractionSettings;
use crate::health_api::get_health;

/// Room for multipart boundaries and part headers on top of the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Origins allowed by default: the local web client dev server.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "http://127.0.0.1:5173"];

/// How long in-flight requests get after a shutdown signal.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// State shared by every relay route. Holds no per-request data.
#[derive(Clone)]
pub struct RelayState {
    pub model: Arc<dyn VisionModel>,
    pub settings: ExtractionSettings,
}

impl RelayState {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self {
            model,
            settings: ExtractionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ExtractionSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Build the relay router with all API routes.
pub fn build_router(state: RelayState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/analyze-image", post(analyze_image))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + MULTIPART_OVERHEAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

/// CORS restricted to `origins`, `GET`/`POST`, and the `Content-Type` header.
pub fn cors_layer<S: AsRef<str>>(origins: &[S]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.as_ref()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = origin.as_ref(), "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(600))
}

async fn not_found() -> RelayError {
    RelayError::NotFound
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let reason = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    RelayError::Internal(reason).into_response()
}

/// Serve `app` until `shutdown` resolves, then drain in-flight requests.
///
/// Returns an error if the server fails, or if connections are still open
/// once `grace` has elapsed after the shutdown signal.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F, grace: Duration) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Relay listening");
    }

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        finished = &mut server => {
            finished??;
            return Ok(());
        }
        _ = shutdown => {}
    }

    info!("Shutting down gracefully");
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, &mut server).await {
        Ok(finished) => {
            finished??;
            info!("Server closed");
            Ok(())
        }
        Err(_) => {
            error!(
                grace_secs = grace.as_secs_f64(),
                "Could not close connections in time, forcing shutdown"
            );
            server.abort();
            Err(anyhow!("connections still open after {grace:?}"))
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
