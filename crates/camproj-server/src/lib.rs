//! HTTP surface for camproj.
//!
//! Routes:
//! - `GET /health`
//! - `POST /detect` (multipart, field `image`)
//! - `POST /detect-base64` (`{"image": "<base64 or data URL>"}`)
//! - `POST /homography` (`{"camera_points": [..], "projector_points": [..]}`)
//!
//! Detection and estimation run on the blocking pool; the router itself only
//! does I/O and JSON.

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

mod handlers;
mod state;
pub mod wire;

pub use state::AppState;

/// Origins allowed by default (local front-end dev and preview servers).
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:4173"];

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("invalid CORS origin {0:?}")]
    InvalidOrigin(String),
    #[error(transparent)]
    Config(#[from] camproj::config::ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Transport settings, separate from the detector/estimator configuration.
#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub allowed_origins: Vec<String>,
    /// Upper bound on request bodies (uploads and JSON).
    pub max_body_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, ServerError> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).map_err(|_| ServerError::InvalidOrigin(o.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    // credentials rule out wildcards, so methods and headers mirror the request
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Build the application router.
pub fn router(state: AppState, opts: &ServerOptions) -> Result<Router, ServerError> {
    Ok(Router::new()
        .route("/health", get(handlers::health))
        .route("/detect", post(handlers::detect_upload))
        .route("/detect-base64", post(handlers::detect_base64))
        .route("/homography", post(handlers::homography))
        .layer(DefaultBodyLimit::max(opts.max_body_bytes))
        .layer(cors_layer(&opts.allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Bind `addr` and serve `app` until Ctrl-C.
pub async fn serve(app: Router, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparsable_origin() {
        let err = cors_layer(&["http://ok".to_string(), "bad\norigin".to_string()])
            .expect_err("newline is not a header value");
        assert!(matches!(err, ServerError::InvalidOrigin(o) if o.contains("bad")));
    }
}
