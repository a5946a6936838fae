//! HTTP service that converts an uploaded document to Markdown.
//!
//! | Method | Path       | Purpose                                  |
//! |--------|------------|------------------------------------------|
//! | GET    | `/`        | liveness, always 200                     |
//! | GET    | `/health`  | readiness, 503 until the converter exists |
//! | POST   | `/convert` | multipart `file` → `text/markdown`       |

pub mod config;
pub mod converter;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod state;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use state::AppState;

pub fn build_router(state: AppState) -> Router {
    let limits = state.limits();

    Router::new()
        .route("/", get(routes::index))
        .route("/health", get(routes::health))
        .route("/convert", post(routes::convert))
        .layer(DefaultBodyLimit::max(limits.max_bytes))
        .layer(middleware::from_fn_with_state(limits, upload::enforce_body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                })
                // Access log: one line per request, including extractor rejections.
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
        .with_state(state)
}
