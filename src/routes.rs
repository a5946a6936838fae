use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::converter::ConversionError;
use crate::error::AppError;
use crate::models::Readiness;
use crate::state::AppState;
use crate::upload::read_upload;

pub const LIVENESS_MESSAGE: &str = "Markitdown server is running.";

// ── Liveness / readiness ─────────────────────────────────────────────────────

pub async fn index() -> impl IntoResponse {
    LIVENESS_MESSAGE
}

pub async fn health(State(state): State<AppState>) -> Response {
    match state.converter() {
        Some(_) => (StatusCode::OK, Json(Readiness::ready())).into_response(),
        None => {
            tracing::warn!("readiness check failed: converter is not initialised");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness::not_ready("converter is not initialised")),
            )
                .into_response()
        }
    }
}

// ── Conversion ───────────────────────────────────────────────────────────────

pub async fn convert(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart, state.limits()).await {
        Ok(upload) => upload,
        Err(e) => {
            tracing::warn!(status = %e.status(), reason = %e, "rejected upload");
            return e.into_response();
        }
    };

    let filename = upload.filename.clone();
    tracing::info!(filename = %filename, size = upload.bytes.len(), "Processing file");

    let outcome = run_conversion(&state, upload).await;
    if let Some(budget) = &state.budget {
        budget.record();
    }

    match outcome {
        Ok(markdown) => {
            tracing::info!(filename = %filename, "Successfully converted file");
            markdown_response(markdown)
        }
        Err(e) => {
            tracing::error!(filename = %filename, error = ?e, "Conversion failed: {}", e);
            e.into_response()
        }
    }
}

async fn run_conversion(
    state: &AppState,
    upload: crate::models::ConversionRequest,
) -> Result<String, AppError> {
    let converter = state.converter().ok_or(ConversionError::Unavailable)?;

    // One deadline covers both queueing for a permit and the conversion itself.
    let deadline = tokio::time::Instant::now() + state.request_timeout;
    let permits = state.permits.clone();
    let work = async move {
        let permit = permits
            .acquire_owned()
            .await
            .map_err(|e| ConversionError::Internal(e.to_string()))?;

        // A timed-out task keeps running detached; its permit frees when it ends.
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            converter.convert(&upload.bytes, upload.extension.as_deref())
        })
        .await
        .map_err(|e| ConversionError::Internal(e.to_string()))?
    };

    match tokio::time::timeout_at(deadline, work).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AppError::Timeout {
            secs: state.request_timeout.as_secs(),
        }),
    }
}

fn markdown_response(markdown: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        markdown,
    )
        .into_response()
}
