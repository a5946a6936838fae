use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::converter::ConversionError;

/// Every way a request can fail, with the status it maps to.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("File too large. Maximum size is {max_mb} MB.")]
    PayloadTooLarge { max_mb: u64 },
    #[error("Failed to convert file: {0}")]
    Conversion(#[from] ConversionError),
    #[error("Conversion timed out after {secs}s.")]
    Timeout { secs: u64 },
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Conversion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
