use axum::body::Bytes;
use serde::Serialize;

pub const SERVICE_NAME: &str = "markitdown-server";

/// One uploaded document, owned by the request that carries it.
#[derive(Debug)]
pub struct ConversionRequest {
    pub filename: String,
    pub bytes: Bytes,
    pub extension: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Readiness {
    pub fn ready() -> Self {
        Readiness {
            status: "ready",
            service: Some(SERVICE_NAME),
            error: None,
        }
    }

    pub fn not_ready(error: impl Into<String>) -> Self {
        Readiness {
            status: "not ready",
            service: None,
            error: Some(error.into()),
        }
    }
}
