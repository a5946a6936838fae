use axum::{
    extract::{multipart::MultipartError, Multipart, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::Config;
use crate::error::AppError;
use crate::models::ConversionRequest;

pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub max_mb: u64,
}

impl UploadLimits {
    pub fn from_config(config: &Config) -> Self {
        UploadLimits {
            max_bytes: config.max_upload_bytes(),
            max_mb: config.max_file_size_mb,
        }
    }
}

// ── Transport-level size guard ───────────────────────────────────────────────

/// Reject bodies whose declared length is over the ceiling before any
/// handler runs. Bodies without a length are capped by `DefaultBodyLimit`.
pub async fn enforce_body_limit(
    State(limits): State<UploadLimits>,
    request: Request,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if let Some(len) = declared {
        if len > limits.max_bytes as u64 {
            tracing::warn!(
                content_length = len,
                max_bytes = limits.max_bytes,
                "rejecting oversized request body"
            );
            return AppError::PayloadTooLarge {
                max_mb: limits.max_mb,
            }
            .into_response();
        }
    }

    next.run(request).await
}

// ── Multipart validation ─────────────────────────────────────────────────────

/// Find the `file` part, check its filename, then read it into memory.
pub async fn read_upload(
    multipart: &mut Multipart,
    limits: UploadLimits,
) -> Result<ConversionRequest, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limits))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = match field.file_name() {
            None => return Err(AppError::Validation("Invalid filename.".to_string())),
            Some("") => {
                return Err(AppError::Validation(
                    "No file was selected for uploading.".to_string(),
                ))
            }
            Some(name) => name.to_string(),
        };

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limits))?;

        let extension = extension_hint(&filename);
        return Ok(ConversionRequest {
            filename,
            bytes,
            extension,
        });
    }

    Err(AppError::Validation(
        "No file part was found in the request.".to_string(),
    ))
}

fn multipart_error(err: MultipartError, limits: UploadLimits) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            max_mb: limits.max_mb,
        }
    } else {
        AppError::Validation(format!("Failed to read upload: {}", err.body_text()))
    }
}

/// Text after the last `.`, if the filename has one.
pub fn extension_hint(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_hint_uses_last_suffix() {
        assert_eq!(extension_hint("report.pdf"), Some("pdf".to_string()));
        assert_eq!(extension_hint("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_hint(".bashrc"), Some("bashrc".to_string()));
        assert_eq!(extension_hint("Notes.TXT"), Some("TXT".to_string()));
    }

    #[test]
    fn extension_hint_absent_without_suffix() {
        assert_eq!(extension_hint("README"), None);
        assert_eq!(extension_hint("trailing."), None);
    }

    #[test]
    fn limits_convert_megabytes() {
        let config = Config {
            max_file_size_mb: 2,
            ..Config::default()
        };
        let limits = UploadLimits::from_config(&config);
        assert_eq!(limits.max_bytes, 2 * 1024 * 1024);
        assert_eq!(limits.max_mb, 2);
    }
}
