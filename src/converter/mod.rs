//! Document-to-Markdown conversion.
//!
//! [`ConverterAdapter`] is the one long-lived object in the service. It owns a
//! registry of format converters and an optional LLM client for image
//! descriptions, and it is never mutated after [`ConverterAdapter::new`]
//! returns. Handlers only see it through the [`Converter`] trait so tests can
//! substitute their own implementations.

mod csv;
mod html;
mod image;
mod json;
pub mod llm;
mod notebook;
mod text;

use std::fmt;

use url::Url;

use self::llm::LlmClient;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("{}", unsupported_message(.extension))]
    Unsupported { extension: Option<String> },
    #[error("{format} input is malformed: {reason}")]
    Malformed { format: &'static str, reason: String },
    #[error("image description failed: {0}")]
    Description(String),
    #[error("converter is not initialised")]
    Unavailable,
    #[error("conversion task failed: {0}")]
    Internal(String),
}

fn unsupported_message(extension: &Option<String>) -> String {
    match extension {
        Some(ext) => format!("no converter accepts .{} input", ext),
        None => "could not detect the input format".to_string(),
    }
}

impl ConversionError {
    pub(crate) fn malformed(format: &'static str, reason: impl fmt::Display) -> Self {
        ConversionError::Malformed {
            format,
            reason: reason.to_string(),
        }
    }
}

// ── Public seam ──────────────────────────────────────────────────────────────

/// Synchronous, CPU-bound conversion of an uploaded document to Markdown.
///
/// Implementations may block for the whole conversion and must only be called
/// from a blocking-capable thread (e.g. inside `spawn_blocking`).
pub trait Converter: Send + Sync {
    fn convert(&self, bytes: &[u8], extension: Option<&str>) -> Result<String, ConversionError>;
}

// ── Format converter registry ────────────────────────────────────────────────

pub(crate) struct ConvertContext<'a> {
    pub extension: Option<&'a str>,
    pub llm: Option<&'a LlmClient>,
}

/// One input format the adapter knows how to turn into Markdown.
pub(crate) trait DocumentConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lower-case extensions, without the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Content sniffing, used when no extension hint matches.
    fn sniff(&self, bytes: &[u8]) -> bool;

    fn convert(&self, bytes: &[u8], ctx: &ConvertContext<'_>) -> Result<String, ConversionError>;
}

// ── Adapter ──────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct AdapterOptions {
    pub enable_plugins: bool,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<Url>,
}

impl From<&crate::config::Config> for AdapterOptions {
    fn from(config: &crate::config::Config) -> Self {
        AdapterOptions {
            enable_plugins: config.enable_plugins,
            llm_model: config.llm_model.clone(),
            llm_api_key: config.llm_api_key.clone(),
            llm_base_url: Some(config.llm_base_url.clone()),
        }
    }
}

pub struct ConverterAdapter {
    converters: Vec<Box<dyn DocumentConverter>>,
    llm: Option<LlmClient>,
}

impl ConverterAdapter {
    /// Build the adapter. Never fails: a broken LLM setup is logged and the
    /// adapter comes up without image descriptions.
    pub fn new(options: AdapterOptions) -> Self {
        let mut converters: Vec<Box<dyn DocumentConverter>> = Vec::new();

        // Plugins go first so their sniffing wins over the generic formats.
        if options.enable_plugins {
            converters.push(Box::new(notebook::NotebookConverter));
        }
        converters.push(Box::new(image::ImageConverter));
        converters.push(Box::new(html::HtmlConverter));
        converters.push(Box::new(csv::CsvConverter));
        converters.push(Box::new(json::JsonConverter));
        converters.push(Box::new(text::PlainTextConverter));

        let llm = build_llm_client(&options);

        tracing::info!(
            plugins = options.enable_plugins,
            llm = llm.is_some(),
            formats = ?converters.iter().map(|c| c.name()).collect::<Vec<_>>(),
            "converter ready"
        );

        ConverterAdapter { converters, llm }
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    fn select(&self, extension: Option<&str>, bytes: &[u8]) -> Option<&dyn DocumentConverter> {
        if let Some(ext) = extension {
            if let Some(found) = self.converters.iter().find(|c| c.extensions().contains(&ext)) {
                return Some(found.as_ref());
            }
        }
        self.converters
            .iter()
            .find(|c| c.sniff(bytes))
            .map(|c| c.as_ref())
    }
}

impl Converter for ConverterAdapter {
    fn convert(&self, bytes: &[u8], extension: Option<&str>) -> Result<String, ConversionError> {
        let extension = normalize_extension(extension);
        let converter = self.select(extension.as_deref(), bytes).ok_or_else(|| {
            ConversionError::Unsupported {
                extension: extension.clone(),
            }
        })?;

        tracing::debug!(
            converter = converter.name(),
            extension = ?extension,
            size = bytes.len(),
            "dispatching conversion"
        );

        let ctx = ConvertContext {
            extension: extension.as_deref(),
            llm: self.llm.as_ref(),
        };
        converter.convert(bytes, &ctx)
    }
}

fn build_llm_client(options: &AdapterOptions) -> Option<LlmClient> {
    match (&options.llm_model, &options.llm_api_key) {
        (Some(model), Some(api_key)) => {
            let base_url = options
                .llm_base_url
                .clone()
                .unwrap_or_else(llm::default_base_url);
            match LlmClient::new(&base_url, api_key, model) {
                Ok(client) => {
                    tracing::info!(
                        model = client.model(),
                        endpoint = %client.endpoint(),
                        "LLM image descriptions enabled"
                    );
                    Some(client)
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to initialise LLM client, image descriptions disabled");
                    None
                }
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("LLM_MODEL and LLM_API_KEY must both be set, image descriptions disabled");
            None
        }
        (None, None) => None,
    }
}

/// `".PDF "` → `"pdf"`; blank hints are treated as absent.
fn normalize_extension(extension: Option<&str>) -> Option<String> {
    extension
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
}
