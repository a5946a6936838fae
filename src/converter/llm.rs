//! OpenAI-compatible chat client used for image descriptions.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Handle;
use url::Url;

use super::ConversionError;

const USER_AGENT: &str = concat!("markitdown-server/", env!("CARGO_PKG_VERSION"));
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("no tokio runtime available to drive LLM requests")]
    NoRuntime,
    #[error("invalid LLM endpoint: {0}")]
    Endpoint(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

// ── Response shape ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────────────

pub struct LlmClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
    model: String,
    runtime: Handle,
}

pub(crate) fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).unwrap()
}

impl LlmClient {
    /// Must be called from inside a tokio runtime; the handle is kept so the
    /// blocking conversion threads can drive requests later.
    pub fn new(base_url: &Url, api_key: &str, model: &str) -> Result<Self, LlmError> {
        let runtime = Handle::try_current().map_err(|_| LlmError::NoRuntime)?;

        let endpoint = format!("{}/chat/completions", base_url.as_str().trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint).map_err(|e| LlmError::Endpoint(e.to_string()))?;

        let http = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(LlmClient {
            http,
            endpoint,
            api_key: api_key.to_string(),
            model: model.to_string(),
            runtime,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Blocks the calling thread until the model answers. Panics if called
    /// from an async task; use it from the blocking pool only.
    pub fn describe_image(&self, bytes: &[u8], mime: &str, prompt: &str) -> Result<String, ConversionError> {
        self.runtime.block_on(self.request_description(bytes, mime, prompt))
    }

    async fn request_description(&self, bytes: &[u8], mime: &str, prompt: &str) -> Result<String, ConversionError> {
        let data_url = format!("data:{};base64,{}", mime, STANDARD.encode(bytes));
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }]
        });

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConversionError::Description(format!("TimeoutError: {}", e))
                } else if e.is_connect() {
                    ConversionError::Description(format!("ConnectError: {}", e))
                } else {
                    ConversionError::Description(format!("RequestError: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConversionError::Description(format!(
                "LLM endpoint returned {}",
                status
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ConversionError::Description(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConversionError::Description("LLM returned no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_requires_runtime() {
        let err = LlmClient::new(&default_base_url(), "key", "gpt-4o").err().unwrap();
        assert!(matches!(err, LlmError::NoRuntime));
    }

    #[tokio::test]
    async fn endpoint_keeps_base_path() {
        let base = Url::parse("http://localhost:11434/v1/").unwrap();
        let client = LlmClient::new(&base, "key", "llava").unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(client.model(), "llava");

        let client = LlmClient::new(&default_base_url(), "key", "gpt-4o").unwrap();
        assert_eq!(client.endpoint().as_str(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn response_content_is_extracted() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"A cat."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("A cat."));
    }
}
