use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

// ── Defaults ─────────────────────────────────────────────────────────────────

const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_MAX_REQUESTS_JITTER: u64 = 50;
const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_KEEPALIVE_SECS: u64 = 5;
const DEFAULT_GRACEFUL_TIMEOUT_SECS: u64 = 30;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be at least 1")]
    Zero { key: &'static str },
    #[error("BIND is not a socket address: {0:?}")]
    InvalidBind(String),
    #[error("LLM_BASE_URL is not a valid URL: {0}")]
    InvalidUrl(String),
    #[error("MAX_FILE_SIZE_MB={0} does not fit in memory on this platform")]
    UploadTooLarge(u64),
}

// ── Config ───────────────────────────────────────────────────────────────────

/// Process-wide settings, read once at start-up.
#[derive(Clone)]
pub struct Config {
    pub max_file_size_mb: u64,
    pub request_timeout: Duration,
    pub enable_plugins: bool,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Url,
    pub log_level: String,
    pub workers: usize,
    pub max_requests: u64,
    pub max_requests_jitter: u64,
    pub bind: SocketAddr,
    pub keepalive: Duration,
    pub graceful_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_file_size_mb = parse_u64(get("MAX_FILE_SIZE_MB"), "MAX_FILE_SIZE_MB", DEFAULT_MAX_FILE_SIZE_MB)?;
        if max_file_size_mb == 0 {
            return Err(ConfigError::Zero { key: "MAX_FILE_SIZE_MB" });
        }
        if mb_to_bytes(max_file_size_mb).is_none() {
            return Err(ConfigError::UploadTooLarge(max_file_size_mb));
        }

        let request_timeout = parse_u64(
            get("REQUEST_TIMEOUT_SECONDS"),
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        if request_timeout == 0 {
            return Err(ConfigError::Zero { key: "REQUEST_TIMEOUT_SECONDS" });
        }

        let enable_plugins = get("ENABLE_MARKITDOWN_PLUGINS")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let llm_base_url = get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string());
        let llm_base_url = Url::parse(&llm_base_url).map_err(|_| ConfigError::InvalidUrl(llm_base_url))?;

        let workers = match get("WORKERS") {
            Some(raw) => {
                let n = parse_u64(Some(raw), "WORKERS", 1)?;
                if n == 0 {
                    return Err(ConfigError::Zero { key: "WORKERS" });
                }
                n as usize
            }
            None => default_workers(),
        };

        let bind = get("BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind.parse().map_err(|_| ConfigError::InvalidBind(bind))?;

        Ok(Config {
            max_file_size_mb,
            request_timeout: Duration::from_secs(request_timeout),
            enable_plugins,
            llm_model: get("LLM_MODEL"),
            llm_api_key: get("LLM_API_KEY"),
            llm_base_url,
            log_level: get("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            workers,
            max_requests: parse_u64(get("MAX_REQUESTS"), "MAX_REQUESTS", 0)?,
            max_requests_jitter: parse_u64(
                get("MAX_REQUESTS_JITTER"),
                "MAX_REQUESTS_JITTER",
                DEFAULT_MAX_REQUESTS_JITTER,
            )?,
            bind,
            keepalive: Duration::from_secs(parse_u64(
                get("KEEPALIVE_SECONDS"),
                "KEEPALIVE_SECONDS",
                DEFAULT_KEEPALIVE_SECS,
            )?),
            graceful_timeout: Duration::from_secs(parse_u64(
                get("GRACEFUL_TIMEOUT_SECONDS"),
                "GRACEFUL_TIMEOUT_SECONDS",
                DEFAULT_GRACEFUL_TIMEOUT_SECS,
            )?),
        })
    }

    /// Upload ceiling in bytes, saturating for hand-built configs that skipped
    /// [`Config::from_lookup`] validation.
    pub fn max_upload_bytes(&self) -> usize {
        mb_to_bytes(self.max_file_size_mb).unwrap_or(usize::MAX)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            enable_plugins: false,
            llm_model: None,
            llm_api_key: None,
            llm_base_url: Url::parse(DEFAULT_LLM_BASE_URL).unwrap(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            workers: default_workers(),
            max_requests: 0,
            max_requests_jitter: DEFAULT_MAX_REQUESTS_JITTER,
            bind: DEFAULT_BIND.parse().unwrap(),
            keepalive: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            graceful_timeout: Duration::from_secs(DEFAULT_GRACEFUL_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("request_timeout", &self.request_timeout)
            .field("enable_plugins", &self.enable_plugins)
            .field("llm_model", &self.llm_model)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<redacted>"))
            .field("llm_base_url", &self.llm_base_url.as_str())
            .field("log_level", &self.log_level)
            .field("workers", &self.workers)
            .field("max_requests", &self.max_requests)
            .field("max_requests_jitter", &self.max_requests_jitter)
            .field("bind", &self.bind)
            .field("keepalive", &self.keepalive)
            .field("graceful_timeout", &self.graceful_timeout)
            .finish()
    }
}

// ── Parsing helpers ──────────────────────────────────────────────────────────

fn parse_u64(raw: Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}

fn mb_to_bytes(mb: u64) -> Option<usize> {
    mb.checked_mul(1024 * 1024)
        .and_then(|bytes| usize::try_from(bytes).ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Conversion is CPU-bound, so size the pool the way a pre-fork server would.
fn default_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cores * 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.max_file_size_mb, 50);
        assert_eq!(config.max_upload_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(!config.enable_plugins);
        assert!(config.llm_model.is_none());
        assert!(config.llm_api_key.is_none());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.max_requests, 0);
        assert_eq!(config.max_requests_jitter, 50);
        assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert!(config.workers >= 3);
    }

    #[test]
    fn plugin_flag_accepts_truthy_spellings_only() {
        for value in ["true", "TRUE", "1", "yes", "Yes"] {
            let config = config_from(&[("ENABLE_MARKITDOWN_PLUGINS", value)]).unwrap();
            assert!(config.enable_plugins, "{value} should enable plugins");
        }
        for value in ["false", "0", "no", "on", "enabled"] {
            let config = config_from(&[("ENABLE_MARKITDOWN_PLUGINS", value)]).unwrap();
            assert!(!config.enable_plugins, "{value} should not enable plugins");
        }
    }

    #[test]
    fn blank_llm_values_count_as_absent() {
        let config = config_from(&[("LLM_MODEL", "  "), ("LLM_API_KEY", "")]).unwrap();
        assert!(config.llm_model.is_none());
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("MAX_FILE_SIZE_MB", "5"),
            ("REQUEST_TIMEOUT_SECONDS", "30"),
            ("LOG_LEVEL", "DEBUG"),
            ("WORKERS", "4"),
            ("MAX_REQUESTS", "1000"),
            ("BIND", "127.0.0.1:9000"),
        ])
        .unwrap();
        assert_eq!(config.max_upload_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_requests, 1000);
        assert_eq!(config.bind.port(), 9000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config_from(&[("MAX_FILE_SIZE_MB", "lots")]),
            Err(ConfigError::InvalidNumber { key: "MAX_FILE_SIZE_MB", .. })
        ));
        assert!(matches!(
            config_from(&[("WORKERS", "0")]),
            Err(ConfigError::Zero { key: "WORKERS" })
        ));
        assert!(matches!(
            config_from(&[("BIND", "nowhere")]),
            Err(ConfigError::InvalidBind(_))
        ));
        assert!(matches!(
            config_from(&[("LLM_BASE_URL", "not a url")]),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn upload_ceiling_that_overflows_is_rejected() {
        let huge = u64::MAX.to_string();
        assert!(matches!(
            config_from(&[("MAX_FILE_SIZE_MB", huge.as_str())]),
            Err(ConfigError::UploadTooLarge(u64::MAX))
        ));

        let unchecked = Config {
            max_file_size_mb: u64::MAX,
            ..Config::default()
        };
        assert_eq!(unchecked.max_upload_bytes(), usize::MAX);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = config_from(&[("LLM_API_KEY", "sk-secret")]).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
