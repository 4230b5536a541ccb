use std::{env, sync::LazyLock, time::Duration};

use thiserror::Error;
use url::Url;

/// Errors raised while reading client configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub(crate) const DEFAULT_BEGIN_PATH: &str = "/api/passkey/register/begin";
pub(crate) const DEFAULT_FINISH_PATH: &str = "/api/passkey/register/finish";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub(crate) static PASSKEY_BEGIN_PATH: LazyLock<String> = LazyLock::new(|| {
    normalize_path(
        "PASSKEY_BEGIN_PATH",
        env::var("PASSKEY_BEGIN_PATH").ok(),
        DEFAULT_BEGIN_PATH,
    )
});

pub(crate) static PASSKEY_FINISH_PATH: LazyLock<String> = LazyLock::new(|| {
    normalize_path(
        "PASSKEY_FINISH_PATH",
        env::var("PASSKEY_FINISH_PATH").ok(),
        DEFAULT_FINISH_PATH,
    )
});

pub(crate) static PASSKEY_HTTP_TIMEOUT: LazyLock<Duration> =
    LazyLock::new(|| parse_timeout(env::var("PASSKEY_HTTP_TIMEOUT").ok()));

pub(crate) static PASSKEY_API_TOKEN: LazyLock<Option<String>> = LazyLock::new(|| {
    env::var("PASSKEY_API_TOKEN")
        .ok()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
});

/// Connection settings for the registration endpoints of the SSO server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub base_url: Url,
    pub begin_path: String,
    pub finish_path: String,
    pub timeout: Duration,
    pub bearer_token: Option<String>,
}

impl ServerConfig {
    /// Creates a config for `base_url` with the default endpoint paths.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("base_url", base_url)?,
            begin_path: DEFAULT_BEGIN_PATH.to_string(),
            finish_path: DEFAULT_FINISH_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            bearer_token: None,
        })
    }

    /// Reads `PASSKEY_API_BASE_URL` and the optional path, timeout and token variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("PASSKEY_API_BASE_URL")
            .map_err(|_| ConfigError::Missing("PASSKEY_API_BASE_URL"))?;

        Ok(Self {
            base_url: parse_base_url("PASSKEY_API_BASE_URL", &base_url)?,
            begin_path: PASSKEY_BEGIN_PATH.clone(),
            finish_path: PASSKEY_FINISH_PATH.clone(),
            timeout: *PASSKEY_HTTP_TIMEOUT,
            bearer_token: PASSKEY_API_TOKEN.clone(),
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_paths(mut self, begin_path: &str, finish_path: &str) -> Self {
        self.begin_path = normalize_path(
            "begin_path",
            Some(begin_path.to_string()),
            DEFAULT_BEGIN_PATH,
        );
        self.finish_path = normalize_path(
            "finish_path",
            Some(finish_path.to_string()),
            DEFAULT_FINISH_PATH,
        );
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn begin_url(&self) -> String {
        self.endpoint(&self.begin_path)
    }

    pub(crate) fn finish_url(&self) -> String {
        self.endpoint(&self.finish_path)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

/// Origin the software authenticator reports in its client data.
///
/// Taken from `PASSKEY_ORIGIN`, falling back to the origin of `PASSKEY_API_BASE_URL`.
pub fn origin_from_env() -> Result<String, ConfigError> {
    if let Ok(origin) = env::var("PASSKEY_ORIGIN") {
        return Ok(parse_base_url("PASSKEY_ORIGIN", &origin)?
            .origin()
            .ascii_serialization());
    }

    let base_url = env::var("PASSKEY_API_BASE_URL")
        .map_err(|_| ConfigError::Missing("PASSKEY_ORIGIN or PASSKEY_API_BASE_URL"))?;
    Ok(parse_base_url("PASSKEY_API_BASE_URL", &base_url)?
        .origin()
        .ascii_serialization())
}

fn parse_base_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn normalize_path(name: &str, value: Option<String>, default: &str) -> String {
    match value.map(|v| v.trim().to_string()) {
        None => default.to_string(),
        Some(v) if v.is_empty() => default.to_string(),
        Some(v) if v.starts_with('/') => v,
        Some(v) => {
            tracing::warn!("{} should start with '/': {}. Prepending it", name, v);
            format!("/{v}")
        }
    }
}

fn parse_timeout(value: Option<String>) -> Duration {
    let secs = match value {
        None => DEFAULT_HTTP_TIMEOUT_SECS,
        Some(v) => match v.trim().parse::<u64>() {
            Ok(0) | Err(_) => {
                tracing::warn!(
                    "Invalid PASSKEY_HTTP_TIMEOUT: {}. Using default {}",
                    v,
                    DEFAULT_HTTP_TIMEOUT_SECS
                );
                DEFAULT_HTTP_TIMEOUT_SECS
            }
            Ok(secs) => secs,
        },
    };
    Duration::from_secs(secs)
}
