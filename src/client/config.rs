use serde::Deserialize;
use tokio::time::Duration;

use crate::error::{DatasourceError, DatasourceResult};

const ENV_PREFIX: &str = "ONMS_";

/// Configuration for talking to an OpenNMS instance
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the web application, e.g. `http://localhost:8980/opennms`
    pub url: String,
    /// Pre-encoded `Authorization` header value
    pub basic_auth: Option<String>,
    /// Keep and resend session cookies
    pub with_credentials: bool,
    /// Maximum nodes returned by a search
    pub search_limit: u32,
    /// Timeout for a single attempt
    pub request_timeout: Duration,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the delay between retries
    pub max_backoff: Duration,
    /// Give up retrying once this much time has passed; retries forever when unset
    pub retry_deadline: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8980/opennms".to_string(),
            basic_auth: None,
            with_credentials: false,
            search_limit: default_search_limit(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
            initial_backoff: Duration::from_millis(default_initial_backoff_ms()),
            max_backoff: Duration::from_millis(default_max_backoff_ms()),
            retry_deadline: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    basic_auth: Option<String>,
    #[serde(default)]
    with_credentials: bool,
    #[serde(default = "default_search_limit")]
    search_limit: u32,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_initial_backoff_ms")]
    initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    max_backoff_ms: u64,
    #[serde(default)]
    retry_deadline_secs: Option<u64>,
}

const fn default_search_limit() -> u32 {
    25
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_initial_backoff_ms() -> u64 {
    10
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Reads `ONMS_*` environment variables
    pub fn from_env() -> DatasourceResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Reads `ONMS_*` entries from the given key/value pairs
    pub fn from_vars<I>(vars: I) -> DatasourceResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawConfig = envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .map_err(|e| DatasourceError::Config(e.to_string()))?;

        let defaults = Self::default();
        let initial_backoff = Duration::from_millis(raw.initial_backoff_ms.max(1));

        Ok(Self {
            url: raw.url.unwrap_or(defaults.url),
            basic_auth: raw.basic_auth.filter(|value| !value.is_empty()),
            with_credentials: raw.with_credentials,
            search_limit: raw.search_limit.max(1),
            request_timeout: Duration::from_secs(raw.request_timeout_secs.max(1)),
            initial_backoff,
            max_backoff: Duration::from_millis(raw.max_backoff_ms).max(initial_backoff),
            retry_deadline: raw.retry_deadline_secs.map(Duration::from_secs),
        })
    }

    pub fn with_basic_auth(mut self, header: impl Into<String>) -> Self {
        self.basic_auth = Some(header.into());
        self
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    pub fn with_search_limit(mut self, limit: u32) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_retry_deadline(mut self, deadline: Duration) -> Self {
        self.retry_deadline = Some(deadline);
        self
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}
