use std::env;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::core::models::DEFAULT_SEARCH_LIMIT;
use crate::slack::transport::RetryPolicy;

pub const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name}: invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("invalid Slack API base URL '{0}'")]
    BaseUrl(String),
}

/// Construction-time settings of a Slack adapter. Immutable once the adapter is built.
#[derive(Debug)]
pub struct AdapterConfig {
    pub slack_bot_token: SecretString,
    pub default_channel: Option<String>,
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub search_limit: usize,
    pub retry: RetryPolicy,
}

impl AdapterConfig {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            slack_bot_token: SecretString::from(token.into()),
            default_channel: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            search_limit: DEFAULT_SEARCH_LIMIT,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_default_channel(mut self, channel: impl Into<String>) -> Self {
        self.default_channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// # Errors
    ///
    /// Returns an error if `SLACK_BOT_TOKEN` is missing or an optional variable is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`AdapterConfig::from_env`] but reads variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if `SLACK_BOT_TOKEN` is missing or an optional variable is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("SLACK_BOT_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("SLACK_BOT_TOKEN"))?;
        let mut config = Self::new(token);

        if let Some(channel) = lookup("HERD_SLACK_DEFAULT_CHANNEL").filter(|c| !c.trim().is_empty())
        {
            config.default_channel = Some(channel);
        }

        if let Some(base) = lookup("SLACK_API_BASE_URL") {
            config.api_base_url = base;
        }

        if let Some(raw) = lookup("HERD_SLACK_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "HERD_SLACK_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the API base URL is not an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match Url::parse(&self.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(ConfigError::BaseUrl(self.api_base_url.clone())),
        }
    }
}
