//! `NotifyAdapter` implementation for Slack.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::core::config::{AdapterConfig, ConfigError};
use crate::core::models::{
    Message, MessageId, PostOptions, PostResult, SearchQuery, ThreadReplies,
};
use crate::core::notify::NotifyAdapter;
use crate::errors::{AdapterError, Result};
use crate::slack::mapper::map_post;
use crate::slack::payloads::post_message_request;
use crate::slack::search::SearchResults;
use crate::slack::threads::ThreadResolver;
use crate::slack::transport::{HttpSend, ReqwestSender, Transport};

/// Slack notification adapter.
///
/// Holds only the credential, the default channel and the credential's
/// rate-limit state; share one instance across tasks instead of building one per call.
#[derive(Debug, Clone)]
pub struct SlackNotifyAdapter {
    transport: Transport,
    threads: ThreadResolver,
    default_channel: Option<String>,
    search_limit: usize,
}

impl SlackNotifyAdapter {
    /// Adapter against slack.com with default settings.
    #[must_use]
    pub fn new(token: impl Into<String>, default_channel: Option<&str>) -> Self {
        let mut config = AdapterConfig::new(token);
        config.default_channel = default_channel.map(str::to_string);
        let sender = ReqwestSender::new(&config.api_base_url, config.request_timeout);
        Self::with_sender(Arc::new(sender), &config)
    }

    /// # Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn from_config(config: &AdapterConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let sender = ReqwestSender::new(&config.api_base_url, config.request_timeout);
        Ok(Self::with_sender(Arc::new(sender), config))
    }

    /// Adapter that sends requests through `sender` instead of the default HTTP client.
    #[must_use]
    pub fn with_sender(sender: Arc<dyn HttpSend>, config: &AdapterConfig) -> Self {
        let token = SecretString::from(config.slack_bot_token.expose_secret().to_string());
        let transport = Transport::new(sender, token, config.retry);
        Self {
            threads: ThreadResolver::new(transport.clone()),
            transport,
            default_channel: config
                .default_channel
                .clone()
                .filter(|c| !c.trim().is_empty()),
            search_limit: config.search_limit,
        }
    }

    #[must_use]
    pub fn default_channel(&self) -> Option<&str> {
        self.default_channel.as_deref()
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    fn resolve_channel(&self, channel: Option<&str>) -> Result<String> {
        channel
            .filter(|c| !c.trim().is_empty())
            .or(self.default_channel.as_deref())
            .map(str::to_string)
            .ok_or_else(|| {
                AdapterError::Validation(
                    "no channel given and no default channel configured".to_string(),
                )
            })
    }

    /// Post with an optional display name and emoji icon.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for empty text or when no channel can be resolved,
    /// otherwise the classified Slack failure.
    pub async fn post_with_options(&self, text: &str, options: &PostOptions) -> Result<PostResult> {
        let message = Message {
            text: text.to_string(),
            channel: self.resolve_channel(options.channel.as_deref())?,
            thread_id: None,
        };
        message.validate()?;

        let body = self
            .transport
            .execute(&post_message_request(&message, options))
            .await?;
        let result = map_post(&body, &message.channel)?;

        info!(
            channel = %result.channel,
            ts = result.message_id.ts(),
            "Posted message to Slack"
        );
        Ok(result)
    }
}

#[async_trait]
impl NotifyAdapter for SlackNotifyAdapter {
    async fn post(&self, text: &str, channel: Option<&str>) -> Result<PostResult> {
        let options = PostOptions {
            channel: channel.map(str::to_string),
            ..PostOptions::default()
        };
        self.post_with_options(text, &options).await
    }

    async fn post_thread(
        &self,
        thread_id: &MessageId,
        text: &str,
        channel: Option<&str>,
    ) -> Result<PostResult> {
        let message = Message {
            text: text.to_string(),
            channel: channel
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(thread_id.channel())
                .to_string(),
            thread_id: Some(thread_id.clone()),
        };
        self.threads
            .post_thread(&message, &PostOptions::default())
            .await
    }

    async fn get_thread_replies(
        &self,
        channel: &str,
        thread_id: &MessageId,
    ) -> Result<ThreadReplies> {
        if !thread_id.belongs_to(channel) {
            return Err(AdapterError::Validation(format!(
                "thread {thread_id} does not belong to channel {channel}"
            )));
        }
        self.threads.get_thread_replies(thread_id).await
    }

    async fn search(&self, mut query: SearchQuery) -> Result<SearchResults> {
        if query.query.trim().is_empty() {
            return Err(AdapterError::Validation(
                "search query must not be empty".to_string(),
            ));
        }
        if query.limit.is_none() {
            query.limit = Some(self.search_limit);
        }
        Ok(SearchResults::new(self.transport.clone(), query))
    }
}
