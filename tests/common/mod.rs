#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use herd_notify_slack::TransportError;
use herd_notify_slack::core::config::AdapterConfig;
use herd_notify_slack::slack::{ApiRequest, HttpSend, RawResponse, SlackNotifyAdapter};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

/// Sender that replays canned responses and records every request it sees.
#[derive(Default)]
pub struct ScriptedSender {
    responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<ApiRequest>>,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, body: Value) -> &Self {
        self.push(Ok(RawResponse::ok(body.to_string())))
    }

    pub fn push_status(&self, status: StatusCode) -> &Self {
        self.push(Ok(RawResponse::with_status(status, "")))
    }

    pub fn push_rate_limited(&self, retry_after_secs: u64) -> &Self {
        self.push(Ok(RawResponse {
            status: StatusCode::TOO_MANY_REQUESTS,
            retry_after: Some(Duration::from_secs(retry_after_secs)),
            body: String::new(),
        }))
    }

    pub fn push_network_error(&self) -> &Self {
        self.push(Err(TransportError::Network("connection reset".to_string())))
    }

    pub fn push(&self, response: Result<RawResponse, TransportError>) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpSend for ScriptedSender {
    async fn send(
        &self,
        request: &ApiRequest,
        token: &SecretString,
    ) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.tokens
            .lock()
            .unwrap()
            .push(token.expose_secret().to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected request to {}", request.method))
    }
}

pub fn test_config() -> AdapterConfig {
    AdapterConfig::new("xoxb-test").with_default_channel("#herd-feed")
}

pub fn adapter_with(sender: &Arc<ScriptedSender>) -> SlackNotifyAdapter {
    SlackNotifyAdapter::with_sender(sender.clone(), &test_config())
}
