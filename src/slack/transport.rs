//! Authenticated request execution against the Slack Web API.
//!
//! Classifies every response, waits out rate-limit cooldowns and retries
//! transient failures with jittered exponential backoff.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::errors::TransportError;
use crate::slack::rate_limit::RateLimitState;

/// Slack error codes that mean the credential itself is unusable.
const AUTH_ERROR_CODES: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
    "missing_scope",
    "no_permission",
];

const RATE_LIMIT_ERROR_CODES: &[&str] = &["ratelimited", "rate_limited"];

const SERVER_ERROR_CODES: &[&str] = &[
    "internal_error",
    "fatal_error",
    "service_unavailable",
    "request_timeout",
];

/// Payload of a Web API call. Read methods take query parameters, write methods a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Query(Vec<(String, String)>),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Web API method name, e.g. `chat.postMessage`.
    pub method: &'static str,
    pub body: RequestBody,
}

impl ApiRequest {
    #[must_use]
    pub fn get(method: &'static str, params: Vec<(&str, String)>) -> Self {
        Self {
            method,
            body: RequestBody::Query(
                params
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn post(method: &'static str, payload: Value) -> Self {
        Self {
            method,
            body: RequestBody::Json(payload),
        }
    }

    /// Value of a parameter regardless of how the request is encoded.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<String> {
        match &self.body {
            RequestBody::Query(params) => params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()),
            RequestBody::Json(payload) => payload.get(key).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }
}

/// Unclassified HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            retry_after: None,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_status(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }
}

/// Sends one HTTP request. Implementations must not retry on their own.
#[async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        token: &SecretString,
    ) -> Result<RawResponse, TransportError>;
}

/// Production sender backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: Client,
    base_url: String,
}

impl ReqwestSender {
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl HttpSend for ReqwestSender {
    async fn send(
        &self,
        request: &ApiRequest,
        token: &SecretString,
    ) -> Result<RawResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, request.method);
        let builder = match &request.body {
            RequestBody::Query(params) => self.client.get(&url).query(params),
            RequestBody::Json(payload) => self.client.post(&url).json(payload),
        };

        let resp = builder.bearer_auth(token.expose_secret()).send().await?;
        let status = resp.status();
        let retry_after = parse_retry_after(resp.headers());
        let body = resp.text().await?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Parse the `Retry-After` header (whole seconds) of a throttled response.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Bounds on automatic retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for network and server failures, first attempt included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Cooldown used when Slack throttles without a `Retry-After` header.
    pub default_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            default_cooldown: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delays between attempts: base, 2x base, 4x base... capped and jittered.
    fn backoff(&self) -> impl Iterator<Item = Duration> + Send + use<> {
        let base_ms = u64::try_from(self.base_delay.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        ExponentialBackoff::from_millis(2)
            .factor(base_ms / 2 + base_ms % 2)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1) as usize)
    }
}

/// Turn a raw response into the decoded JSON body or a transport failure.
///
/// Bodies with `ok: false` and an error code outside the transport taxonomy
/// are passed through for the response mapper.
///
/// # Errors
///
/// Returns the `TransportError` matching the status code or Slack error code.
pub fn classify(
    method: &str,
    response: &RawResponse,
    default_cooldown: Duration,
) -> Result<Value, TransportError> {
    let status = response.status;

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(TransportError::RateLimited {
            retry_after: response.retry_after.unwrap_or(default_cooldown),
        });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(TransportError::Auth(format!("{method} HTTP {status}")));
    }
    if status.is_server_error() {
        return Err(TransportError::ServerError(format!("{method} HTTP {status}")));
    }
    if !status.is_success() {
        return Err(TransportError::Malformed(format!("{method} HTTP {status}")));
    }

    let body: Value = serde_json::from_str(&response.body).map_err(|e| {
        TransportError::Malformed(format!("{method} JSON parse error: {e}"))
    })?;

    let ok = body.get("ok").and_then(Value::as_bool).ok_or_else(|| {
        TransportError::Malformed(format!("{method} response has no boolean 'ok' field"))
    })?;
    if ok {
        return Ok(body);
    }

    let code = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
    if RATE_LIMIT_ERROR_CODES.contains(&code) {
        return Err(TransportError::RateLimited {
            retry_after: response.retry_after.unwrap_or(default_cooldown),
        });
    }
    if AUTH_ERROR_CODES.contains(&code) {
        return Err(TransportError::Auth(format!("{method} error: {code}")));
    }
    if SERVER_ERROR_CODES.contains(&code) {
        return Err(TransportError::ServerError(format!("{method} error: {code}")));
    }

    Ok(body)
}

/// Executes Web API calls with the adapter's credential and rate-limit state.
///
/// Cheap to clone; clones share the sender, credential and cooldown.
#[derive(Clone)]
pub struct Transport {
    sender: Arc<dyn HttpSend>,
    token: Arc<SecretString>,
    rate_limit: Arc<RateLimitState>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("rate_limit", &self.rate_limit)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Transport {
    #[must_use]
    pub fn new(sender: Arc<dyn HttpSend>, token: SecretString, policy: RetryPolicy) -> Self {
        Self {
            sender,
            token: Arc::new(token),
            rate_limit: Arc::new(RateLimitState::new()),
            policy,
        }
    }

    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitState {
        &self.rate_limit
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Execute `request`, returning the decoded body of a classified-successful response.
    ///
    /// Network and server failures are retried up to `max_attempts` in total.
    /// A throttled call waits out the cooldown and is retried once; a second
    /// throttle within the same call is returned as `RateLimited`.
    ///
    /// # Errors
    ///
    /// Returns the final `TransportError` once the retry bounds are exhausted,
    /// or immediately for auth and malformed responses.
    pub async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("slack_api", method = request.method, %request_id);

        let throttled_once = AtomicBool::new(false);
        let attempts = AtomicU32::new(0);
        let throttled = &throttled_once;
        let counter = &attempts;
        let max_attempts = self.policy.max_attempts;

        let result = RetryIf::start(
            self.policy.backoff(),
            move || self.attempt(request, throttled, counter),
            |e: &TransportError| {
                if e.is_transient() {
                    warn!(
                        "Slack {} failed: {}, retrying (attempt {}/{})",
                        request.method,
                        e,
                        attempts.load(Ordering::Relaxed),
                        max_attempts
                    );
                    true
                } else {
                    false
                }
            },
        )
        .instrument(span)
        .await;

        if let Err(e) = &result {
            warn!(method = request.method, %request_id, error = %e, "Slack call failed");
        }
        result
    }

    async fn attempt(
        &self,
        request: &ApiRequest,
        throttled: &AtomicBool,
        attempts: &AtomicU32,
    ) -> Result<Value, TransportError> {
        loop {
            self.rate_limit.wait().await;
            attempts.fetch_add(1, Ordering::Relaxed);
            debug!(method = request.method, "Sending Slack request");

            let response = self.sender.send(request, &self.token).await?;
            match classify(request.method, &response, self.policy.default_cooldown) {
                Err(TransportError::RateLimited { retry_after }) => {
                    self.rate_limit.engage(retry_after);
                    if throttled.swap(true, Ordering::AcqRel) {
                        return Err(TransportError::RateLimited { retry_after });
                    }
                    warn!(
                        "Slack rate limited {}, waiting {}s before retry",
                        request.method,
                        retry_after.as_secs()
                    );
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify_ok(response: &RawResponse) -> Result<Value, TransportError> {
        classify("chat.postMessage", response, Duration::from_secs(1))
    }

    #[test]
    fn test_classify_success_body() {
        let body = classify_ok(&RawResponse::ok(r#"{"ok": true, "ts": "1.0"}"#)).unwrap();
        assert_eq!(body["ts"], "1.0");
    }

    #[test]
    fn test_classify_http_429_uses_retry_after() {
        let response = RawResponse {
            status: StatusCode::TOO_MANY_REQUESTS,
            retry_after: Some(Duration::from_secs(30)),
            body: String::new(),
        };
        assert_eq!(
            classify_ok(&response),
            Err(TransportError::RateLimited {
                retry_after: Duration::from_secs(30)
            })
        );
    }

    #[test]
    fn test_classify_ratelimited_body_falls_back_to_default_cooldown() {
        let response = RawResponse::ok(r#"{"ok": false, "error": "ratelimited"}"#);
        assert_eq!(
            classify_ok(&response),
            Err(TransportError::RateLimited {
                retry_after: Duration::from_secs(1)
            })
        );
    }

    #[test]
    fn test_classify_auth_failures() {
        assert!(matches!(
            classify_ok(&RawResponse::ok(r#"{"ok": false, "error": "invalid_auth"}"#)),
            Err(TransportError::Auth(msg)) if msg.contains("invalid_auth")
        ));
        assert!(matches!(
            classify_ok(&RawResponse::with_status(StatusCode::UNAUTHORIZED, "")),
            Err(TransportError::Auth(_))
        ));
    }

    #[test]
    fn test_classify_server_errors() {
        assert!(matches!(
            classify_ok(&RawResponse::with_status(StatusCode::BAD_GATEWAY, "<html>")),
            Err(TransportError::ServerError(_))
        ));
        assert!(matches!(
            classify_ok(&RawResponse::ok(r#"{"ok": false, "error": "internal_error"}"#)),
            Err(TransportError::ServerError(_))
        ));
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(
            classify_ok(&RawResponse::ok("not json")),
            Err(TransportError::Malformed(_))
        ));
        assert!(matches!(
            classify_ok(&RawResponse::ok(r#"{"ts": "1.0"}"#)),
            Err(TransportError::Malformed(_))
        ));
        assert!(matches!(
            classify_ok(&RawResponse::with_status(StatusCode::NOT_FOUND, "")),
            Err(TransportError::Malformed(_))
        ));
    }

    #[test]
    fn test_classify_passes_other_api_errors_through() {
        let body =
            classify_ok(&RawResponse::ok(r#"{"ok": false, "error": "channel_not_found"}"#))
                .unwrap();
        assert_eq!(body["error"], "channel_not_found");
    }

    #[test]
    fn test_parse_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_backoff_yields_one_delay_per_retry() {
        let policy = RetryPolicy::default();
        let delays: Vec<Duration> = policy.backoff().collect();
        assert_eq!(delays.len(), 2);
        assert!(delays.iter().all(|d| *d <= policy.max_delay));
    }

    #[test]
    fn test_request_param_lookup() {
        let get = ApiRequest::get(
            "conversations.replies",
            vec![("channel", "C1".to_string()), ("ts", "1.0".to_string())],
        );
        assert_eq!(get.param("ts").as_deref(), Some("1.0"));
        assert_eq!(get.param("cursor"), None);

        let post = ApiRequest::post("chat.postMessage", json!({"channel": "C1", "text": "hi"}));
        assert_eq!(post.param("text").as_deref(), Some("hi"));
    }
}
