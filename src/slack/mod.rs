//! All Slack-specific functionality

pub mod adapter;
pub mod mapper;
pub mod payloads;
pub mod rate_limit;
pub mod search;
pub mod threads;
pub mod transport;

// Re-export main types for convenience
pub use adapter::SlackNotifyAdapter;
pub use rate_limit::RateLimitState;
pub use search::SearchResults;
pub use threads::ThreadResolver;
pub use transport::{
    ApiRequest, HttpSend, RawResponse, ReqwestSender, RequestBody, RetryPolicy, Transport,
};
