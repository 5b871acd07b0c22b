//! herd-notify-slack - Slack implementation of the Herd's `NotifyAdapter`.
//!
//! The adapter posts messages, replies in threads, reads threads back and
//! searches message history through the Slack Web API.
//!
//! # Architecture
//!
//! - `slack::transport` executes authenticated requests, waits out rate-limit
//!   cooldowns and retries transient failures with jittered backoff
//! - `slack::mapper` turns Slack response bodies into domain values and errors
//! - `slack::threads` and `slack::search` drive cursor pagination
//! - `slack::adapter` composes them behind `core::notify::NotifyAdapter`
//!
//! # Example
//!
//! ```no_run
//! use herd_notify_slack::core::config::AdapterConfig;
//! use herd_notify_slack::core::models::SearchQuery;
//! use herd_notify_slack::{NotifyAdapter, SlackNotifyAdapter};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     herd_notify_slack::setup_logging();
//!
//!     let config = AdapterConfig::from_env()?;
//!     let adapter = SlackNotifyAdapter::from_config(&config)?;
//!
//!     let root = adapter.post("Deploy started", Some("#herd-feed")).await?;
//!     adapter
//!         .post_thread(&root.message_id, "Deploy finished", None)
//!         .await?;
//!
//!     let replies = adapter
//!         .get_thread_replies("#herd-feed", &root.message_id)
//!         .await?;
//!     println!("{} replies", replies.len());
//!
//!     let mut results = adapter.search(SearchQuery::new("deploy").limit(10)).await?;
//!     while let Some(found) = results.next().await? {
//!         println!("{} {}", found.timestamp, found.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod core;
pub mod errors;
pub mod slack;

pub use crate::core::notify::NotifyAdapter;
pub use crate::errors::{AdapterError, TransportError};
pub use crate::slack::SlackNotifyAdapter;

/// Configure structured logging with JSON output.
///
/// Honors `RUST_LOG`; defaults to `info` (`debug` with the `debug-logs`
/// feature). Safe to call more than once, later calls are no-ops.
///
/// # Example
///
/// ```
/// herd_notify_slack::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let default_level = if cfg!(feature = "debug-logs") {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
