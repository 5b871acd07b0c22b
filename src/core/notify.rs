//! The capability contract the Herd consumes from every notification backend.

use async_trait::async_trait;

use crate::core::models::{MessageId, PostResult, SearchQuery, ThreadReplies};
use crate::errors::Result;
use crate::slack::search::SearchResults;

/// Posting, threading and search against a chat platform.
///
/// Posts are at-least-once: a post that timed out on the caller's side may
/// still have been committed remotely.
#[async_trait]
pub trait NotifyAdapter: Send + Sync {
    /// Post `text` to `channel`, or to the configured default channel.
    async fn post(&self, text: &str, channel: Option<&str>) -> Result<PostResult>;

    /// Reply in the thread rooted at `thread_id`.
    async fn post_thread(
        &self,
        thread_id: &MessageId,
        text: &str,
        channel: Option<&str>,
    ) -> Result<PostResult>;

    async fn get_thread_replies(&self, channel: &str, thread_id: &MessageId)
    -> Result<ThreadReplies>;

    /// Lazily page through matches; nothing is fetched until the results are pulled.
    async fn search(&self, query: SearchQuery) -> Result<SearchResults>;
}
