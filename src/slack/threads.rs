//! Thread replies: posting into a thread and reading a thread back.

use tracing::{debug, info, warn};

use crate::core::models::{Message, MessageId, PostOptions, PostResult, ThreadReplies};
use crate::errors::{AdapterError, Result};
use crate::slack::mapper::{map_post, map_replies_page};
use crate::slack::payloads::{post_message_request, replies_request};
use crate::slack::transport::Transport;

/// Stop paginating a thread after this many pages and report it as incomplete.
pub const MAX_REPLY_PAGES: usize = 50;

#[derive(Debug, Clone)]
pub struct ThreadResolver {
    transport: Transport,
}

impl ThreadResolver {
    #[must_use]
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Post `message` as a reply to its `thread_id`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` before any network call if the message has no
    /// thread, has empty text, or targets a channel other than the thread's.
    /// A thread Slack does not know surfaces as `NotFound`.
    pub async fn post_thread(
        &self,
        message: &Message,
        options: &PostOptions,
    ) -> Result<PostResult> {
        let thread = message.thread_id.as_ref().ok_or_else(|| {
            AdapterError::Validation("thread reply requires a thread_id".to_string())
        })?;
        message.validate()?;

        let body = self
            .transport
            .execute(&post_message_request(message, options))
            .await?;
        let result = map_post(&body, &message.channel)?;

        info!(
            channel = %result.channel,
            thread_ts = thread.ts(),
            ts = result.message_id.ts(),
            "Posted thread reply"
        );
        Ok(result)
    }

    /// Collect every reply of `thread_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns the first transport or mapping error hit on any page.
    pub async fn get_thread_replies(&self, thread_id: &MessageId) -> Result<ThreadReplies> {
        let mut replies = Vec::new();
        let mut cursor: Option<String> = None;
        let mut complete = true;

        for page_number in 1..=MAX_REPLY_PAGES {
            let request = replies_request(thread_id.channel(), thread_id.ts(), cursor.as_deref());
            let body = self.transport.execute(&request).await?;
            let page = map_replies_page(&body, thread_id)?;

            debug!(
                thread_ts = thread_id.ts(),
                page_number,
                replies = page.items.len(),
                "Fetched thread replies page"
            );
            replies.extend(page.items);

            match page.next_cursor {
                None => break,
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    warn!(
                        thread_ts = thread_id.ts(),
                        "Slack repeated a replies cursor, stopping pagination"
                    );
                    complete = false;
                    break;
                }
                Some(next) => {
                    if page_number == MAX_REPLY_PAGES {
                        warn!(
                            thread_ts = thread_id.ts(),
                            "Thread exceeds {} pages, returning partial replies", MAX_REPLY_PAGES
                        );
                        complete = false;
                    }
                    cursor = Some(next);
                }
            }
        }

        // Stable, so replies sharing a ts keep Slack's order.
        replies.sort_by_key(|reply| reply.timestamp);

        Ok(ThreadReplies {
            thread_id: thread_id.clone(),
            replies,
            complete,
        })
    }
}
