//! Lazy, limit-capped pagination over `search.messages`.

use std::collections::VecDeque;

use futures::Stream;
use tracing::{debug, warn};

use crate::core::models::{SearchQuery, ThreadMessage};
use crate::errors::Result;
use crate::slack::mapper::map_search_page;
use crate::slack::payloads::search_request;
use crate::slack::transport::Transport;

/// Matches of one search, fetched a page at a time as they are pulled.
///
/// Yields at most the query's limit of matches in total. Once exhausted it stays
/// exhausted; run the search again to start over.
#[derive(Debug)]
pub struct SearchResults {
    transport: Transport,
    query: SearchQuery,
    buffer: VecDeque<ThreadMessage>,
    cursor: Option<String>,
    exhausted: bool,
    yielded: usize,
}

impl SearchResults {
    #[must_use]
    pub fn new(transport: Transport, query: SearchQuery) -> Self {
        let exhausted = query.effective_limit() == 0;
        Self {
            transport,
            query,
            buffer: VecDeque::new(),
            cursor: None,
            exhausted,
            yielded: 0,
        }
    }

    #[must_use]
    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    /// Continuation token of the next page, if Slack has one.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        (self.exhausted && self.buffer.is_empty()) || self.yielded >= self.query.effective_limit()
    }

    /// Pull the next match, fetching a new page only when the current one is used up.
    ///
    /// # Errors
    ///
    /// Returns the transport or mapping error of the page fetch. The sequence
    /// ends after an error.
    pub async fn next(&mut self) -> Result<Option<ThreadMessage>> {
        if self.yielded >= self.query.effective_limit() {
            self.exhausted = true;
            self.buffer.clear();
            return Ok(None);
        }

        while self.buffer.is_empty() {
            if self.exhausted {
                return Ok(None);
            }
            if let Err(e) = self.fetch_page().await {
                self.exhausted = true;
                return Err(e);
            }
        }

        self.yielded += 1;
        Ok(self.buffer.pop_front())
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let request = search_request(&self.query, self.cursor.as_deref());
        let body = self.transport.execute(&request).await?;
        let page = map_search_page(&body)?;

        debug!(
            matches = page.items.len(),
            has_more = page.next_cursor.is_some(),
            "Fetched search page"
        );

        match page.next_cursor {
            Some(next) if self.cursor.as_deref() == Some(next.as_str()) => {
                warn!("Slack repeated a search cursor, ending results");
                self.exhausted = true;
            }
            Some(next) if !page.items.is_empty() => self.cursor = Some(next),
            _ => {
                self.cursor = None;
                self.exhausted = true;
            }
        }

        self.buffer.extend(page.items);
        Ok(())
    }

    /// Drain the remaining matches into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first page fetch error.
    pub async fn collect_all(mut self) -> Result<Vec<ThreadMessage>> {
        let mut matches = Vec::new();
        while let Some(found) = self.next().await? {
            matches.push(found);
        }
        Ok(matches)
    }

    /// Adapt into a `Stream`; ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<ThreadMessage>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let Some(mut results) = state else {
                return None;
            };
            match results.next().await {
                Ok(Some(found)) => Some((Ok(found), Some(results))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
