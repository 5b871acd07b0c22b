use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AdapterError;

/// Upper bound on search results when the caller does not pick one.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Remote-assigned message time with microsecond precision.
///
/// Slack represents message times as `"<seconds>.<micros>"` strings; this type
/// gives callers a single ordered representation regardless of the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    micros: i64,
}

impl Timestamp {
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Whole seconds; saturates at the bounds of the microsecond range.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self {
            micros: secs.saturating_mul(1_000_000),
        }
    }

    #[must_use]
    pub const fn as_micros(&self) -> i64 {
        self.micros
    }

    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.micros.div_euclid(1_000_000)
    }

    #[must_use]
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.micros)
    }

    /// Parse a Slack `ts` string such as `"1234567890.123456"` or `"1000"`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (secs, frac) = raw.split_once('.').unwrap_or((raw, ""));
        if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let secs: i64 = secs.parse().ok()?;
        let mut digits: String = frac.chars().take(6).collect();
        while digits.len() < 6 {
            digits.push('0');
        }
        let micros: i64 = digits.parse().ok()?;

        secs.checked_mul(1_000_000)?
            .checked_add(micros)
            .map(Self::from_micros)
    }

    /// Accepts either a `ts` string or a bare JSON number.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => {
                if let Some(secs) = n.as_i64() {
                    secs.checked_mul(1_000_000).map(Self::from_micros)
                } else {
                    let secs = n.as_f64()?;
                    if !secs.is_finite() || secs < 0.0 {
                        return None;
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    let micros = (secs * 1_000_000.0).round() as i64;
                    Some(Self::from_micros(micros))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06}",
            self.micros.div_euclid(1_000_000),
            self.micros.rem_euclid(1_000_000)
        )
    }
}

fn normalize_channel(channel: &str) -> &str {
    channel.trim().trim_start_matches('#')
}

/// Opaque handle of a posted message.
///
/// Slack identifies a message by its `ts` within a channel, so the handle
/// carries both. When the adapter posted the message itself it also remembers
/// the destination the caller asked for, so the caller may keep referring to
/// the channel by name even though Slack answers with a channel id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId {
    channel: String,
    ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination: Option<String>,
}

impl MessageId {
    #[must_use]
    pub fn new(channel: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ts: ts.into(),
            destination: None,
        }
    }

    #[must_use]
    pub(crate) fn with_destination(mut self, destination: &str) -> Self {
        if normalize_channel(destination) != normalize_channel(&self.channel) {
            self.destination = Some(destination.to_string());
        }
        self
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn ts(&self) -> &str {
        &self.ts
    }

    /// Whether `channel` (name or id, with or without `#`) is where this message lives.
    #[must_use]
    pub fn belongs_to(&self, channel: &str) -> bool {
        let wanted = normalize_channel(channel);
        wanted == normalize_channel(&self.channel)
            || self
                .destination
                .as_deref()
                .is_some_and(|d| wanted == normalize_channel(d))
    }
}

/// Text form `<channel>:<ts>`, followed by `@<destination>` when the message
/// was posted to a channel name.
impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.ts)?;
        if let Some(destination) = &self.destination {
            write!(f, "@{destination}")?;
        }
        Ok(())
    }
}

impl FromStr for MessageId {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            AdapterError::Validation(format!(
                "'{s}' is not a message id of the form <channel>:<ts>[@<destination>]"
            ))
        };

        let (id, destination) = match s.split_once('@') {
            Some((id, destination)) if !destination.trim().is_empty() => (id, Some(destination)),
            Some(_) => return Err(invalid()),
            None => (s, None),
        };

        match id.rsplit_once(':') {
            Some((channel, ts)) if !channel.is_empty() && Timestamp::parse(ts).is_some() => {
                let parsed = Self::new(channel, ts);
                Ok(match destination {
                    Some(destination) => parsed.with_destination(destination),
                    None => parsed,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// Outcome of a successful post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResult {
    pub message_id: MessageId,
    pub timestamp: Timestamp,
    pub channel: String,
}

/// Optional presentation settings for a post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostOptions {
    pub channel: Option<String>,
    pub username: Option<String>,
    /// Emoji such as `:hammer:`.
    pub icon: Option<String>,
}

impl PostOptions {
    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

/// An outbound message with its resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub channel: String,
    pub thread_id: Option<MessageId>,
}

impl Message {
    /// # Errors
    ///
    /// Returns `Validation` for blank text, a blank channel, or a thread that
    /// lives in a different channel.
    pub fn validate(&self) -> Result<(), AdapterError> {
        if self.text.trim().is_empty() {
            return Err(AdapterError::Validation(
                "message text must not be empty".to_string(),
            ));
        }
        if normalize_channel(&self.channel).is_empty() {
            return Err(AdapterError::Validation(
                "channel must not be empty".to_string(),
            ));
        }
        if let Some(thread) = &self.thread_id
            && !thread.belongs_to(&self.channel)
        {
            return Err(AdapterError::Validation(format!(
                "thread {thread} does not belong to channel {}",
                self.channel
            )));
        }
        Ok(())
    }
}

/// A single message read back from Slack (thread reply or search match).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub message_id: MessageId,
    pub author: String,
    pub text: String,
    pub timestamp: Timestamp,
}

/// Replies of one thread, oldest first, without the root message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadReplies {
    pub thread_id: MessageId,
    pub replies: Vec<ThreadMessage>,
    /// `false` when pagination stopped before Slack ran out of pages.
    pub complete: bool,
}

impl ThreadReplies {
    #[must_use]
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ThreadMessage> {
        self.replies.iter()
    }
}

impl IntoIterator for ThreadReplies {
    type Item = ThreadMessage;
    type IntoIter = std::vec::IntoIter<ThreadMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.replies.into_iter()
    }
}

/// Day-granular bounds applied by Slack's search modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// Matches strictly after this day (`after:`).
    pub after: Option<NaiveDate>,
    /// Matches strictly before this day (`before:`).
    pub before: Option<NaiveDate>,
}

impl DateRange {
    /// Matches from the day after `since`'s UTC calendar day.
    ///
    /// Slack's `after:` modifier is day-granular and excludes the named day,
    /// so messages posted later on that same day are not returned.
    #[must_use]
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            after: Some(since.date_naive()),
            before: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub channel: Option<String>,
    pub date_range: Option<DateRange>,
    /// Cap on matches across all pages; `None` uses the adapter's default.
    pub limit: Option<usize>,
}

impl SearchQuery {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            channel: None,
            date_range: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }

    /// Full Slack query string including `in:`/`after:`/`before:` modifiers.
    #[must_use]
    pub fn to_slack_query(&self) -> String {
        let mut query = self.query.trim().to_string();
        if let Some(channel) = &self.channel {
            query = format!("{query} in:{channel}");
        }
        if let Some(range) = &self.date_range {
            if let Some(after) = range.after {
                query = format!("{query} after:{}", after.format("%Y-%m-%d"));
            }
            if let Some(before) = range.before {
                query = format!("{query} before:{}", before.format("%Y-%m-%d"));
            }
        }
        query
    }
}
