//! Translation of Slack response bodies into domain values.

use serde_json::Value;

use crate::core::models::{MessageId, PostResult, ThreadMessage, Timestamp};
use crate::errors::AdapterError;

const NOT_FOUND_CODES: &[&str] = &["channel_not_found", "thread_not_found", "message_not_found"];

const VALIDATION_CODES: &[&str] = &[
    "no_text",
    "msg_too_long",
    "invalid_arguments",
    "invalid_cursor",
    "invalid_ts_latest",
    "invalid_ts_oldest",
];

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Map an `ok: false` body to the adapter's error taxonomy.
///
/// # Errors
///
/// Returns `NotFound`, `Validation` or `Api` depending on Slack's error code.
pub fn ensure_ok<'a>(method: &str, body: &'a Value) -> Result<&'a Value, AdapterError> {
    if body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
        return Ok(body);
    }

    let code = body.get("error").and_then(Value::as_str).unwrap_or("unknown");
    Err(if NOT_FOUND_CODES.contains(&code) {
        AdapterError::NotFound(format!("{method}: {code}"))
    } else if VALIDATION_CODES.contains(&code) {
        AdapterError::Validation(format!("{method}: {code}"))
    } else {
        AdapterError::Api {
            method: method.to_string(),
            code: code.to_string(),
        }
    })
}

fn required_str<'a>(value: &'a Value, field: &str, context: &str) -> Result<&'a str, AdapterError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterError::Malformed(format!("{context}: missing '{field}'")))
}

fn required_ts(value: &Value, context: &str) -> Result<(String, Timestamp), AdapterError> {
    let raw = value
        .get("ts")
        .ok_or_else(|| AdapterError::Malformed(format!("{context}: missing 'ts'")))?;
    let timestamp = Timestamp::from_json(raw)
        .ok_or_else(|| AdapterError::Malformed(format!("{context}: unparseable ts {raw}")))?;
    let id = match raw {
        Value::String(s) => s.clone(),
        _ => timestamp.to_string(),
    };
    Ok((id, timestamp))
}

fn author_of(message: &Value) -> String {
    ["user", "username", "bot_id"]
        .iter()
        .find_map(|field| {
            message
                .get(*field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or("unknown")
        .to_string()
}

fn next_cursor(body: &Value) -> Option<String> {
    body.get("response_metadata")
        .and_then(|m| m.get("next_cursor"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// Build a `PostResult` from a `chat.postMessage` response.
///
/// # Errors
///
/// Returns the mapped Slack error, or `Malformed` if `ts` is missing.
pub fn map_post(body: &Value, destination: &str) -> Result<PostResult, AdapterError> {
    let body = ensure_ok("chat.postMessage", body)?;
    let (ts, timestamp) = required_ts(body, "chat.postMessage")?;
    let channel = body
        .get("channel")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .unwrap_or(destination)
        .to_string();

    Ok(PostResult {
        message_id: MessageId::new(channel.clone(), ts).with_destination(destination),
        timestamp,
        channel,
    })
}

/// Map one `conversations.replies` page, dropping the thread root.
///
/// # Errors
///
/// Returns the mapped Slack error, or `Malformed` if a message lacks `ts`.
pub fn map_replies_page(
    body: &Value,
    thread_id: &MessageId,
) -> Result<Page<ThreadMessage>, AdapterError> {
    let body = ensure_ok("conversations.replies", body)?;
    let messages = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AdapterError::Malformed("conversations.replies: missing 'messages'".to_string())
        })?;

    let mut items = Vec::with_capacity(messages.len());
    for message in messages {
        let (ts, timestamp) = required_ts(message, "conversations.replies")?;
        if ts == thread_id.ts() {
            continue;
        }
        items.push(ThreadMessage {
            message_id: MessageId::new(thread_id.channel(), ts),
            author: author_of(message),
            text: message
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            timestamp,
        });
    }

    Ok(Page {
        items,
        next_cursor: next_cursor(body),
    })
}

/// Map one `search.messages` page.
///
/// # Errors
///
/// Returns the mapped Slack error, or `Malformed` for matches without `ts` or channel.
pub fn map_search_page(body: &Value) -> Result<Page<ThreadMessage>, AdapterError> {
    let body = ensure_ok("search.messages", body)?;
    let matches = body
        .get("messages")
        .and_then(|m| m.get("matches"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            AdapterError::Malformed("search.messages: missing 'messages.matches'".to_string())
        })?;

    let mut items = Vec::with_capacity(matches.len());
    for found in matches {
        let (ts, timestamp) = required_ts(found, "search.messages")?;
        let channel = found
            .get("channel")
            .map(|c| required_str(c, "id", "search.messages channel"))
            .transpose()?
            .ok_or_else(|| {
                AdapterError::Malformed("search.messages: match without channel".to_string())
            })?;

        items.push(ThreadMessage {
            message_id: MessageId::new(channel, ts),
            author: author_of(found),
            text: found
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            timestamp,
        });
    }

    Ok(Page {
        items,
        next_cursor: next_cursor(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_post_success() {
        let body = json!({"ok": true, "ts": "1234567890.123456", "channel": "C123456"});
        let result = map_post(&body, "#test").unwrap();

        assert_eq!(result.channel, "C123456");
        assert_eq!(result.message_id.ts(), "1234567890.123456");
        assert!(result.message_id.belongs_to("#test"));
        assert_eq!(result.timestamp, Timestamp::parse("1234567890.123456").unwrap());
    }

    #[test]
    fn test_map_post_numeric_ts_and_missing_channel() {
        let body = json!({"ok": true, "ts": 1000});
        let result = map_post(&body, "#herd-feed").unwrap();

        assert_eq!(result.channel, "#herd-feed");
        assert_eq!(result.timestamp, Timestamp::from_secs(1000));
    }

    #[test]
    fn test_map_post_missing_ts_is_malformed() {
        let body = json!({"ok": true, "channel": "C1"});
        assert!(matches!(
            map_post(&body, "C1"),
            Err(AdapterError::Malformed(msg)) if msg.contains("ts")
        ));
    }

    #[test]
    fn test_ensure_ok_error_codes() {
        assert!(matches!(
            ensure_ok("chat.postMessage", &json!({"ok": false, "error": "thread_not_found"})),
            Err(AdapterError::NotFound(_))
        ));
        assert!(matches!(
            ensure_ok("chat.postMessage", &json!({"ok": false, "error": "msg_too_long"})),
            Err(AdapterError::Validation(_))
        ));
        assert_eq!(
            ensure_ok("chat.postMessage", &json!({"ok": false, "error": "is_archived"})),
            Err(AdapterError::Api {
                method: "chat.postMessage".to_string(),
                code: "is_archived".to_string(),
            })
        );
    }

    #[test]
    fn test_map_replies_page_excludes_root() {
        let thread = MessageId::new("C123456", "1234567890.123456");
        let body = json!({
            "ok": true,
            "messages": [
                {"user": "U123", "text": "Parent message", "ts": "1234567890.123456"},
                {"user": "U456", "text": "First reply", "ts": "1234567890.123457"},
                {"bot_id": "B1", "text": "Second reply", "ts": "1234567890.123458"}
            ],
            "has_more": true,
            "response_metadata": {"next_cursor": "bmV4dA=="}
        });

        let page = map_replies_page(&body, &thread).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].author, "U456");
        assert_eq!(page.items[0].text, "First reply");
        assert_eq!(page.items[1].author, "B1");
        assert_eq!(page.next_cursor.as_deref(), Some("bmV4dA=="));
    }

    #[test]
    fn test_map_replies_page_empty_cursor_is_none() {
        let thread = MessageId::new("C1", "1.0");
        let body = json!({
            "ok": true,
            "messages": [{"user": "U1", "text": "root", "ts": "1.0"}],
            "response_metadata": {"next_cursor": ""}
        });

        let page = map_replies_page(&body, &thread).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_map_search_page() {
        let body = json!({
            "ok": true,
            "messages": {
                "matches": [
                    {"user": "U123", "text": "Found message 1", "ts": "1234567890.123456",
                     "channel": {"id": "C1", "name": "herd-feed"}},
                    {"username": "bot", "text": "Found message 2", "ts": "1234567890.123457",
                     "channel": {"id": "C2", "name": "ops"}}
                ]
            }
        });

        let page = map_search_page(&body).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].author, "U123");
        assert_eq!(page.items[1].author, "bot");
        assert_eq!(page.items[1].message_id.channel(), "C2");
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_map_search_page_missing_matches_is_malformed() {
        assert!(matches!(
            map_search_page(&json!({"ok": true})),
            Err(AdapterError::Malformed(_))
        ));
    }
}
