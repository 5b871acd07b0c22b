//! Request builders for the Web API methods the adapter calls.

use serde_json::{Value, json};

use crate::core::models::{Message, PostOptions, SearchQuery};
use crate::slack::transport::ApiRequest;

/// Slack caps `search.messages` pages at 100 matches.
pub const SEARCH_PAGE_MAX: usize = 100;

/// Page size requested from `conversations.replies`.
pub const REPLIES_PAGE_SIZE: u32 = 200;

/// Build the JSON payload for `chat.postMessage`.
#[must_use]
pub fn build_post_payload(message: &Message, options: &PostOptions) -> Value {
    let channel = message
        .thread_id
        .as_ref()
        .map_or(message.channel.as_str(), |thread| thread.channel());

    let mut payload = json!({
        "channel": channel,
        "text": message.text,
    });

    if let Some(thread) = &message.thread_id {
        payload["thread_ts"] = Value::String(thread.ts().to_string());
    }
    if let Some(username) = &options.username {
        payload["username"] = Value::String(username.clone());
    }
    if let Some(icon) = &options.icon {
        payload["icon_emoji"] = Value::String(icon.clone());
    }

    payload
}

#[must_use]
pub fn post_message_request(message: &Message, options: &PostOptions) -> ApiRequest {
    ApiRequest::post("chat.postMessage", build_post_payload(message, options))
}

#[must_use]
pub fn replies_request(channel: &str, ts: &str, cursor: Option<&str>) -> ApiRequest {
    let mut params = vec![
        ("channel", channel.to_string()),
        ("ts", ts.to_string()),
        ("limit", REPLIES_PAGE_SIZE.to_string()),
    ];
    if let Some(cursor) = cursor {
        params.push(("cursor", cursor.to_string()));
    }
    ApiRequest::get("conversations.replies", params)
}

/// Newest matches first; the first page uses Slack's `*` cursor.
#[must_use]
pub fn search_request(query: &SearchQuery, cursor: Option<&str>) -> ApiRequest {
    let count = query.effective_limit().clamp(1, SEARCH_PAGE_MAX);
    ApiRequest::get(
        "search.messages",
        vec![
            ("query", query.to_slack_query()),
            ("count", count.to_string()),
            ("sort", "timestamp".to_string()),
            ("sort_dir", "desc".to_string()),
            ("cursor", cursor.unwrap_or("*").to_string()),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::MessageId;

    #[test]
    fn test_build_post_payload_minimal() {
        let message = Message {
            text: "Test message".into(),
            channel: "#test".into(),
            thread_id: None,
        };
        let payload = build_post_payload(&message, &PostOptions::default());

        assert_eq!(payload["channel"], "#test");
        assert_eq!(payload["text"], "Test message");
        assert!(payload.get("thread_ts").is_none());
        assert!(payload.get("username").is_none());
        assert!(payload.get("icon_emoji").is_none());
    }

    #[test]
    fn test_build_post_payload_with_identity() {
        let message = Message {
            text: "Test message".into(),
            channel: "#test".into(),
            thread_id: None,
        };
        let options = PostOptions::default().username("TestBot").icon(":robot:");
        let payload = build_post_payload(&message, &options);

        assert_eq!(payload["username"], "TestBot");
        assert_eq!(payload["icon_emoji"], ":robot:");
    }

    #[test]
    fn test_build_post_payload_thread_uses_root_channel() {
        let message = Message {
            text: "Reply".into(),
            channel: "#test".into(),
            thread_id: Some(MessageId::new("C123456", "1234567890.123456")),
        };
        let payload = build_post_payload(&message, &PostOptions::default());

        assert_eq!(payload["channel"], "C123456");
        assert_eq!(payload["thread_ts"], "1234567890.123456");
    }

    #[test]
    fn test_replies_request_cursor() {
        let first = replies_request("C1", "1.0", None);
        assert_eq!(first.param("cursor"), None);
        assert_eq!(first.param("limit").as_deref(), Some("200"));

        let next = replies_request("C1", "1.0", Some("abc"));
        assert_eq!(next.param("cursor").as_deref(), Some("abc"));
    }

    #[test]
    fn test_search_request_page_size_and_modifiers() {
        let request = search_request(&SearchQuery::new("test query").channel("#specific"), None);
        assert_eq!(request.param("query").as_deref(), Some("test query in:#specific"));
        assert_eq!(request.param("count").as_deref(), Some("50"));
        assert_eq!(request.param("cursor").as_deref(), Some("*"));

        let large = search_request(&SearchQuery::new("x").limit(500), Some("next"));
        assert_eq!(large.param("count").as_deref(), Some("100"));
        assert_eq!(large.param("cursor").as_deref(), Some("next"));
    }
}
