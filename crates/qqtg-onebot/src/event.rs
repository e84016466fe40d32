//! OneBot v11 event envelopes (`post_type` = message / notice / request /
//! meta_event) mapped onto [`InboundEvent`].

use qqtg_channels::{InboundEvent, SourceMessage};
use qqtg_core::types::{ConversationId, SourceMessageKey};
use serde::Deserialize;
use serde_json::Value;

use crate::error::OneBotError;
use crate::segment::parse_message;

#[derive(Debug, Deserialize)]
struct Envelope {
    post_type: String,
    #[serde(default)]
    self_id: i64,
}

#[derive(Debug, Deserialize)]
struct MessageEvent {
    message_type: String,
    message_id: i64,
    user_id: i64,
    #[serde(default)]
    group_id: Option<i64>,
    #[serde(default)]
    group_name: Option<String>,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    sender: Sender,
}

#[derive(Debug, Default, Deserialize)]
struct Sender {
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    card: Option<String>,
}

/// Parse one posted event.
///
/// Returns `Ok(None)` for `meta_event` posts (heartbeats and lifecycle),
/// which arrive constantly and carry nothing to relay.
pub fn parse_event(body: &[u8]) -> Result<Option<InboundEvent>, OneBotError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| OneBotError::InvalidEvent(e.to_string()))?;
    let envelope: Envelope = serde_json::from_value(value.clone())
        .map_err(|e| OneBotError::InvalidEvent(e.to_string()))?;

    match envelope.post_type.as_str() {
        "meta_event" => Ok(None),
        "message" => {
            let event: MessageEvent = serde_json::from_value(value.clone())
                .map_err(|e| OneBotError::InvalidEvent(e.to_string()))?;
            if event.user_id == envelope.self_id {
                return Ok(Some(unrecognized(&value, "message.self")));
            }
            message_event(event, &value).map(Some)
        }
        _ => Ok(Some(unrecognized(&value, ""))),
    }
}

fn message_event(event: MessageEvent, value: &Value) -> Result<InboundEvent, OneBotError> {
    let parsed = parse_message(&event.message);
    let raw = value.to_string();
    match event.message_type.as_str() {
        "group" => {
            let group_id = event.group_id.unwrap_or_default();
            let conversation = ConversationId::group(group_id)
                .ok_or_else(|| OneBotError::InvalidEvent(format!("group id {group_id}")))?;
            let sender_name = event
                .sender
                .card
                .filter(|c| !c.is_empty())
                .unwrap_or(event.sender.nickname);
            Ok(InboundEvent::GroupMessage(SourceMessage {
                conversation,
                key: SourceMessageKey(event.message_id),
                sender_id: event.user_id,
                sender_name,
                chat_name: event.group_name.filter(|n| !n.is_empty()),
                reply_to: parsed.reply_to,
                segments: parsed.segments,
                raw,
            }))
        }
        "private" => {
            let conversation = ConversationId::private(event.user_id)
                .ok_or_else(|| OneBotError::InvalidEvent(format!("user id {}", event.user_id)))?;
            Ok(InboundEvent::PrivateMessage(SourceMessage {
                conversation,
                key: SourceMessageKey(event.message_id),
                sender_id: event.user_id,
                sender_name: event.sender.nickname,
                chat_name: None,
                reply_to: parsed.reply_to,
                segments: parsed.segments,
                raw,
            }))
        }
        _ => Ok(unrecognized(value, "")),
    }
}

/// `post_type.detail`, where the detail is the first of the usual sub-type
/// fields that is present.
fn unrecognized(value: &Value, detail: &str) -> InboundEvent {
    let post_type = value["post_type"].as_str().unwrap_or("unknown");
    let detail = if detail.is_empty() {
        ["message_type", "notice_type", "request_type"]
            .iter()
            .find_map(|k| value[*k].as_str())
            .unwrap_or("")
            .to_string()
    } else {
        detail.trim_start_matches("message.").to_string()
    };
    let description = if detail.is_empty() {
        post_type.to_string()
    } else {
        format!("{post_type}.{detail}")
    };
    InboundEvent::Unrecognized { description }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qqtg_channels::Segment;
    use serde_json::json;

    fn parse(value: Value) -> Option<InboundEvent> {
        parse_event(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn group_message_prefers_card() {
        let event = parse(json!({
            "post_type": "message",
            "message_type": "group",
            "sub_type": "normal",
            "self_id": 1,
            "message_id": 900,
            "group_id": 555,
            "group_name": "Rustaceans",
            "user_id": 10001,
            "message": [
                {"type": "reply", "data": {"id": "899"}},
                {"type": "text", "data": {"text": "hello"}}
            ],
            "sender": {"user_id": 10001, "nickname": "nick", "card": "Card Name"}
        }));
        let Some(InboundEvent::GroupMessage(msg)) = event else {
            panic!("expected group message, got {event:?}");
        };
        assert_eq!(msg.conversation, ConversationId::group(555).unwrap());
        assert_eq!(msg.key, SourceMessageKey(900));
        assert_eq!(msg.sender_name, "Card Name");
        assert_eq!(msg.chat_name.as_deref(), Some("Rustaceans"));
        assert_eq!(msg.reply_to, Some(SourceMessageKey(899)));
        assert_eq!(msg.segments, vec![Segment::text("hello")]);
        assert!(msg.raw.contains("\"message_id\":900"));
    }

    #[test]
    fn group_message_empty_card_falls_back_to_nickname() {
        let event = parse(json!({
            "post_type": "message",
            "message_type": "group",
            "self_id": 1,
            "message_id": 1,
            "group_id": 555,
            "user_id": 10001,
            "message": "hi",
            "sender": {"nickname": "nick", "card": ""}
        }));
        let Some(InboundEvent::GroupMessage(msg)) = event else {
            panic!("expected group message");
        };
        assert_eq!(msg.sender_name, "nick");
        assert_eq!(msg.chat_name, None);
    }

    #[test]
    fn private_message_from_cq_string() {
        let event = parse(json!({
            "post_type": "message",
            "message_type": "private",
            "sub_type": "friend",
            "self_id": 1,
            "message_id": 12,
            "user_id": 42,
            "message": "[CQ:face,id=14]hey",
            "sender": {"nickname": "alice"}
        }));
        let Some(InboundEvent::PrivateMessage(msg)) = event else {
            panic!("expected private message");
        };
        assert_eq!(msg.conversation, ConversationId::private(42).unwrap());
        assert_eq!(msg.sender_name, "alice");
        assert_eq!(
            msg.segments,
            vec![Segment::Face { id: 14 }, Segment::text("hey")]
        );
    }

    #[test]
    fn own_messages_are_not_relayed() {
        let event = parse(json!({
            "post_type": "message",
            "message_type": "group",
            "self_id": 1,
            "message_id": 3,
            "group_id": 555,
            "user_id": 1,
            "message": "echo"
        }));
        assert!(matches!(
            event,
            Some(InboundEvent::Unrecognized { description }) if description == "message.self"
        ));
    }

    #[test]
    fn notices_and_heartbeats() {
        let notice = parse(json!({
            "post_type": "notice",
            "notice_type": "group_increase",
            "self_id": 1,
            "group_id": 555
        }));
        assert!(matches!(
            notice,
            Some(InboundEvent::Unrecognized { description }) if description == "notice.group_increase"
        ));
        let heartbeat = parse(json!({
            "post_type": "meta_event",
            "meta_event_type": "heartbeat",
            "self_id": 1
        }));
        assert!(heartbeat.is_none());
    }

    #[test]
    fn malformed_bodies_are_errors() {
        assert!(matches!(
            parse_event(b"not json"),
            Err(OneBotError::InvalidEvent(_))
        ));
        assert!(matches!(
            parse_event(br#"{"post_type":"message","message_type":"group","message_id":1,"user_id":2,"group_id":0}"#),
            Err(OneBotError::InvalidEvent(_))
        ));
    }
}
