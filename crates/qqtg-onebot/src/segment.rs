//! OneBot v11 message segments, in both wire formats: the JSON array format
//! and the CQ-code string format (`text[CQ:face,id=14]more text`).

use qqtg_channels::{MediaRef, MentionTarget, Segment};
use qqtg_core::types::SourceMessageKey;
use serde_json::{Map, Value};

/// A message split into its reply target and its content.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedMessage {
    pub reply_to: Option<SourceMessageKey>,
    pub segments: Vec<Segment>,
}

/// Parse the `message` field of an event, whichever format it uses.
pub fn parse_message(message: &Value) -> ParsedMessage {
    let raw: Vec<(String, Map<String, Value>)> = match message {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let kind = item.get("type")?.as_str()?.to_string();
                let data = item
                    .get("data")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                Some((kind, data))
            })
            .collect(),
        Value::String(text) => parse_cq(text),
        _ => Vec::new(),
    };

    let mut parsed = ParsedMessage::default();
    for (kind, data) in raw {
        if kind == "reply" {
            parsed.reply_to = field(&data, "id")
                .and_then(|id| id.parse().ok())
                .map(SourceMessageKey);
            continue;
        }
        parsed.segments.push(to_segment(kind, data));
    }
    parsed
}

/// String or number field as a string; OneBot implementations disagree.
fn field(data: &Map<String, Value>, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn media(data: &Map<String, Value>) -> MediaRef {
    MediaRef {
        file: field(data, "file").unwrap_or_default(),
        url: field(data, "url").filter(|u| !u.is_empty()),
    }
}

fn to_segment(kind: String, data: Map<String, Value>) -> Segment {
    match kind.as_str() {
        "text" => Segment::Text {
            text: field(&data, "text").unwrap_or_default(),
        },
        "at" => {
            let qq = field(&data, "qq").unwrap_or_default();
            let target = if qq == "all" {
                MentionTarget::All
            } else {
                match qq.parse() {
                    Ok(id) => MentionTarget::User(id),
                    Err(_) => return unknown(kind, data),
                }
            };
            Segment::Mention {
                target,
                name: field(&data, "name").filter(|n| !n.is_empty()),
            }
        }
        "face" => match field(&data, "id").and_then(|id| id.parse().ok()) {
            Some(id) => Segment::Face { id },
            None => unknown(kind, data),
        },
        "mface" | "marketface" => {
            let summary = field(&data, "summary").unwrap_or_default();
            Segment::MarketFace {
                name: summary
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .to_string(),
            }
        }
        "image" => {
            let media = media(&data);
            let animated = media.file.to_ascii_lowercase().ends_with(".gif");
            Segment::Image { media, animated }
        }
        "record" => Segment::Voice {
            media: media(&data),
        },
        "video" => Segment::Video {
            media: media(&data),
        },
        "file" => {
            let name = field(&data, "name").or_else(|| field(&data, "file"));
            let file = field(&data, "file_id")
                .or_else(|| field(&data, "file"))
                .unwrap_or_default();
            Segment::File {
                media: MediaRef {
                    file,
                    url: field(&data, "url").filter(|u| !u.is_empty()),
                },
                name,
            }
        }
        "json" => Segment::AppCard {
            payload: field(&data, "data").unwrap_or_default(),
        },
        _ => unknown(kind, data),
    }
}

fn unknown(kind: String, data: Map<String, Value>) -> Segment {
    Segment::Unknown {
        kind,
        raw: Value::Object(data),
    }
}

/// Split a CQ-code string into `(type, data)` pairs. Plain runs become
/// `text` segments.
pub fn parse_cq(input: &str) -> Vec<(String, Map<String, Value>)> {
    let mut out = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let Some(start) = rest.find("[CQ:") else {
            push_text(&mut out, rest);
            break;
        };
        push_text(&mut out, &rest[..start]);
        let Some(len) = rest[start..].find(']') else {
            // Unterminated code: keep it as text.
            push_text(&mut out, &rest[start..]);
            break;
        };
        let code = &rest[start + 4..start + len];
        let mut parts = code.split(',');
        let kind = parts.next().unwrap_or_default().to_string();
        let mut data = Map::new();
        for part in parts {
            if let Some((k, v)) = part.split_once('=') {
                data.insert(k.to_string(), Value::String(unescape(v)));
            }
        }
        out.push((kind, data));
        rest = &rest[start + len + 1..];
    }
    out
}

fn push_text(out: &mut Vec<(String, Map<String, Value>)>, text: &str) {
    if text.is_empty() {
        return;
    }
    let mut data = Map::new();
    data.insert("text".to_string(), Value::String(unescape(text)));
    out.push(("text".to_string(), data));
}

fn unescape(s: &str) -> String {
    s.replace("&#44;", ",")
        .replace("&#91;", "[")
        .replace("&#93;", "]")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn array_format_with_reply() {
        let parsed = parse_message(&json!([
            {"type": "reply", "data": {"id": "1"}},
            {"type": "at", "data": {"qq": "10002", "name": "Bob"}},
            {"type": "text", "data": {"text": " hi "}},
            {"type": "face", "data": {"id": "14"}},
            {"type": "image", "data": {"file": "abc.GIF", "url": "https://qq.example/abc"}}
        ]));
        assert_eq!(parsed.reply_to, Some(SourceMessageKey(1)));
        assert_eq!(
            parsed.segments,
            vec![
                Segment::Mention {
                    target: MentionTarget::User(10002),
                    name: Some("Bob".to_string()),
                },
                Segment::text(" hi "),
                Segment::Face { id: 14 },
                Segment::Image {
                    media: MediaRef {
                        file: "abc.GIF".to_string(),
                        url: Some("https://qq.example/abc".to_string()),
                    },
                    animated: true,
                },
            ]
        );
    }

    #[test]
    fn numeric_fields_accepted() {
        let parsed = parse_message(&json!([
            {"type": "reply", "data": {"id": 77}},
            {"type": "face", "data": {"id": 178}}
        ]));
        assert_eq!(parsed.reply_to, Some(SourceMessageKey(77)));
        assert_eq!(parsed.segments, vec![Segment::Face { id: 178 }]);
    }

    #[test]
    fn cq_string_format() {
        let parsed = parse_message(&json!(
            "[CQ:reply,id=5]a &#91;b&#93; &amp; c[CQ:at,qq=all][CQ:json,data={\"app\":\"x\"&#44;\"v\":1}]"
        ));
        assert_eq!(parsed.reply_to, Some(SourceMessageKey(5)));
        assert_eq!(
            parsed.segments,
            vec![
                Segment::text("a [b] & c"),
                Segment::Mention {
                    target: MentionTarget::All,
                    name: None,
                },
                Segment::AppCard {
                    payload: r#"{"app":"x","v":1}"#.to_string(),
                },
            ]
        );
    }

    #[test]
    fn unterminated_code_is_text() {
        let parsed = parse_message(&json!("hi [CQ:face,id=1"));
        assert_eq!(
            parsed.segments,
            vec![Segment::text("hi "), Segment::text("[CQ:face,id=1")]
        );
    }

    #[test]
    fn file_and_market_face() {
        let parsed = parse_message(&json!([
            {"type": "file", "data": {"file": "notes.txt", "file_id": "/abc-123", "file_size": "10"}},
            {"type": "mface", "data": {"summary": "[Cheers]", "emoji_id": "e1"}},
            {"type": "record", "data": {"file": "v.amr"}}
        ]));
        assert_eq!(
            parsed.segments,
            vec![
                Segment::File {
                    media: MediaRef {
                        file: "/abc-123".to_string(),
                        url: None,
                    },
                    name: Some("notes.txt".to_string()),
                },
                Segment::MarketFace {
                    name: "Cheers".to_string(),
                },
                Segment::Voice {
                    media: MediaRef {
                        file: "v.amr".to_string(),
                        url: None,
                    },
                },
            ]
        );
    }

    #[test]
    fn unknown_kinds_keep_their_data() {
        let parsed = parse_message(&json!([
            {"type": "poke", "data": {"type": "1", "id": "-1"}},
            {"type": "at", "data": {"qq": "not-a-number"}}
        ]));
        assert!(matches!(
            &parsed.segments[0],
            Segment::Unknown { kind, raw } if kind == "poke" && raw["id"] == "-1"
        ));
        assert!(matches!(&parsed.segments[1], Segment::Unknown { kind, .. } if kind == "at"));
    }
}
