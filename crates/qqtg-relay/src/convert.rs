//! Forward conversion: QQ segments into a Telegram-ready [`NeutralMessage`].
//!
//! Segments are processed strictly in order. Every segment contributes a text
//! fragment (already HTML-escaped) and at most one attachment. A segment that
//! fails renders its placeholder followed by an `[error: ...]` marker; the rest
//! of the message is still converted.

use qqtg_channels::{
    MediaKind, MediaRef, MentionTarget, NeutralMessage, Segment, SourceChannel, TypedBlob,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::faces::face_name;

/// Knobs that change how segments render.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Bot id used as the `tg://user` target of mention links. `None` renders
    /// mentions as plain `@name`.
    pub mention_link: Option<i64>,
}

/// A segment that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{placeholder} {details}")]
pub struct ConversionError {
    /// What the segment would have rendered as, e.g. `[image]`.
    pub placeholder: String,
    pub details: String,
}

impl ConversionError {
    fn new(placeholder: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            details: details.into(),
        }
    }

    /// Inline rendering: the placeholder, then the error marker.
    pub fn render(&self) -> String {
        format!("{}[error: {}]", self.placeholder, escape_html(&self.details))
    }
}

/// What one segment adds to the message.
#[derive(Debug)]
struct Contribution {
    text: String,
    media: Option<TypedBlob>,
}

impl Contribution {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            media: None,
        }
    }

    fn with_media(text: &str, blob: TypedBlob) -> Self {
        Self {
            text: text.to_string(),
            media: Some(blob),
        }
    }
}

/// Convert `segments` into Telegram HTML text plus ordered attachments.
/// Never fails as a whole.
pub async fn convert(
    source: &dyn SourceChannel,
    segments: &[Segment],
    options: &ConvertOptions,
) -> NeutralMessage {
    let mut out = NeutralMessage::default();
    for segment in segments {
        match convert_segment(source, segment, options).await {
            Ok(contribution) => {
                out.text.push_str(&contribution.text);
                if let Some(blob) = contribution.media {
                    out.media.push(blob);
                }
            }
            Err(e) => {
                warn!(error = %e, "segment conversion failed");
                out.text.push_str(&e.render());
            }
        }
    }
    out
}

async fn convert_segment(
    source: &dyn SourceChannel,
    segment: &Segment,
    options: &ConvertOptions,
) -> Result<Contribution, ConversionError> {
    match segment {
        Segment::Text { text } => Ok(Contribution::text(escape_html(text))),
        Segment::Mention { target, name } => Ok(Contribution::text(mention(
            *target,
            name.as_deref(),
            options,
        ))),
        Segment::Face { id } => Ok(Contribution::text(match face_name(*id) {
            Some(name) => format!("[{name}]"),
            None => format!("[face:{id}]"),
        })),
        Segment::MarketFace { name } => Ok(Contribution::text(format!(
            "[market_face:{}]",
            escape_html(name)
        ))),
        Segment::Image { media, animated } => {
            let data = fetch(source, MediaKind::Photo, media).await?;
            let kind = if *animated || is_gif(&data) {
                MediaKind::Animation
            } else {
                MediaKind::Photo
            };
            let file_name = (kind == MediaKind::Animation).then(|| "image.gif".to_string());
            Ok(Contribution::with_media(
                "[image]",
                TypedBlob {
                    kind,
                    data,
                    file_name,
                },
            ))
        }
        Segment::Voice { media } => media_segment(source, MediaKind::Audio, media, None).await,
        Segment::Video { media } => media_segment(source, MediaKind::Video, media, None).await,
        Segment::File { media, name } => {
            media_segment(source, MediaKind::Document, media, name.clone()).await
        }
        Segment::AppCard { payload } => app_card(payload),
        Segment::Unknown { kind, raw } => {
            warn!(kind = %kind, raw = %raw, "unsupported message segment");
            Ok(Contribution::text(format!("[{}]", escape_html(kind))))
        }
    }
}

async fn media_segment(
    source: &dyn SourceChannel,
    kind: MediaKind,
    media: &MediaRef,
    file_name: Option<String>,
) -> Result<Contribution, ConversionError> {
    let data = fetch(source, kind, media).await?;
    Ok(Contribution::with_media(
        &format!("[{}]", kind.noun()),
        TypedBlob {
            kind,
            data,
            file_name,
        },
    ))
}

async fn fetch(
    source: &dyn SourceChannel,
    kind: MediaKind,
    media: &MediaRef,
) -> Result<Vec<u8>, ConversionError> {
    let noun = kind.noun();
    match source.fetch_file(kind, media).await {
        Ok(data) => {
            debug!(kind = noun, bytes = data.len(), "media fetched");
            Ok(data)
        }
        Err(e) => {
            warn!(kind = noun, file = %media.file, error = %e, "media download failed");
            Err(ConversionError::new(
                format!("[{noun}]"),
                format!("failed to download {noun}"),
            ))
        }
    }
}

fn mention(target: MentionTarget, name: Option<&str>, options: &ConvertOptions) -> String {
    let label = match (name, target) {
        (Some(n), _) if !n.is_empty() => n.to_string(),
        (_, MentionTarget::User(id)) => id.to_string(),
        (_, MentionTarget::All) => "all".to_string(),
    };
    let label = escape_html(&label);
    match options.mention_link {
        Some(bot_id) => format!(r#"<a href="tg://user?id={bot_id}">@{label}</a>"#),
        None => format!("@{label}"),
    }
}

/// Share cards carry a link somewhere under `meta`; anything else is dumped.
fn app_card(payload: &str) -> Result<Contribution, ConversionError> {
    let card: Value = serde_json::from_str(payload)
        .map_err(|e| ConversionError::new("[json]", format!("invalid card payload: {e}")))?;

    if let Some((url, title)) = share_link(&card) {
        let title = title.unwrap_or_else(|| url.clone());
        return Ok(Contribution::text(format!(
            r#"[share]<a href="{}">{}</a>"#,
            escape_html(&url),
            escape_html(&title)
        )));
    }

    let app = card.get("app").and_then(Value::as_str).unwrap_or("unknown");
    warn!(app = %app, "unrecognized app card");
    let pretty = serde_json::to_string_pretty(&card)
        .map_err(|e| ConversionError::new("[json]", e.to_string()))?;
    Ok(Contribution::text(format!(
        "[json]\n<pre>{}</pre>",
        escape_html(&pretty)
    )))
}

fn share_link(card: &Value) -> Option<(String, Option<String>)> {
    let meta = card.get("meta")?.as_object()?;
    meta.values().find_map(|entry| {
        let url = ["jumpUrl", "qqdocurl", "url"]
            .iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_str))
            .filter(|u| u.starts_with("http://") || u.starts_with("https://"))?;
        let title = ["title", "desc"]
            .iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_str))
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Some((url.to_string(), title))
    })
}

fn is_gif(data: &[u8]) -> bool {
    data.starts_with(b"GIF8")
}

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn mention_link_or_plain() {
        let linked = ConvertOptions {
            mention_link: Some(900),
        };
        assert_eq!(
            mention(MentionTarget::User(7), Some("Bob"), &linked),
            r#"<a href="tg://user?id=900">@Bob</a>"#
        );
        assert_eq!(
            mention(MentionTarget::User(7), None, &ConvertOptions::default()),
            "@7"
        );
        assert_eq!(
            mention(MentionTarget::All, None, &ConvertOptions::default()),
            "@all"
        );
    }

    #[test]
    fn share_card_renders_link() {
        let payload = r#"{"app":"com.tencent.structmsg","meta":{"news":{"title":"A <b> story","jumpUrl":"https://example.com/a?x=1&y=2"}}}"#;
        let c = app_card(payload).unwrap();
        assert_eq!(
            c.text,
            r#"[share]<a href="https://example.com/a?x=1&amp;y=2">A &lt;b&gt; story</a>"#
        );
    }

    #[test]
    fn unrecognized_card_is_pretty_printed() {
        let c = app_card(r#"{"app":"x","meta":{}}"#).unwrap();
        assert!(c.text.starts_with("[json]\n<pre>{"));
        assert!(c.text.contains("&quot;app&quot;: &quot;x&quot;"));
    }

    #[test]
    fn broken_card_is_a_conversion_error() {
        let err = app_card("{not json").unwrap_err();
        assert_eq!(err.placeholder, "[json]");
        assert!(err.render().starts_with("[json][error: invalid card payload"));
    }

    #[test]
    fn gif_sniffing() {
        assert!(is_gif(b"GIF89a...."));
        assert!(!is_gif(b"\x89PNG"));
    }
}
