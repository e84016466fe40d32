//! Inbound side of the Telegram adapter: turning a topic message into
//! destination segments, and downloading the files they reference.

use qqtg_channels::{DestinationSegment, StickerFormat};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{MediaKind, MessageKind};
use tracing::warn;

use crate::error::TelegramError;

/// Segments of `msg` in display order: the attachment first, then its text
/// or caption.
pub fn segments(msg: &Message) -> Vec<DestinationSegment> {
    let MessageKind::Common(common) = &msg.kind else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let caption = match &common.media_kind {
        MediaKind::Text(t) => Some(t.text.clone()),
        MediaKind::Photo(p) => {
            if let Some(largest) = p.photo.last() {
                out.push(DestinationSegment::Photo {
                    file_id: largest.file.id.clone(),
                });
            }
            p.caption.clone()
        }
        MediaKind::Animation(a) => {
            out.push(DestinationSegment::Animation {
                file_id: a.animation.file.id.clone(),
            });
            a.caption.clone()
        }
        MediaKind::Sticker(s) => {
            let sticker = &s.sticker;
            let format = if sticker.is_animated() {
                StickerFormat::Animated
            } else if sticker.is_video() {
                StickerFormat::Video
            } else {
                StickerFormat::Static
            };
            out.push(DestinationSegment::Sticker {
                file_id: sticker.file.id.clone(),
                format,
                thumbnail: sticker.thumbnail.as_ref().map(|t| t.file.id.clone()),
            });
            None
        }
        MediaKind::Document(d) => {
            out.push(DestinationSegment::Document {
                file_id: d.document.file.id.clone(),
                name: d.document.file_name.clone(),
            });
            d.caption.clone()
        }
        MediaKind::Video(v) => {
            out.push(DestinationSegment::Document {
                file_id: v.video.file.id.clone(),
                name: Some(
                    v.video
                        .file_name
                        .clone()
                        .unwrap_or_else(|| "video.mp4".to_string()),
                ),
            });
            v.caption.clone()
        }
        MediaKind::Audio(a) => {
            out.push(DestinationSegment::Document {
                file_id: a.audio.file.id.clone(),
                name: a.audio.file_name.clone(),
            });
            a.caption.clone()
        }
        MediaKind::Voice(v) => {
            out.push(DestinationSegment::Document {
                file_id: v.voice.file.id.clone(),
                name: Some("voice.ogg".to_string()),
            });
            v.caption.clone()
        }
        other => {
            out.push(DestinationSegment::Unsupported {
                kind: unsupported_kind(other).to_string(),
            });
            None
        }
    };

    if let Some(text) = caption.filter(|t| !t.is_empty()) {
        out.push(DestinationSegment::Text { text });
    }
    out
}

fn unsupported_kind(kind: &MediaKind) -> &'static str {
    match kind {
        MediaKind::Contact(_) => "contact",
        MediaKind::Game(_) => "game",
        MediaKind::Location(_) => "location",
        MediaKind::Poll(_) => "poll",
        MediaKind::Venue(_) => "venue",
        MediaKind::VideoNote(_) => "video_note",
        _ => "unsupported",
    }
}

/// Download a file via `getFile` + the file endpoint, refusing anything above
/// `max_bytes`.
pub async fn download(bot: &Bot, file_id: &str, max_bytes: u64) -> Result<Vec<u8>, TelegramError> {
    let file = bot.get_file(file_id).await?;

    if u64::from(file.size) > max_bytes {
        warn!(
            file_id,
            size = file.size,
            limit = max_bytes,
            "Telegram: file exceeds size limit, skipping"
        );
        return Err(TelegramError::TooLarge {
            size: u64::from(file.size),
            max: max_bytes,
        });
    }

    let mut buf: Vec<u8> = Vec::new();
    bot.download_file(&file.path, &mut buf).await?;
    Ok(buf)
}
