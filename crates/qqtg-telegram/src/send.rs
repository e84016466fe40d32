//! Outbound delivery for the Telegram adapter.
//!
//! Text goes out as HTML, split at Telegram's 4096-character limit. Markup
//! that is open at a split is closed before the boundary and re-opened in the
//! next chunk. Attachments are grouped into albums Telegram accepts; the text
//! rides along as the caption of the first one when it fits.

use qqtg_channels::{MediaKind, NeutralMessage, TypedBlob};
use qqtg_core::types::DestMessageId;
use teloxide::prelude::*;
use teloxide::types::{
    InputFile, InputMedia, InputMediaAudio, InputMediaDocument, InputMediaPhoto, InputMediaVideo,
    MessageId, ParseMode, ReplyParameters, ThreadId,
};
use tracing::debug;

use crate::error::TelegramError;

/// Telegram's message length limit, in UTF-16 code units of visible text.
pub const MESSAGE_MAX: usize = 4096;
/// Caption length limit.
pub const CAPTION_MAX: usize = 1024;
/// Telegram accepts between 2 and 10 items per album.
const ALBUM_MAX: usize = 10;

enum Token<'a> {
    Open { name: String, raw: &'a str },
    Close { name: String, raw: &'a str },
    /// One character or one entity; `width` is its visible UTF-16 length.
    Visible { raw: &'a str, width: usize },
}

impl Token<'_> {
    fn raw(&self) -> &str {
        match self {
            Token::Open { raw, .. } | Token::Close { raw, .. } | Token::Visible { raw, .. } => raw,
        }
    }
}

fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = html;
    while let Some(c) = rest.chars().next() {
        if c == '<' {
            if let Some(end) = rest.find('>') {
                let raw = &rest[..=end];
                let inner = raw[1..raw.len() - 1].trim();
                let token = match inner.strip_prefix('/') {
                    Some(name) => Token::Close {
                        name: name.trim().to_ascii_lowercase(),
                        raw,
                    },
                    None => Token::Open {
                        name: inner
                            .split_whitespace()
                            .next()
                            .unwrap_or_default()
                            .to_ascii_lowercase(),
                        raw,
                    },
                };
                tokens.push(token);
                rest = &rest[end + 1..];
                continue;
            }
        }
        if c == '&' {
            let entity_end = rest
                .char_indices()
                .take(10)
                .find(|(_, ch)| *ch == ';')
                .map(|(i, _)| i);
            if let Some(end) = entity_end {
                tokens.push(Token::Visible {
                    raw: &rest[..=end],
                    width: 1,
                });
                rest = &rest[end + 1..];
                continue;
            }
        }
        let len = c.len_utf8();
        tokens.push(Token::Visible {
            raw: &rest[..len],
            width: c.len_utf16(),
        });
        rest = &rest[len..];
    }
    tokens
}

type OpenTags<'a> = Vec<(String, &'a str)>;

/// Split HTML into chunks of at most `max` visible UTF-16 units, preferring
/// line breaks. Each chunk is well-formed on its own.
pub fn split_html(html: &str, max: usize) -> Vec<String> {
    let tokens = tokenize(html);
    if tokens.is_empty() {
        return vec![html.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut opened: OpenTags<'_> = Vec::new();

    while start < tokens.len() {
        let mut stack = opened.clone();
        let mut width = 0;
        let mut last_newline: Option<(usize, OpenTags<'_>)> = None;
        let mut cut: Option<(usize, OpenTags<'_>)> = None;

        for (i, token) in tokens.iter().enumerate().skip(start) {
            match token {
                Token::Open { name, raw } => stack.push((name.clone(), *raw)),
                Token::Close { name, .. } => {
                    if let Some(pos) = stack.iter().rposition(|(n, _)| n == name) {
                        stack.truncate(pos);
                    }
                }
                Token::Visible { raw, width: w } => {
                    if width + w > max && i > start {
                        cut = Some(last_newline.take().unwrap_or_else(|| (i, stack.clone())));
                        break;
                    }
                    width += w;
                    if *raw == "\n" {
                        last_newline = Some((i + 1, stack.clone()));
                    }
                }
            }
        }

        let mut chunk: String = opened.iter().map(|(_, raw)| *raw).collect();
        match cut {
            Some((end, end_stack)) => {
                for token in &tokens[start..end] {
                    chunk.push_str(token.raw());
                }
                for (name, _) in end_stack.iter().rev() {
                    chunk.push_str(&format!("</{name}>"));
                }
                opened = end_stack;
                start = end;
            }
            None => {
                for token in &tokens[start..] {
                    chunk.push_str(token.raw());
                }
                start = tokens.len();
            }
        }
        chunks.push(chunk);
    }
    chunks
}

/// Visible length of an HTML string, as Telegram counts it.
pub fn visible_len(html: &str) -> usize {
    tokenize(html)
        .iter()
        .map(|t| match t {
            Token::Visible { width, .. } => *width,
            _ => 0,
        })
        .sum()
}

fn reply_parameters(reply_to: Option<DestMessageId>) -> Option<ReplyParameters> {
    reply_to
        .and_then(|id| i32::try_from(id.0).ok())
        .map(|id| ReplyParameters::new(MessageId(id)).allow_sending_without_reply())
}

/// Send `html` as one or more messages. Only the first carries the reply.
pub async fn send_html(
    bot: &Bot,
    chat_id: ChatId,
    thread: Option<ThreadId>,
    html: &str,
    reply_to: Option<DestMessageId>,
) -> Result<Vec<DestMessageId>, TelegramError> {
    let mut reply = reply_parameters(reply_to);
    let mut ids = Vec::new();
    for chunk in split_html(html, MESSAGE_MAX) {
        let mut req = bot.send_message(chat_id, chunk).parse_mode(ParseMode::Html);
        if let Some(thread) = thread {
            req = req.message_thread_id(thread);
        }
        if let Some(rp) = reply.take() {
            req = req.reply_parameters(rp);
        }
        match req.await {
            Ok(sent) => ids.push(DestMessageId(i64::from(sent.id.0))),
            Err(e) => return Err(TelegramError::from(e).after(ids)),
        }
    }
    Ok(ids)
}

/// Album compatibility classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Album {
    Visual,
    Audio,
    Document,
    /// Animations cannot be grouped.
    Single,
}

fn album_of(kind: MediaKind) -> Album {
    match kind {
        MediaKind::Photo | MediaKind::Video => Album::Visual,
        MediaKind::Audio => Album::Audio,
        MediaKind::Document => Album::Document,
        MediaKind::Animation => Album::Single,
    }
}

/// Partition attachments into sendable batches, preserving order.
fn batches(media: &[TypedBlob]) -> Vec<&[TypedBlob]> {
    let mut out = Vec::new();
    let mut start = 0;
    for i in 1..=media.len() {
        let boundary = i == media.len()
            || i - start == ALBUM_MAX
            || album_of(media[i].kind) != album_of(media[start].kind)
            || album_of(media[start].kind) == Album::Single;
        if boundary {
            out.push(&media[start..i]);
            start = i;
        }
    }
    out
}

fn input_file(blob: &TypedBlob) -> InputFile {
    let name = blob.file_name.clone().unwrap_or_else(|| {
        match blob.kind {
            MediaKind::Photo => "image.jpg",
            MediaKind::Video => "video.mp4",
            MediaKind::Audio => "audio",
            MediaKind::Document => "file",
            MediaKind::Animation => "image.gif",
        }
        .to_string()
    });
    InputFile::memory(blob.data.clone()).file_name(name)
}

fn input_media(blob: &TypedBlob, caption: Option<&str>) -> InputMedia {
    let file = input_file(blob);
    macro_rules! captioned {
        ($ty:ident, $variant:ident) => {{
            let mut m = $ty::new(file);
            if let Some(c) = caption {
                m = m.caption(c).parse_mode(ParseMode::Html);
            }
            InputMedia::$variant(m)
        }};
    }
    match blob.kind {
        MediaKind::Photo => captioned!(InputMediaPhoto, Photo),
        MediaKind::Video => captioned!(InputMediaVideo, Video),
        MediaKind::Audio => captioned!(InputMediaAudio, Audio),
        MediaKind::Document | MediaKind::Animation => captioned!(InputMediaDocument, Document),
    }
}

async fn send_single(
    bot: &Bot,
    chat_id: ChatId,
    thread: ThreadId,
    blob: &TypedBlob,
    caption: Option<&str>,
    reply: Option<ReplyParameters>,
) -> Result<Message, TelegramError> {
    let file = input_file(blob);
    macro_rules! send {
        ($method:ident) => {{
            let mut req = bot.$method(chat_id, file).message_thread_id(thread);
            if let Some(c) = caption {
                req = req.caption(c).parse_mode(ParseMode::Html);
            }
            if let Some(rp) = reply {
                req = req.reply_parameters(rp);
            }
            req.await?
        }};
    }
    Ok(match blob.kind {
        MediaKind::Photo => send!(send_photo),
        MediaKind::Video => send!(send_video),
        MediaKind::Audio => send!(send_audio),
        MediaKind::Document => send!(send_document),
        MediaKind::Animation => send!(send_animation),
    })
}

/// Deliver a converted message into `thread`. Returns every message id in
/// send order; a failure after the first delivery is a
/// [`TelegramError::Partial`] carrying the ids that did go out.
pub async fn send_neutral(
    bot: &Bot,
    chat_id: ChatId,
    thread: ThreadId,
    message: &NeutralMessage,
    reply_to: Option<DestMessageId>,
) -> Result<Vec<DestMessageId>, TelegramError> {
    if message.media.is_empty() {
        return send_html(bot, chat_id, Some(thread), &message.text, reply_to).await;
    }

    let mut ids = Vec::new();
    let mut reply = reply_parameters(reply_to);
    let mut caption = Some(message.text.as_str()).filter(|t| !t.is_empty());

    if caption.is_some_and(|c| visible_len(c) > CAPTION_MAX) {
        debug!(len = message.text.len(), "caption too long, sending text first");
        ids = send_html(bot, chat_id, Some(thread), &message.text, reply_to).await?;
        caption = None;
        reply = None;
    }

    for batch in batches(&message.media) {
        let batch_caption = caption.take();
        let batch_reply = reply.take();
        if let [blob] = batch {
            match send_single(bot, chat_id, thread, blob, batch_caption, batch_reply).await {
                Ok(sent) => ids.push(DestMessageId(i64::from(sent.id.0))),
                Err(e) => return Err(e.after(ids)),
            }
            continue;
        }

        let media: Vec<InputMedia> = batch
            .iter()
            .enumerate()
            .map(|(i, blob)| input_media(blob, if i == 0 { batch_caption } else { None }))
            .collect();
        let mut req = bot.send_media_group(chat_id, media).message_thread_id(thread);
        if let Some(rp) = batch_reply {
            req = req.reply_parameters(rp);
        }
        match req.await {
            Ok(sent) => ids.extend(sent.iter().map(|m| DestMessageId(i64::from(m.id.0)))),
            Err(e) => return Err(TelegramError::from(e).after(ids)),
        }
    }
    Ok(ids)
}
