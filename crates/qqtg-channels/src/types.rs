use serde::{Deserialize, Serialize};

/// One piece of an inbound QQ message, in the order it appeared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Mention { target: MentionTarget, name: Option<String> },
    Face { id: i32 },
    MarketFace { name: String },
    Image { media: MediaRef, animated: bool },
    Voice { media: MediaRef },
    Video { media: MediaRef },
    File { media: MediaRef, name: Option<String> },
    /// Structured share / mini-app card. `payload` is the raw JSON text.
    AppCard { payload: String },
    /// Anything the parser does not model. `kind` is the platform's tag.
    Unknown { kind: String, raw: serde_json::Value },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionTarget {
    User(i64),
    All,
}

/// Handle to a QQ-side file: the platform file token plus a direct URL when
/// the implementation reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub file: String,
    pub url: Option<String>,
}

/// Telegram attachment types a converted message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Document,
    Audio,
    Video,
    Animation,
}

impl MediaKind {
    /// Human word used in placeholders and error markers.
    pub fn noun(self) -> &'static str {
        match self {
            MediaKind::Photo => "image",
            MediaKind::Document => "file",
            MediaKind::Audio => "voice",
            MediaKind::Video => "video",
            MediaKind::Animation => "animation",
        }
    }
}

/// Attachment bytes ready to upload.
#[derive(Clone, PartialEq, Eq)]
pub struct TypedBlob {
    pub kind: MediaKind,
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

impl std::fmt::Debug for TypedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedBlob")
            .field("kind", &self.kind)
            .field("bytes", &self.data.len())
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Platform-neutral message produced by the forward converter.
///
/// `text` is already rendered for the destination (HTML, escaped).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeutralMessage {
    pub text: String,
    pub media: Vec<TypedBlob>,
}

/// One piece of a message posted inside a Telegram topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationSegment {
    Text { text: String },
    Photo { file_id: String },
    Animation { file_id: String },
    Sticker {
        file_id: String,
        format: StickerFormat,
        thumbnail: Option<String>,
    },
    Document { file_id: String, name: Option<String> },
    Unsupported { kind: String },
}

/// Telegram sticker encodings. Only `Static` stickers keep their motion on
/// the QQ side; `Animated` and `Video` stickers arrive in QQ as a still image
/// (the sticker's thumbnail), or as an error note when there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StickerFormat {
    /// WebP. An animated WebP becomes a looping GIF, a still one a PNG.
    Static,
    /// Lottie (`.tgs`). Delivered to QQ as its still thumbnail.
    Animated,
    /// WebM. Delivered to QQ as its still thumbnail.
    Video,
}

/// What the reverse converter hands to the QQ side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOutbound {
    pub segments: Vec<OutboundSegment>,
}

impl SourceOutbound {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum OutboundSegment {
    Text(String),
    /// Encoded image bytes (JPEG/PNG/GIF).
    Image(Vec<u8>),
    /// A file the QQ side uploads itself from `url`.
    File { url: String, name: Option<String> },
}

impl std::fmt::Debug for OutboundSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboundSegment::Text(t) => f.debug_tuple("Text").field(t).finish(),
            OutboundSegment::Image(b) => write!(f, "Image({} bytes)", b.len()),
            OutboundSegment::File { name, .. } => {
                f.debug_struct("File").field("name", name).finish_non_exhaustive()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: i64,
    pub group_name: String,
    #[serde(default)]
    pub member_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendInfo {
    pub user_id: i64,
    pub nickname: String,
    #[serde(default)]
    pub remark: Option<String>,
}

impl FriendInfo {
    /// Remark when set, nickname otherwise.
    pub fn display_name(&self) -> &str {
        self.remark
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.nickname)
    }
}
