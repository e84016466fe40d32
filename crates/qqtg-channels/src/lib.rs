pub mod channel;
pub mod error;
pub mod event;
pub mod types;

pub use channel::{DestinationChannel, SourceChannel};
pub use error::ChannelError;
pub use event::{InboundEvent, SourceMessage, ThreadMessage};
pub use types::{
    DestinationSegment, FriendInfo, GroupInfo, MediaKind, MediaRef, MentionTarget,
    NeutralMessage, OutboundSegment, Segment, SourceOutbound, StickerFormat, TypedBlob,
};
