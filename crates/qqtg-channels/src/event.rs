use qqtg_core::types::{ConversationId, CredentialId, DestMessageId, SourceMessageKey, ThreadId};

use crate::types::{DestinationSegment, Segment};

/// Every inbound event the relay understands, from either platform.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    GroupMessage(SourceMessage),
    PrivateMessage(SourceMessage),
    ThreadMessage(ThreadMessage),
    /// Parsed envelope the relay does not handle (notices, self messages, ...).
    Unrecognized { description: String },
}

impl InboundEvent {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::GroupMessage(_) => "message.group",
            InboundEvent::PrivateMessage(_) => "message.private",
            InboundEvent::ThreadMessage(_) => "message.thread",
            InboundEvent::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// A QQ message, already attributed to its conversation.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub conversation: ConversationId,
    pub key: SourceMessageKey,
    pub sender_id: i64,
    /// Group card if set, nickname otherwise.
    pub sender_name: String,
    /// Group name when the transport reports it inline.
    pub chat_name: Option<String>,
    /// The earlier QQ message this one replies to.
    pub reply_to: Option<SourceMessageKey>,
    pub segments: Vec<Segment>,
    /// Original payload, included verbatim in failure reports.
    pub raw: String,
}

/// A message posted by a human inside one of the Telegram forum topics.
#[derive(Debug, Clone)]
pub struct ThreadMessage {
    pub thread: ThreadId,
    pub message: DestMessageId,
    /// Bot that received the update.
    pub credential: CredentialId,
    pub sender_name: String,
    /// Telegram message this one replies to. The topic root is never set here.
    pub reply_to: Option<DestMessageId>,
    pub segments: Vec<DestinationSegment>,
    pub raw: String,
}
