use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a QQ conversation.
///
/// Positive values are private chats keyed by the peer's QQ number, negative
/// values are groups stored as the negated group number. Zero is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ConversationId(i64);

/// The two kinds of QQ conversation, recovered from the sign of a [`ConversationId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Private(i64),
    Group(i64),
}

impl ConversationId {
    /// Conversation for a QQ group. `group_id` must be positive.
    pub fn group(group_id: i64) -> Option<Self> {
        (group_id > 0).then(|| Self(-group_id))
    }

    /// Conversation for a one-to-one chat with `user_id`. Must be positive.
    pub fn private(user_id: i64) -> Option<Self> {
        (user_id > 0).then_some(Self(user_id))
    }

    /// Rebuild from the stored signed representation.
    pub fn from_raw(raw: i64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }

    pub fn is_group(self) -> bool {
        self.0 < 0
    }

    pub fn peer(self) -> Peer {
        if self.0 < 0 {
            Peer::Group(-self.0)
        } else {
            Peer::Private(self.0)
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peer() {
            Peer::Group(id) => write!(f, "group:{id}"),
            Peer::Private(id) => write!(f, "private:{id}"),
        }
    }
}

impl TryFrom<i64> for ConversationId {
    type Error = String;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or_else(|| "conversation id must be non-zero".to_string())
    }
}

impl From<ConversationId> for i64 {
    fn from(id: ConversationId) -> Self {
        id.0
    }
}

/// Telegram forum topic id (`message_thread_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub i64);

/// Telegram message id within the forum supergroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DestMessageId(pub i64);

/// Telegram bot user id. Each configured bot token is one credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId(pub i64);

/// QQ-side message id, scoped to a [`ConversationId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceMessageKey(pub i64);

macro_rules! display_inner {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_inner!(ThreadId, DestMessageId, CredentialId, SourceMessageKey);
