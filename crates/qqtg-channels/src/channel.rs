use async_trait::async_trait;

use qqtg_core::types::{ConversationId, CredentialId, DestMessageId, SourceMessageKey, ThreadId};

use crate::{
    error::ChannelError,
    types::{FriendInfo, GroupInfo, MediaKind, MediaRef, NeutralMessage, SourceOutbound},
};

/// The QQ side of the bridge.
///
/// Implementations must be `Send + Sync`; the relay shares one instance across
/// every in-flight event task.
#[async_trait]
pub trait SourceChannel: Send + Sync {
    /// Download a file referenced by an inbound segment.
    async fn fetch_file(&self, kind: MediaKind, media: &MediaRef) -> Result<Vec<u8>, ChannelError>;

    /// Post `message` into `conversation`, optionally quoting `reply_to`.
    /// Returns the key of the message that carries the reply linkage.
    async fn send(
        &self,
        conversation: ConversationId,
        message: &SourceOutbound,
        reply_to: Option<SourceMessageKey>,
    ) -> Result<SourceMessageKey, ChannelError>;

    async fn group_info(&self, group_id: i64) -> Result<GroupInfo, ChannelError>;

    async fn friends(&self) -> Result<Vec<FriendInfo>, ChannelError>;

    async fn groups(&self) -> Result<Vec<GroupInfo>, ChannelError>;
}

/// One Telegram bot posting into the forum supergroup.
///
/// Sends take `&self` so a single credential can serve concurrent relays.
#[async_trait]
pub trait DestinationChannel: Send + Sync {
    /// Stable identity of this credential (the bot's user id).
    fn credential(&self) -> CredentialId;

    /// Create a forum topic named `name` and return its thread id.
    async fn create_thread(&self, name: &str) -> Result<ThreadId, ChannelError>;

    /// Post `message` into `thread`. Returns every message id produced, in
    /// send order; a media batch or a long text yields several.
    async fn send(
        &self,
        thread: ThreadId,
        message: &NeutralMessage,
        reply_to: Option<DestMessageId>,
    ) -> Result<Vec<DestMessageId>, ChannelError>;

    /// Download a file posted in the chat.
    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError>;

    /// Resolve a file to a URL another service can download directly.
    async fn file_url(&self, file_id: &str) -> Result<String, ChannelError>;

    /// Post an HTML notice to the operators.
    async fn notify_admin(&self, html: &str) -> Result<(), ChannelError>;
}
