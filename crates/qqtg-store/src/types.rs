use serde::Serialize;

use qqtg_core::types::{ConversationId, CredentialId, DestMessageId, SourceMessageKey, ThreadId};

/// A QQ conversation and the Telegram topic that mirrors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ForumTopicMapping {
    pub conversation: ConversationId,
    pub thread: ThreadId,
}

/// Links one QQ message to one Telegram message in the conversation's topic.
///
/// `credential` is the bot that sent (or received) the Telegram side; replies
/// to `dest_message` must go out through the same bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageCorrelation {
    pub conversation: ConversationId,
    pub source_key: SourceMessageKey,
    pub credential: CredentialId,
    pub thread: ThreadId,
    pub dest_message: DestMessageId,
}
