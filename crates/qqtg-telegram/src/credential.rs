use async_trait::async_trait;
use qqtg_channels::{ChannelError, DestinationChannel, NeutralMessage};
use qqtg_core::config::TelegramConfig;
use qqtg_core::types::{CredentialId, DestMessageId, ThreadId};
use teloxide::prelude::*;
use teloxide::types::{MessageId, ThreadId as TgThreadId};
use tracing::info;

use crate::{attach, error::TelegramError, send};

/// One bot token, bound to the forum supergroup.
pub struct TelegramCredential {
    bot: Bot,
    id: CredentialId,
    username: Option<String>,
    chat_id: ChatId,
    admin_thread: Option<TgThreadId>,
    max_attachment_bytes: u64,
}

impl TelegramCredential {
    /// Build the bot and resolve its identity with `getMe`.
    pub async fn connect(token: &str, config: &TelegramConfig) -> Result<Self, TelegramError> {
        if token.trim().is_empty() {
            return Err(TelegramError::NoToken);
        }
        let bot = Bot::new(token.trim());
        let me = bot.get_me().await?;
        info!(bot_id = me.user.id.0, username = ?me.user.username, "telegram bot connected");
        Ok(Self {
            id: CredentialId(me.user.id.0 as i64),
            username: me.user.username.clone(),
            bot,
            chat_id: ChatId(config.chat_id),
            admin_thread: config.admin_thread_id.map(|t| TgThreadId(MessageId(t))),
            max_attachment_bytes: config.max_attachment_bytes,
        })
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

/// Forum topic ids are message ids, which Telegram keeps within `i32`.
pub fn to_tg_thread(thread: ThreadId) -> Result<TgThreadId, TelegramError> {
    i32::try_from(thread.0)
        .map(|id| TgThreadId(MessageId(id)))
        .map_err(|_| TelegramError::OutOfRange {
            what: "thread id",
            id: thread.0,
        })
}

pub fn from_tg_thread(thread: TgThreadId) -> ThreadId {
    ThreadId(i64::from(thread.0 .0))
}

#[async_trait]
impl DestinationChannel for TelegramCredential {
    fn credential(&self) -> CredentialId {
        self.id
    }

    async fn create_thread(&self, name: &str) -> Result<ThreadId, ChannelError> {
        let topic = self
            .bot
            .create_forum_topic(self.chat_id, name)
            .await
            .map_err(TelegramError::from)?;
        Ok(from_tg_thread(topic.thread_id))
    }

    async fn send(
        &self,
        thread: ThreadId,
        message: &NeutralMessage,
        reply_to: Option<DestMessageId>,
    ) -> Result<Vec<DestMessageId>, ChannelError> {
        let thread = to_tg_thread(thread)?;
        Ok(send::send_neutral(&self.bot, self.chat_id, thread, message, reply_to).await?)
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError> {
        Ok(attach::download(&self.bot, file_id, self.max_attachment_bytes).await?)
    }

    async fn file_url(&self, file_id: &str) -> Result<String, ChannelError> {
        let file = self
            .bot
            .get_file(file_id)
            .await
            .map_err(TelegramError::from)?;
        // Embeds the token; only handed to the local OneBot implementation.
        Ok(format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        ))
    }

    async fn notify_admin(&self, html: &str) -> Result<(), ChannelError> {
        send::send_html(&self.bot, self.chat_id, self.admin_thread, html, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_ids_round_trip_within_i32() {
        let tg = to_tg_thread(ThreadId(17)).unwrap();
        assert_eq!(tg, TgThreadId(MessageId(17)));
        assert_eq!(from_tg_thread(tg), ThreadId(17));
    }

    #[test]
    fn oversized_thread_id_rejected() {
        assert!(matches!(
            to_tg_thread(ThreadId(i64::from(i32::MAX) + 1)),
            Err(TelegramError::OutOfRange { .. })
        ));
    }
}
