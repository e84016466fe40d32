//! Telegram message handler registered in the teloxide Dispatcher.

use std::sync::Arc;

use qqtg_channels::{DestinationChannel, InboundEvent, ThreadMessage};
use qqtg_core::types::DestMessageId;
use qqtg_relay::Bridge;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use tracing::{debug, warn};

use crate::attach;
use crate::commands;
use crate::credential::{from_tg_thread, TelegramCredential};

/// Main message handler registered in the teloxide Dispatcher.
///
/// Runs for every incoming `Message` seen by the master bot:
/// 1. Author filter (humans and anonymous admins only)
/// 2. Chat filter (only the configured forum supergroup)
/// 3. Operator command interception
/// 4. Topic filter (General and non-forum messages are not relayed)
/// 5. Non-blocking relay to QQ
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    bridge: Arc<Bridge>,
    master: Arc<TelegramCredential>,
) -> ResponseResult<()> {
    // 1. Ignore messages from bots, including our own relays.
    if !is_relayable_author(&msg, master.chat_id()) {
        return Ok(());
    }

    // 2. Only the forum we relay into.
    if msg.chat.id != master.chat_id() {
        debug!(chat_id = msg.chat.id.0, "message outside the relay chat");
        return Ok(());
    }

    // 3. Operator commands.
    let text = msg.text().unwrap_or("");
    if text.starts_with('/') {
        if let Some(command) = commands::parse(text, master.username()) {
            tokio::spawn(async move {
                if let Err(e) = commands::execute(&bot, &msg, command, &bridge).await {
                    warn!(error = %e, "Telegram: command reply failed");
                }
            });
        }
        return Ok(());
    }

    // 4. Only topic messages map to a QQ conversation.
    let Some(thread) = msg.thread_id.filter(|_| msg.is_topic_message) else {
        return Ok(());
    };

    // 5. Relay in a separate task.
    let event = InboundEvent::ThreadMessage(thread_message(&msg, thread, master.credential()));
    tokio::spawn(async move {
        bridge.handle(event).await;
    });

    Ok(())
}

/// Humans, plus admins posting anonymously: those arrive from
/// `GroupAnonymousBot` (a bot account) with `sender_chat` set to the forum.
fn is_relayable_author(msg: &Message, forum: ChatId) -> bool {
    if msg.sender_chat.as_ref().is_some_and(|chat| chat.id == forum) {
        return true;
    }
    msg.from.as_ref().is_some_and(|u| !u.is_bot)
}

fn sender_name(msg: &Message) -> String {
    if let Some(chat) = &msg.sender_chat {
        return chat.title().unwrap_or("anonymous admin").to_string();
    }
    msg.from
        .as_ref()
        .map(|u| u.full_name())
        .unwrap_or_default()
}

fn thread_message(
    msg: &Message,
    thread: teloxide::types::ThreadId,
    credential: qqtg_core::types::CredentialId,
) -> ThreadMessage {
    ThreadMessage {
        thread: from_tg_thread(thread),
        message: DestMessageId(i64::from(msg.id.0)),
        credential,
        sender_name: sender_name(msg),
        reply_to: msg
            .reply_to_message()
            .map(|r| DestMessageId(i64::from(r.id.0))),
        segments: attach::segments(msg),
        raw: serde_json::to_string(msg).unwrap_or_default(),
    }
}
