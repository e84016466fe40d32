//! Operator commands understood by the master bot.

use qqtg_core::types::{DestMessageId, ThreadId};
use qqtg_relay::{escape_html, Bridge, RelayError};
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::error::TelegramError;
use crate::send;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ChatId,
    ListFriend,
    ListGroup,
    /// `None` when the argument is missing or not a number.
    InitFriend(Option<i64>),
    InitGroup(Option<i64>),
    Unknown(String),
}

/// Parse a `/command[@bot] [args]` line. Returns `None` for non-commands and
/// for commands addressed to a different bot.
pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let body = text.trim().strip_prefix('/')?;
    let mut parts = body.split_whitespace();
    let head = parts.next()?;
    let (name, target) = match head.split_once('@') {
        Some((name, target)) => (name, Some(target)),
        None => (head, None),
    };
    if let (Some(target), Some(me)) = (target, bot_username) {
        if !target.eq_ignore_ascii_case(me) {
            return None;
        }
    }
    let arg = parts.next().and_then(|a| a.parse::<i64>().ok());

    Some(match name.to_ascii_lowercase().as_str() {
        "chat_id" => Command::ChatId,
        "list_friend" => Command::ListFriend,
        "list_group" => Command::ListGroup,
        "init_friend" => Command::InitFriend(arg),
        "init_group" => Command::InitGroup(arg),
        other => Command::Unknown(other.to_string()),
    })
}

/// Run `command` and reply in the thread it came from.
pub async fn execute(
    bot: &Bot,
    msg: &Message,
    command: Command,
    bridge: &Bridge,
) -> Result<(), TelegramError> {
    info!(command = ?command, chat_id = msg.chat.id.0, "operator command");
    let reply = match command {
        Command::ChatId => msg.chat.id.0.to_string(),
        Command::ListFriend => match bridge.source().friends().await {
            Ok(friends) if friends.is_empty() => "(no friends)".to_string(),
            Ok(friends) => friends
                .iter()
                .map(|f| format!("{} {}", f.user_id, f.display_name()))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => format!("failed: {e}"),
        },
        Command::ListGroup => match bridge.source().groups().await {
            Ok(groups) if groups.is_empty() => "(no groups)".to_string(),
            Ok(groups) => {
                let lines = groups
                    .iter()
                    .map(|g| format!("{} {}", g.group_id, g.group_name))
                    .collect::<Vec<_>>()
                    .join("\n");
                for g in groups {
                    bridge.groups().insert(g);
                }
                lines
            }
            Err(e) => format!("failed: {e}"),
        },
        Command::InitFriend(None) | Command::InitGroup(None) => "bad argument".to_string(),
        Command::InitFriend(Some(user_id)) => init_reply(bridge.init_friend(user_id).await),
        Command::InitGroup(Some(group_id)) => init_reply(bridge.init_group(group_id).await),
        Command::Unknown(_) => "unknown command!".to_string(),
    };

    send::send_html(
        bot,
        msg.chat.id,
        msg.thread_id,
        &escape_html(&reply),
        Some(DestMessageId(i64::from(msg.id.0))),
    )
    .await?;
    Ok(())
}

fn init_reply(result: Result<ThreadId, RelayError>) -> String {
    match result {
        Ok(thread) => format!("successfully created topic {thread}"),
        Err(RelayError::InvalidId { .. }) => "bad argument".to_string(),
        Err(e) => {
            warn!(error = %e, "topic initialisation failed");
            format!("failed: {e}")
        }
    }
}
