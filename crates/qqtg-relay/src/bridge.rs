//! Forward (QQ → Telegram) and reverse (Telegram → QQ) relay flows.

use std::sync::Arc;
use std::time::Duration;

use qqtg_channels::{
    DestinationChannel, InboundEvent, NeutralMessage, SourceChannel, SourceMessage, ThreadMessage,
};
use qqtg_core::config::RelayConfig;
use qqtg_core::types::{ConversationId, Peer, ThreadId};
use qqtg_store::{CorrelationStore, MessageCorrelation};
use tracing::{debug, info, warn};

use crate::convert::{convert, escape_html, ConvertOptions};
use crate::error::RelayError;
use crate::identicon::identicon;
use crate::metadata::GroupDirectory;
use crate::pool::CredentialPool;
use crate::registry::TopicRegistry;
use crate::reverse::convert_reverse;

/// Raw payloads longer than this are cut in failure reports.
const MAX_REPORT_RAW_CHARS: usize = 3000;

#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub show_identicon: bool,
    pub mention_links: bool,
    pub group_cache_ttl: Duration,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for RelayOptions {
    fn from(cfg: &RelayConfig) -> Self {
        Self {
            show_identicon: cfg.show_identicon,
            mention_links: cfg.mention_links,
            group_cache_ttl: Duration::from_secs(cfg.group_cache_ttl_secs),
        }
    }
}

/// The relay service. Built once at startup and shared behind an `Arc`; every
/// inbound event is handed to [`Bridge::handle`] from its own task.
pub struct Bridge {
    store: Arc<CorrelationStore>,
    source: Arc<dyn SourceChannel>,
    pool: CredentialPool,
    registry: TopicRegistry,
    groups: GroupDirectory,
    options: RelayOptions,
}

impl Bridge {
    /// `credentials` must be non-empty; the first one is the master bot.
    pub fn new(
        store: Arc<CorrelationStore>,
        source: Arc<dyn SourceChannel>,
        credentials: Vec<Arc<dyn DestinationChannel>>,
        options: RelayOptions,
    ) -> Result<Self, RelayError> {
        let pool = CredentialPool::new(credentials)?;
        let registry = TopicRegistry::new(Arc::clone(&store), Arc::clone(pool.master()));
        Ok(Self {
            store,
            source,
            pool,
            registry,
            groups: GroupDirectory::new(options.group_cache_ttl),
            options,
        })
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    pub fn source(&self) -> &Arc<dyn SourceChannel> {
        &self.source
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn groups(&self) -> &GroupDirectory {
        &self.groups
    }

    /// Relay one event. Failures are logged and reported to the admin topic;
    /// they never propagate.
    pub async fn handle(&self, event: InboundEvent) {
        let name = event.name();
        let (result, raw) = match &event {
            InboundEvent::GroupMessage(msg) | InboundEvent::PrivateMessage(msg) => {
                (self.relay_forward(msg).await.map(|_| ()), msg.raw.as_str())
            }
            InboundEvent::ThreadMessage(msg) => {
                (self.relay_reverse(msg).await.map(|_| ()), msg.raw.as_str())
            }
            InboundEvent::Unrecognized { description } => {
                warn!(event = %description, "unsupported event");
                return;
            }
        };

        if let Err(e) = result {
            warn!(event = name, error = %e, "relay failed");
            self.report(name, &e, raw).await;
        }
    }

    async fn report(&self, event: &str, error: &RelayError, raw: &str) {
        let raw = truncate_chars(raw, MAX_REPORT_RAW_CHARS);
        let html = format!(
            "<b>relay failed</b> ({event}): {}\n<pre>{}</pre>",
            escape_html(&error.to_string()),
            escape_html(&raw)
        );
        if let Err(e) = self.pool.master().notify_admin(&html).await {
            warn!(error = %e, "could not post failure report");
        }
    }

    /// QQ → Telegram. Returns one correlation per Telegram message produced.
    /// When a send fails part way, the messages that did go out are still
    /// recorded before the error is returned.
    pub async fn relay_forward(
        &self,
        msg: &SourceMessage,
    ) -> Result<Vec<MessageCorrelation>, RelayError> {
        let conversation = msg.conversation;
        let display_name = self.display_name(msg).await;
        let thread = self
            .registry
            .resolve_or_create(conversation, &display_name)
            .await?;

        let reply = match msg.reply_to {
            Some(key) => {
                let found = self.store.find_by_source(conversation, key)?;
                if found.is_none() {
                    debug!(conversation = %conversation, key = %key, "reply target not relayed");
                }
                found
            }
            None => None,
        };

        let options = ConvertOptions {
            mention_link: self
                .options
                .mention_links
                .then(|| self.pool.master().credential().0),
        };
        let body = convert(self.source.as_ref(), &msg.segments, &options).await;
        let message = self.compose(msg, body);

        let sent = self
            .pool
            .send(
                reply.map(|r| r.credential),
                thread,
                &message,
                reply.map(|r| r.dest_message),
            )
            .await;
        // Whatever reached Telegram gets recorded, even if the send then failed.
        let (credential, ids, send_error) = match sent {
            Ok((credential, ids)) => (credential, ids, None),
            Err(RelayError::Partial {
                credential,
                sent,
                source,
            }) => {
                warn!(
                    conversation = %conversation,
                    key = %msg.key,
                    delivered = sent.len(),
                    error = %source,
                    "send failed part way"
                );
                let ids = sent.clone();
                let error = RelayError::Partial {
                    credential,
                    sent,
                    source,
                };
                (credential, ids, Some(error))
            }
            Err(e) => return Err(e),
        };

        let mut stored = Vec::with_capacity(ids.len());
        let mut store_error = None;
        for dest_message in ids {
            let corr = MessageCorrelation {
                conversation,
                source_key: msg.key,
                credential,
                thread,
                dest_message,
            };
            match self.store.insert_message(&corr) {
                Ok(()) => stored.push(corr),
                Err(e) => {
                    warn!(dest_message = %dest_message, error = %e, "could not record correlation");
                    store_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = send_error {
            return Err(e);
        }
        if let Some(e) = store_error {
            return Err(e.into());
        }
        info!(
            conversation = %conversation,
            key = %msg.key,
            thread = %thread,
            credential = %credential,
            messages = stored.len(),
            "relayed to telegram"
        );
        Ok(stored)
    }

    /// Prefix group messages with the sender; substitute `(empty)` for a
    /// message with nothing to show.
    fn compose(&self, msg: &SourceMessage, mut body: NeutralMessage) -> NeutralMessage {
        if body.text.is_empty() && body.media.is_empty() {
            body.text.push_str("(empty)");
        }
        if msg.conversation.is_group() {
            let mut header = String::new();
            if self.options.show_identicon {
                header.push_str(&identicon(msg.sender_id));
                header.push(' ');
            }
            header.push_str(&format!(
                "<u><b>{}</b>:</u>\n",
                escape_html(&msg.sender_name)
            ));
            body.text.insert_str(0, &header);
        }
        body
    }

    async fn display_name(&self, msg: &SourceMessage) -> String {
        match msg.conversation.peer() {
            Peer::Private(user_id) => {
                if msg.sender_name.trim().is_empty() {
                    user_id.to_string()
                } else {
                    msg.sender_name.clone()
                }
            }
            Peer::Group(group_id) => {
                if let Some(name) = msg.chat_name.as_deref().filter(|n| !n.trim().is_empty()) {
                    return name.to_string();
                }
                match self.groups.get(self.source.as_ref(), group_id).await {
                    Ok(info) => info.group_name,
                    Err(e) => {
                        warn!(group_id, error = %e, "group metadata unavailable");
                        group_id.to_string()
                    }
                }
            }
        }
    }

    /// Telegram → QQ. `Ok(None)` when the thread is not one of ours or the
    /// message had nothing to relay.
    pub async fn relay_reverse(
        &self,
        msg: &ThreadMessage,
    ) -> Result<Option<MessageCorrelation>, RelayError> {
        let Some(conversation) = self.store.conversation_for(msg.thread)? else {
            debug!(thread = %msg.thread, "message in unmapped thread");
            return Ok(None);
        };

        let reply_to = match msg.reply_to {
            Some(target) if target.0 != msg.thread.0 => self
                .store
                .find_by_destination(msg.thread, target)?
                .map(|corr| corr.source_key),
            _ => None,
        };

        let receiver = self
            .pool
            .get(msg.credential)
            .unwrap_or_else(|| self.pool.master());
        let outbound = convert_reverse(receiver.as_ref(), &msg.segments).await;
        if outbound.is_empty() {
            debug!(thread = %msg.thread, "nothing to relay");
            return Ok(None);
        }

        let key = self.source.send(conversation, &outbound, reply_to).await?;
        let corr = MessageCorrelation {
            conversation,
            source_key: key,
            credential: msg.credential,
            thread: msg.thread,
            dest_message: msg.message,
        };
        self.store.insert_message(&corr)?;
        info!(
            conversation = %conversation,
            key = %key,
            thread = %msg.thread,
            "relayed to qq"
        );
        Ok(Some(corr))
    }

    /// Pre-create the topic for a QQ friend.
    pub async fn init_friend(&self, user_id: i64) -> Result<ThreadId, RelayError> {
        let conversation = ConversationId::private(user_id).ok_or(RelayError::InvalidId {
            what: "user id",
            id: user_id,
        })?;
        let friends = self.source.friends().await?;
        let name = friends
            .iter()
            .find(|f| f.user_id == user_id)
            .map(|f| f.display_name().to_string())
            .ok_or(RelayError::InvalidId {
                what: "friend",
                id: user_id,
            })?;
        self.registry.resolve_or_create(conversation, &name).await
    }

    /// Pre-create the topic for a QQ group.
    pub async fn init_group(&self, group_id: i64) -> Result<ThreadId, RelayError> {
        let conversation = ConversationId::group(group_id).ok_or(RelayError::InvalidId {
            what: "group id",
            id: group_id,
        })?;
        let info = self.groups.get(self.source.as_ref(), group_id).await?;
        self.registry
            .resolve_or_create(conversation, &info.group_name)
            .await
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("abc", 5), "abc");
        assert_eq!(truncate_chars("群群群", 2), "群群…");
    }

    #[test]
    fn options_follow_config() {
        let cfg = RelayConfig {
            show_identicon: false,
            mention_links: true,
            group_cache_ttl_secs: 3,
        };
        let opts = RelayOptions::from(&cfg);
        assert!(!opts.show_identicon);
        assert_eq!(opts.group_cache_ttl, Duration::from_secs(3));
    }
}
