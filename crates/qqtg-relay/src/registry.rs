use std::sync::Arc;

use qqtg_channels::DestinationChannel;
use qqtg_core::types::{ConversationId, ThreadId};
use qqtg_store::{CorrelationStore, ForumTopicMapping};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::error::RelayError;

/// Telegram rejects topic names longer than this.
const MAX_TOPIC_NAME_CHARS: usize = 128;

/// Get-or-create mapping from QQ conversation to forum topic.
///
/// One async mutex covers the lookup and the creation call, so concurrent
/// first messages from the same conversation create exactly one topic.
pub struct TopicRegistry {
    lock: Mutex<()>,
    store: Arc<CorrelationStore>,
    master: Arc<dyn DestinationChannel>,
}

impl TopicRegistry {
    pub fn new(store: Arc<CorrelationStore>, master: Arc<dyn DestinationChannel>) -> Self {
        Self {
            lock: Mutex::new(()),
            store,
            master,
        }
    }

    /// Existing topic for `conversation`, without creating one.
    pub fn lookup(&self, conversation: ConversationId) -> Result<Option<ThreadId>, RelayError> {
        Ok(self.store.topic_for(conversation)?)
    }

    /// Return the topic for `conversation`, creating it (named `display_name`)
    /// through the master bot on first contact. On creation failure nothing
    /// is persisted.
    #[instrument(skip(self, display_name), fields(conversation = %conversation))]
    pub async fn resolve_or_create(
        &self,
        conversation: ConversationId,
        display_name: &str,
    ) -> Result<ThreadId, RelayError> {
        let _guard = self.lock.lock().await;

        if let Some(thread) = self.store.topic_for(conversation)? {
            return Ok(thread);
        }

        let name = topic_name(display_name, conversation);
        info!(name = %name, "creating forum topic");
        let thread = self.master.create_thread(&name).await?;
        self.store.insert_topic(&ForumTopicMapping {
            conversation,
            thread,
        })?;
        info!(thread = %thread, "forum topic created");
        Ok(thread)
    }
}

fn topic_name(display_name: &str, conversation: ConversationId) -> String {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return conversation.to_string();
    }
    trimmed.chars().take(MAX_TOPIC_NAME_CHARS).collect()
}
