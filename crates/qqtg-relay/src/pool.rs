use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use qqtg_channels::{ChannelError, DestinationChannel, NeutralMessage};
use qqtg_core::types::{CredentialId, DestMessageId, ThreadId};
use tracing::{debug, warn};

use crate::error::RelayError;

struct Member {
    channel: Arc<dyn DestinationChannel>,
    /// Milliseconds since the epoch of the last send through this credential.
    last_send: AtomicU64,
}

/// Every configured Telegram bot, with least-recently-used selection.
///
/// The first member is the master bot. Stamps are plain atomics: two racing
/// selections may pick the same bot, which only costs balance, not safety.
pub struct CredentialPool {
    members: Vec<Member>,
}

impl CredentialPool {
    pub fn new(channels: Vec<Arc<dyn DestinationChannel>>) -> Result<Self, RelayError> {
        if channels.is_empty() {
            return Err(RelayError::NoCredentials);
        }
        let members = channels
            .into_iter()
            .map(|channel| Member {
                channel,
                last_send: AtomicU64::new(0),
            })
            .collect();
        Ok(Self { members })
    }

    /// The bot that creates topics and receives updates.
    pub fn master(&self) -> &Arc<dyn DestinationChannel> {
        &self.members[0].channel
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: CredentialId) -> Option<&Arc<dyn DestinationChannel>> {
        self.member(id).map(|m| &m.channel)
    }

    fn member(&self, id: CredentialId) -> Option<&Member> {
        self.members.iter().find(|m| m.channel.credential() == id)
    }

    fn least_recent(&self) -> &Member {
        self.members
            .iter()
            .min_by_key(|m| m.last_send.load(Ordering::Relaxed))
            .unwrap_or(&self.members[0])
    }

    /// Pick a credential: `preferred` when it is in the pool (reply
    /// affinity), otherwise the least recently used one.
    pub fn select(&self, preferred: Option<CredentialId>) -> &Arc<dyn DestinationChannel> {
        match preferred.and_then(|id| self.member(id)) {
            Some(m) => &m.channel,
            None => &self.least_recent().channel,
        }
    }

    /// Last send stamp of `id`, if it is in the pool.
    pub fn stamp(&self, id: CredentialId) -> Option<u64> {
        self.member(id).map(|m| m.last_send.load(Ordering::Relaxed))
    }

    /// Send through the selected credential and stamp it. A `reply_to` only
    /// makes sense on the bot that owns it, so it is dropped when `preferred`
    /// names a bot that is no longer configured.
    pub async fn send(
        &self,
        preferred: Option<CredentialId>,
        thread: ThreadId,
        message: &NeutralMessage,
        reply_to: Option<DestMessageId>,
    ) -> Result<(CredentialId, Vec<DestMessageId>), RelayError> {
        let (member, reply_to) = match preferred {
            Some(id) => match self.member(id) {
                Some(m) => (m, reply_to),
                None => {
                    warn!(credential = %id, "reply credential no longer configured, dropping reply link");
                    (self.least_recent(), None)
                }
            },
            None => (self.least_recent(), reply_to),
        };

        let highest = self
            .members
            .iter()
            .map(|m| m.last_send.load(Ordering::Relaxed))
            .max()
            .unwrap_or(0);
        let stamp = now_millis().max(highest + 1);
        member.last_send.store(stamp, Ordering::Relaxed);

        let credential = member.channel.credential();
        debug!(credential = %credential, thread = %thread, stamp, "dispatching");
        match member.channel.send(thread, message, reply_to).await {
            Ok(ids) => Ok((credential, ids)),
            Err(ChannelError::Partial { sent, source }) => Err(RelayError::Partial {
                credential,
                sent,
                source: *source,
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Bot {
        id: i64,
        replies: Mutex<Vec<Option<DestMessageId>>>,
    }

    fn bot(id: i64) -> Arc<Bot> {
        Arc::new(Bot {
            id,
            replies: Mutex::new(Vec::new()),
        })
    }

    #[async_trait]
    impl DestinationChannel for Bot {
        fn credential(&self) -> CredentialId {
            CredentialId(self.id)
        }
        async fn create_thread(&self, _name: &str) -> Result<ThreadId, ChannelError> {
            Ok(ThreadId(1))
        }
        async fn send(
            &self,
            _thread: ThreadId,
            _message: &NeutralMessage,
            reply_to: Option<DestMessageId>,
        ) -> Result<Vec<DestMessageId>, ChannelError> {
            self.replies.lock().unwrap().push(reply_to);
            Ok(vec![DestMessageId(self.id * 100)])
        }
        async fn fetch_file(&self, _file_id: &str) -> Result<Vec<u8>, ChannelError> {
            Ok(Vec::new())
        }
        async fn file_url(&self, file_id: &str) -> Result<String, ChannelError> {
            Ok(file_id.to_string())
        }
        async fn notify_admin(&self, _html: &str) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    fn pool(bots: &[Arc<Bot>]) -> CredentialPool {
        CredentialPool::new(
            bots.iter()
                .map(|b| b.clone() as Arc<dyn DestinationChannel>)
                .collect(),
        )
        .unwrap()
    }

    fn set(pool: &CredentialPool, id: i64, stamp: u64) {
        pool.member(CredentialId(id))
            .unwrap()
            .last_send
            .store(stamp, Ordering::Relaxed);
    }

    #[test]
    fn empty_pool_rejected() {
        assert!(matches!(
            CredentialPool::new(Vec::new()),
            Err(RelayError::NoCredentials)
        ));
    }

    #[test]
    fn selects_smallest_stamp() {
        let p = pool(&[bot(1), bot(2), bot(3)]);
        set(&p, 1, 30);
        set(&p, 2, 10);
        set(&p, 3, 20);
        assert_eq!(p.select(None).credential(), CredentialId(2));
    }

    #[test]
    fn affinity_wins_over_lru() {
        let p = pool(&[bot(1), bot(2)]);
        set(&p, 1, 50);
        set(&p, 2, 10);
        assert_eq!(p.select(Some(CredentialId(1))).credential(), CredentialId(1));
        // Unknown preference falls back to LRU.
        assert_eq!(p.select(Some(CredentialId(9))).credential(), CredentialId(2));
    }

    #[test]
    fn master_is_first() {
        let p = pool(&[bot(7), bot(8)]);
        assert_eq!(p.master().credential(), CredentialId(7));
        assert_eq!(p.len(), 2);
    }

    #[tokio::test]
    async fn send_stamps_above_all_previous() {
        let p = pool(&[bot(1), bot(2), bot(3)]);
        let future = now_millis() + 1_000_000;
        set(&p, 1, future);
        set(&p, 2, 5);
        set(&p, 3, 7);

        let (used, ids) = p
            .send(None, ThreadId(1), &NeutralMessage::default(), None)
            .await
            .unwrap();
        assert_eq!(used, CredentialId(2));
        assert_eq!(ids, vec![DestMessageId(200)]);
        let stamp = p.stamp(CredentialId(2)).unwrap();
        assert!(stamp > future);
        assert_eq!(p.select(None).credential(), CredentialId(3));
    }

    #[tokio::test]
    async fn round_robin_without_affinity() {
        let p = pool(&[bot(1), bot(2), bot(3)]);
        let mut used = Vec::new();
        for _ in 0..6 {
            let (c, _) = p
                .send(None, ThreadId(1), &NeutralMessage::default(), None)
                .await
                .unwrap();
            used.push(c.0);
        }
        assert_eq!(used, vec![1, 2, 3, 1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_preferred_drops_reply_link() {
        let b = bot(1);
        let p = pool(&[b.clone()]);
        let (used, _) = p
            .send(
                Some(CredentialId(99)),
                ThreadId(1),
                &NeutralMessage::default(),
                Some(DestMessageId(5)),
            )
            .await
            .unwrap();
        assert_eq!(used, CredentialId(1));
        assert_eq!(*b.replies.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn preferred_keeps_reply_link() {
        let a = bot(1);
        let b = bot(2);
        let p = pool(&[a.clone(), b.clone()]);
        set(&p, 2, 1_000);
        set(&p, 1, 0);
        p.send(
            Some(CredentialId(2)),
            ThreadId(1),
            &NeutralMessage::default(),
            Some(DestMessageId(5)),
        )
        .await
        .unwrap();
        assert_eq!(*b.replies.lock().unwrap(), vec![Some(DestMessageId(5))]);
        assert!(a.replies.lock().unwrap().is_empty());
    }
}
