#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use qqtg_channels::{
    ChannelError, DestinationChannel, FriendInfo, GroupInfo, MediaKind, MediaRef, NeutralMessage,
    Segment, SourceChannel, SourceMessage, SourceOutbound,
};
use qqtg_core::types::{ConversationId, CredentialId, DestMessageId, SourceMessageKey, ThreadId};

/// Fake QQ side.
#[derive(Default)]
pub struct FakeQq {
    /// File tokens whose download fails.
    pub broken_files: Mutex<HashSet<String>>,
    pub sent: Mutex<Vec<(ConversationId, SourceOutbound, Option<SourceMessageKey>)>>,
    pub next_key: AtomicI64,
    pub group_info_calls: AtomicUsize,
}

impl FakeQq {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_key: AtomicI64::new(7000),
            ..Default::default()
        })
    }

    pub fn break_file(&self, file: &str) {
        self.broken_files.lock().unwrap().insert(file.to_string());
    }
}

#[async_trait]
impl SourceChannel for FakeQq {
    async fn fetch_file(&self, kind: MediaKind, media: &MediaRef) -> Result<Vec<u8>, ChannelError> {
        if self.broken_files.lock().unwrap().contains(&media.file) {
            return Err(ChannelError::Download(format!("{} unreachable", media.file)));
        }
        let mut data = match kind {
            MediaKind::Photo if media.file.ends_with(".gif") => b"GIF89a".to_vec(),
            _ => b"\xff\xd8\xff".to_vec(),
        };
        data.extend_from_slice(media.file.as_bytes());
        Ok(data)
    }

    async fn send(
        &self,
        conversation: ConversationId,
        message: &SourceOutbound,
        reply_to: Option<SourceMessageKey>,
    ) -> Result<SourceMessageKey, ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((conversation, message.clone(), reply_to));
        Ok(SourceMessageKey(self.next_key.fetch_add(1, Ordering::SeqCst)))
    }

    async fn group_info(&self, group_id: i64) -> Result<GroupInfo, ChannelError> {
        self.group_info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GroupInfo {
            group_id,
            group_name: format!("Group {group_id}"),
            member_count: Some(3),
        })
    }

    async fn friends(&self) -> Result<Vec<FriendInfo>, ChannelError> {
        Ok(vec![FriendInfo {
            user_id: 42,
            nickname: "alice".to_string(),
            remark: Some("Alice (work)".to_string()),
        }])
    }

    async fn groups(&self) -> Result<Vec<GroupInfo>, ChannelError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub struct Sent {
    pub thread: ThreadId,
    pub message: NeutralMessage,
    pub reply_to: Option<DestMessageId>,
    pub ids: Vec<DestMessageId>,
}

/// Fake Telegram bot. Message ids are `id * 1000 + n`.
pub struct FakeBot {
    pub id: i64,
    pub sent: Mutex<Vec<Sent>>,
    pub created: Mutex<Vec<String>>,
    pub admin: Mutex<Vec<String>>,
    pub files: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail_create: AtomicBool,
    /// When set, a send delivers only this many messages and then fails.
    pub deliver_only: Mutex<Option<usize>>,
    pub create_delay: Duration,
    next_msg: AtomicI64,
    next_thread: AtomicI64,
}

impl FakeBot {
    pub fn new(id: i64) -> Arc<Self> {
        Self::with_delay(id, Duration::ZERO)
    }

    pub fn with_delay(id: i64, create_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id,
            sent: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            admin: Mutex::new(Vec::new()),
            files: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
            deliver_only: Mutex::new(None),
            create_delay,
            next_msg: AtomicI64::new(1),
            next_thread: AtomicI64::new(100),
        })
    }

    pub fn add_file(&self, file_id: &str, data: Vec<u8>) {
        self.files.lock().unwrap().push((file_id.to_string(), data));
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DestinationChannel for FakeBot {
    fn credential(&self) -> CredentialId {
        CredentialId(self.id)
    }

    async fn create_thread(&self, name: &str) -> Result<ThreadId, ChannelError> {
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ChannelError::Request("not enough rights to create a topic".into()));
        }
        self.created.lock().unwrap().push(name.to_string());
        Ok(ThreadId(self.next_thread.fetch_add(1, Ordering::SeqCst)))
    }

    async fn send(
        &self,
        thread: ThreadId,
        message: &NeutralMessage,
        reply_to: Option<DestMessageId>,
    ) -> Result<Vec<DestMessageId>, ChannelError> {
        let wanted = message.media.len().max(1);
        let limit = *self.deliver_only.lock().unwrap();
        let count = limit.map_or(wanted, |n| n.min(wanted));
        let ids: Vec<DestMessageId> = (0..count)
            .map(|_| DestMessageId(self.id * 1000 + self.next_msg.fetch_add(1, Ordering::SeqCst)))
            .collect();
        self.sent.lock().unwrap().push(Sent {
            thread,
            message: message.clone(),
            reply_to,
            ids: ids.clone(),
        });
        if count < wanted {
            let source = ChannelError::Request("Too Many Requests: retry after 5".into());
            if ids.is_empty() {
                return Err(source);
            }
            return Err(ChannelError::Partial {
                sent: ids,
                source: Box::new(source),
            });
        }
        Ok(ids)
    }

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>, ChannelError> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == file_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| ChannelError::Download(format!("no such file {file_id}")))
    }

    async fn file_url(&self, file_id: &str) -> Result<String, ChannelError> {
        Ok(format!("https://files.example/{file_id}"))
    }

    async fn notify_admin(&self, html: &str) -> Result<(), ChannelError> {
        self.admin.lock().unwrap().push(html.to_string());
        Ok(())
    }
}

pub fn as_dest(bots: &[Arc<FakeBot>]) -> Vec<Arc<dyn DestinationChannel>> {
    bots.iter()
        .map(|b| Arc::clone(b) as Arc<dyn DestinationChannel>)
        .collect()
}

pub fn group_message(group: i64, key: i64, sender: &str, segments: Vec<Segment>) -> SourceMessage {
    SourceMessage {
        conversation: ConversationId::group(group).unwrap(),
        key: SourceMessageKey(key),
        sender_id: 10001,
        sender_name: sender.to_string(),
        chat_name: None,
        reply_to: None,
        segments,
        raw: format!(r#"{{"message_type":"group","group_id":{group},"message_id":{key}}}"#),
    }
}

pub fn private_message(user: i64, key: i64, segments: Vec<Segment>) -> SourceMessage {
    SourceMessage {
        conversation: ConversationId::private(user).unwrap(),
        key: SourceMessageKey(key),
        sender_id: user,
        sender_name: format!("user{user}"),
        chat_name: None,
        reply_to: None,
        segments,
        raw: format!(r#"{{"message_type":"private","user_id":{user},"message_id":{key}}}"#),
    }
}
