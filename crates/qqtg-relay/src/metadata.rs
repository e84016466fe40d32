use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use qqtg_channels::{ChannelError, GroupInfo, SourceChannel};
use tracing::debug;

/// Short-lived cache of QQ group metadata.
///
/// The mutex guards only map reads and writes; it is never held across the
/// network call, so two concurrent misses may both fetch.
pub struct GroupDirectory {
    ttl: Duration,
    entries: Mutex<HashMap<i64, (Instant, GroupInfo)>>,
}

impl GroupDirectory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Group info, from cache when fresh.
    pub async fn get(
        &self,
        source: &dyn SourceChannel,
        group_id: i64,
    ) -> Result<GroupInfo, ChannelError> {
        if let Some(info) = self.cached(group_id) {
            return Ok(info);
        }
        debug!(group_id, "group metadata miss");
        let info = source.group_info(group_id).await?;
        self.insert(info.clone());
        Ok(info)
    }

    /// Record metadata learned elsewhere (e.g. `/list_group`).
    pub fn insert(&self, info: GroupInfo) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(info.group_id, (Instant::now(), info));
    }

    fn cached(&self, group_id: i64) -> Option<GroupInfo> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&group_id) {
            Some((at, info)) if at.elapsed() < self.ttl => Some(info.clone()),
            Some(_) => {
                entries.remove(&group_id);
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qqtg_channels::{FriendInfo, MediaKind, MediaRef, SourceOutbound};
    use qqtg_core::types::{ConversationId, SourceMessageKey};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceChannel for Counting {
        async fn fetch_file(&self, _: MediaKind, _: &MediaRef) -> Result<Vec<u8>, ChannelError> {
            Err(ChannelError::Unsupported("no files".into()))
        }
        async fn send(
            &self,
            _: ConversationId,
            _: &SourceOutbound,
            _: Option<SourceMessageKey>,
        ) -> Result<SourceMessageKey, ChannelError> {
            Ok(SourceMessageKey(1))
        }
        async fn group_info(&self, group_id: i64) -> Result<GroupInfo, ChannelError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GroupInfo {
                group_id,
                group_name: format!("group {group_id} v{n}"),
                member_count: None,
            })
        }
        async fn friends(&self) -> Result<Vec<FriendInfo>, ChannelError> {
            Ok(Vec::new())
        }
        async fn groups(&self) -> Result<Vec<GroupInfo>, ChannelError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn fresh_entries_are_reused() {
        let source = Counting::default();
        let dir = GroupDirectory::new(Duration::from_secs(60));
        let a = dir.get(&source, 555).await.unwrap();
        let b = dir.get(&source, 555).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_refetch() {
        let source = Counting::default();
        let dir = GroupDirectory::new(Duration::ZERO);
        dir.get(&source, 555).await.unwrap();
        let again = dir.get(&source, 555).await.unwrap();
        assert_eq!(again.group_name, "group 555 v1");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
