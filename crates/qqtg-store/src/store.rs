use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode};
use tracing::{debug, instrument};

use qqtg_core::types::{ConversationId, CredentialId, DestMessageId, SourceMessageKey, ThreadId};

use crate::error::{Result, StoreError};
use crate::types::{ForumTopicMapping, MessageCorrelation};

/// Append-only store for topic mappings and message correlations.
///
/// Wraps one SQLite connection in a `Mutex`; every operation is a single
/// statement, so the lock is never held across an `.await`.
pub struct CorrelationStore {
    db: Mutex<Connection>,
}

/// Raw `message` row before the conversation id is validated.
type RawCorrelation = (i64, i64, i64, i64, i64);

const SELECT_MESSAGE: &str = "SELECT qq_unique_id, qq_msg_id, tg_bot_id, tg_forum_topic_id, tg_msg_id
     FROM message";

impl CorrelationStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    /// Open an in-memory store with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::db::init_db(&conn)?;
        Ok(Self::new(conn))
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Topic assigned to `conversation`, if one was ever created.
    #[instrument(skip(self), fields(conversation = %conversation))]
    pub fn topic_for(&self, conversation: ConversationId) -> Result<Option<ThreadId>> {
        let db = self.conn();
        match db.query_row(
            "SELECT tg_forum_topic_id FROM forum_topic WHERE qq_unique_id = ?1",
            rusqlite::params![conversation.as_i64()],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(id) => Ok(Some(ThreadId(id))),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// Conversation mirrored by `thread`, if the topic was created by us.
    #[instrument(skip(self), fields(thread = %thread))]
    pub fn conversation_for(&self, thread: ThreadId) -> Result<Option<ConversationId>> {
        let db = self.conn();
        let raw = match db.query_row(
            "SELECT qq_unique_id FROM forum_topic WHERE tg_forum_topic_id = ?1",
            rusqlite::params![thread.0],
            |row| row.get::<_, i64>(0),
        ) {
            Ok(raw) => raw,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(StoreError::Database(e)),
        };
        ConversationId::from_raw(raw)
            .map(Some)
            .ok_or_else(|| StoreError::Corrupt {
                table: "forum_topic",
                detail: format!("zero qq_unique_id for topic {thread}"),
            })
    }

    /// Record a freshly created topic.
    pub fn insert_topic(&self, mapping: &ForumTopicMapping) -> Result<()> {
        let db = self.conn();
        db.execute(
            "INSERT INTO forum_topic (qq_unique_id, tg_forum_topic_id) VALUES (?1, ?2)",
            rusqlite::params![mapping.conversation.as_i64(), mapping.thread.0],
        )
        .map_err(|e| {
            duplicate_or_database(
                "forum_topic",
                format!("{} -> {}", mapping.conversation, mapping.thread),
                e,
            )
        })?;
        debug!(conversation = %mapping.conversation, thread = %mapping.thread, "topic mapping stored");
        Ok(())
    }

    /// Record one relayed message.
    pub fn insert_message(&self, corr: &MessageCorrelation) -> Result<()> {
        let db = self.conn();
        db.execute(
            "INSERT INTO message (qq_unique_id, qq_msg_id, tg_bot_id, tg_forum_topic_id, tg_msg_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                corr.conversation.as_i64(),
                corr.source_key.0,
                corr.credential.0,
                corr.thread.0,
                corr.dest_message.0,
            ],
        )
        .map_err(|e| {
            duplicate_or_database(
                "message",
                format!(
                    "{}#{} -> {}#{}",
                    corr.conversation, corr.source_key, corr.thread, corr.dest_message
                ),
                e,
            )
        })?;
        Ok(())
    }

    /// Look up by the QQ side. When a batch produced several Telegram
    /// messages, the first one inserted is returned.
    #[instrument(skip(self), fields(conversation = %conversation, key = %key))]
    pub fn find_by_source(
        &self,
        conversation: ConversationId,
        key: SourceMessageKey,
    ) -> Result<Option<MessageCorrelation>> {
        let db = self.conn();
        let row = db.query_row(
            &format!(
                "{SELECT_MESSAGE} WHERE qq_unique_id = ?1 AND qq_msg_id = ?2
                 ORDER BY rowid LIMIT 1"
            ),
            rusqlite::params![conversation.as_i64(), key.0],
            raw_correlation,
        );
        finish_lookup(row)
    }

    /// Look up by the Telegram side.
    #[instrument(skip(self), fields(thread = %thread, message = %message))]
    pub fn find_by_destination(
        &self,
        thread: ThreadId,
        message: DestMessageId,
    ) -> Result<Option<MessageCorrelation>> {
        let db = self.conn();
        let row = db.query_row(
            &format!("{SELECT_MESSAGE} WHERE tg_forum_topic_id = ?1 AND tg_msg_id = ?2"),
            rusqlite::params![thread.0, message.0],
            raw_correlation,
        );
        finish_lookup(row)
    }

    /// Row counts `(topics, messages)`, reported by the health endpoint.
    pub fn stats(&self) -> Result<(u64, u64)> {
        let db = self.conn();
        let topics: i64 = db.query_row("SELECT COUNT(*) FROM forum_topic", [], |r| r.get(0))?;
        let messages: i64 = db.query_row("SELECT COUNT(*) FROM message", [], |r| r.get(0))?;
        Ok((topics as u64, messages as u64))
    }
}

fn raw_correlation(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCorrelation> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn finish_lookup(row: rusqlite::Result<RawCorrelation>) -> Result<Option<MessageCorrelation>> {
    let (conv, key, bot, thread, msg) = match row {
        Ok(raw) => raw,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(StoreError::Database(e)),
    };
    let conversation = ConversationId::from_raw(conv).ok_or_else(|| StoreError::Corrupt {
        table: "message",
        detail: format!("zero qq_unique_id for tg message {thread}#{msg}"),
    })?;
    Ok(Some(MessageCorrelation {
        conversation,
        source_key: SourceMessageKey(key),
        credential: CredentialId(bot),
        thread: ThreadId(thread),
        dest_message: DestMessageId(msg),
    }))
}

fn duplicate_or_database(table: &'static str, detail: String, e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(ref f, _) if f.code == ErrorCode::ConstraintViolation => {
            StoreError::Duplicate { table, detail }
        }
        other => StoreError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: i64) -> ConversationId {
        ConversationId::group(id).unwrap()
    }

    fn corr(conv: ConversationId, key: i64, bot: i64, thread: i64, msg: i64) -> MessageCorrelation {
        MessageCorrelation {
            conversation: conv,
            source_key: SourceMessageKey(key),
            credential: CredentialId(bot),
            thread: ThreadId(thread),
            dest_message: DestMessageId(msg),
        }
    }

    #[test]
    fn topic_lookup_both_directions() {
        let store = CorrelationStore::in_memory().unwrap();
        let conv = group(555);
        assert_eq!(store.topic_for(conv).unwrap(), None);

        store
            .insert_topic(&ForumTopicMapping {
                conversation: conv,
                thread: ThreadId(17),
            })
            .unwrap();

        assert_eq!(store.topic_for(conv).unwrap(), Some(ThreadId(17)));
        assert_eq!(store.conversation_for(ThreadId(17)).unwrap(), Some(conv));
        assert_eq!(store.conversation_for(ThreadId(18)).unwrap(), None);
    }

    #[test]
    fn topic_is_unique_per_conversation_and_thread() {
        let store = CorrelationStore::in_memory().unwrap();
        let a = ForumTopicMapping {
            conversation: group(1),
            thread: ThreadId(10),
        };
        store.insert_topic(&a).unwrap();

        let same_conv = ForumTopicMapping {
            conversation: group(1),
            thread: ThreadId(11),
        };
        assert!(matches!(
            store.insert_topic(&same_conv),
            Err(StoreError::Duplicate { table: "forum_topic", .. })
        ));

        let same_thread = ForumTopicMapping {
            conversation: ConversationId::private(9).unwrap(),
            thread: ThreadId(10),
        };
        assert!(matches!(
            store.insert_topic(&same_thread),
            Err(StoreError::Duplicate { .. })
        ));
    }

    #[test]
    fn correlation_round_trip() {
        let store = CorrelationStore::in_memory().unwrap();
        let record = corr(group(555), 1, 900, 17, 4242);
        store.insert_message(&record).unwrap();

        let by_source = store
            .find_by_source(group(555), SourceMessageKey(1))
            .unwrap();
        let by_dest = store
            .find_by_destination(ThreadId(17), DestMessageId(4242))
            .unwrap();
        assert_eq!(by_source, Some(record));
        assert_eq!(by_dest, Some(record));
    }

    #[test]
    fn lookups_are_scoped() {
        let store = CorrelationStore::in_memory().unwrap();
        store.insert_message(&corr(group(1), 5, 900, 17, 100)).unwrap();

        // Same message key in another conversation is a different message.
        assert_eq!(
            store.find_by_source(group(2), SourceMessageKey(5)).unwrap(),
            None
        );
        assert_eq!(
            store
                .find_by_destination(ThreadId(18), DestMessageId(100))
                .unwrap(),
            None
        );
    }

    #[test]
    fn batch_rows_resolve_to_first_and_each_reverse() {
        let store = CorrelationStore::in_memory().unwrap();
        let conv = ConversationId::private(42).unwrap();
        for msg in [300, 301, 302] {
            store.insert_message(&corr(conv, 9, 900, 17, msg)).unwrap();
        }

        let first = store
            .find_by_source(conv, SourceMessageKey(9))
            .unwrap()
            .unwrap();
        assert_eq!(first.dest_message, DestMessageId(300));

        for msg in [300, 301, 302] {
            let back = store
                .find_by_destination(ThreadId(17), DestMessageId(msg))
                .unwrap()
                .unwrap();
            assert_eq!(back.source_key, SourceMessageKey(9));
        }
    }

    #[test]
    fn duplicate_correlation_rejected() {
        let store = CorrelationStore::in_memory().unwrap();
        let record = corr(group(555), 1, 900, 17, 4242);
        store.insert_message(&record).unwrap();
        assert!(matches!(
            store.insert_message(&record),
            Err(StoreError::Duplicate { table: "message", .. })
        ));
    }

    #[test]
    fn stats_count_rows() {
        let store = CorrelationStore::in_memory().unwrap();
        store
            .insert_topic(&ForumTopicMapping {
                conversation: group(1),
                thread: ThreadId(1),
            })
            .unwrap();
        store.insert_message(&corr(group(1), 1, 1, 1, 2)).unwrap();
        store.insert_message(&corr(group(1), 2, 1, 1, 3)).unwrap();
        assert_eq!(store.stats().unwrap(), (1, 2));
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qqtg.db");
        {
            let conn = Connection::open(&path).unwrap();
            crate::db::init_db(&conn).unwrap();
            let store = CorrelationStore::new(conn);
            store
                .insert_topic(&ForumTopicMapping {
                    conversation: group(77),
                    thread: ThreadId(5),
                })
                .unwrap();
        }
        let conn = Connection::open(&path).unwrap();
        crate::db::init_db(&conn).unwrap();
        let store = CorrelationStore::new(conn);
        assert_eq!(store.topic_for(group(77)).unwrap(), Some(ThreadId(5)));
    }
}
