use rusqlite::{Connection, Result};

/// Initialise the relay tables. Safe to call on every startup (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_forum_topic_table(conn)?;
    create_message_table(conn)?;
    Ok(())
}

/// One row per QQ conversation that has a Telegram topic.
/// Both sides are unique: a topic never serves two conversations.
fn create_forum_topic_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS forum_topic (
            qq_unique_id      INTEGER NOT NULL,
            tg_forum_topic_id INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_forum_topic_qq
            ON forum_topic(qq_unique_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_forum_topic_tg
            ON forum_topic(tg_forum_topic_id);",
    )
}

/// One row per Telegram message produced by (or relayed from) a QQ message.
/// A media batch yields several rows sharing the same QQ key; rowid order
/// keeps the first message of the batch first.
fn create_message_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS message (
            qq_unique_id      INTEGER NOT NULL,
            qq_msg_id         INTEGER NOT NULL,
            tg_bot_id         INTEGER NOT NULL,
            tg_forum_topic_id INTEGER NOT NULL,
            tg_msg_id         INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_message_qq
            ON message(qq_unique_id, qq_msg_id, tg_msg_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_message_tg
            ON message(tg_forum_topic_id, tg_msg_id);",
    )
}
