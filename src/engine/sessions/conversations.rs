use super::SessionStore;
use crate::atoms::error::EngineResult;
use crate::atoms::types::{Conversation, ConversationMeta};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::params;

/// SQLite datetime('now') text format.
const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

fn parse_sqlite_datetime(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, SQLITE_DATETIME)
        .ok()
        .map(|n| n.and_utc())
}

impl SessionStore {
    // ── Conversation CRUD ──────────────────────────────────────────────

    pub fn create_conversation(&self, id: &str, user_id: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO conversations (id, user_id) VALUES (?1, ?2)",
            params![id, user_id],
        )?;
        Ok(())
    }

    pub fn get_conversation(&self, id: &str) -> EngineResult<Option<Conversation>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, created_at, updated_at, message_count
             FROM conversations WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(Conversation {
                id: row.get(0)?,
                user_id: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
                message_count: row.get(4)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    pub fn delete_conversation(&self, id: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Compaction state ───────────────────────────────────────────────

    /// One consistent snapshot of the compaction trigger signals.
    /// `last_compaction_at` defaults to the conversation creation time, so a
    /// fresh conversation never looks stale.
    pub fn get_conversation_meta(&self, id: &str) -> EngineResult<Option<ConversationMeta>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT messages_since_compaction, last_compaction_at
             FROM conversations WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        match rows.next().transpose()? {
            Some((count, last)) => Ok(Some(ConversationMeta {
                messages_since_compaction: count,
                // Unparseable timestamp reads as "just compacted" rather
                // than triggering a storm of runs.
                last_compaction_at: parse_sqlite_datetime(&last).unwrap_or_else(Utc::now),
            })),
            None => Ok(None),
        }
    }

    /// Record a completed compaction run. Called unconditionally after a
    /// run, even when zero facts were extracted, so the trigger cannot
    /// re-fire on the next turn.
    pub fn mark_compacted(&self, id: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE conversations SET
                last_compaction_at = datetime('now'),
                messages_since_compaction = 0
             WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_defaults_to_creation_time() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create_conversation("c1", "u1").unwrap();
        let meta = store.get_conversation_meta("c1").unwrap().unwrap();
        assert_eq!(meta.messages_since_compaction, 0);
        let age = Utc::now() - meta.last_compaction_at;
        assert!(age.num_minutes() < 5);
    }

    #[test]
    fn test_mark_compacted_resets_counter() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create_conversation("c1", "u1").unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "UPDATE conversations SET messages_since_compaction = 12 WHERE id = 'c1'",
                [],
            )
            .unwrap();
        }
        store.mark_compacted("c1").unwrap();
        let meta = store.get_conversation_meta("c1").unwrap().unwrap();
        assert_eq!(meta.messages_since_compaction, 0);
    }

    #[test]
    fn test_parse_sqlite_datetime() {
        assert!(parse_sqlite_datetime("2026-08-06 12:30:00").is_some());
        assert!(parse_sqlite_datetime("garbage").is_none());
    }
}
