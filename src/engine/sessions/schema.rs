// Database schema and migrations for the Souschef engine store.
// Called once at startup by SessionStore::open().
// Adding a new table or column: append an idempotent CREATE TABLE IF NOT
// EXISTS or ALTER TABLE … ADD COLUMN (errors silently swallowed) at the end
// of run_migrations() — never modify existing SQL.

use crate::atoms::error::EngineResult;
use rusqlite::Connection;

pub(crate) fn run_migrations(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            message_count INTEGER NOT NULL DEFAULT 0,
            messages_since_compaction INTEGER NOT NULL DEFAULT 0,
            last_compaction_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_user
            ON conversations(user_id, updated_at);

        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            tool_calls_json TEXT,
            tool_call_id TEXT,
            name TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages(conversation_id, created_at);

        CREATE TABLE IF NOT EXISTS facts (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            fact TEXT NOT NULL,
            category TEXT NOT NULL,
            confidence TEXT NOT NULL DEFAULT 'high',
            extracted_at TEXT NOT NULL DEFAULT (datetime('now')),
            source_conversation_id TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_facts_user
            ON facts(user_id, category);

        CREATE TABLE IF NOT EXISTS engine_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;

    // Assistant replies may carry a structured recipe payload.
    conn.execute("ALTER TABLE messages ADD COLUMN recipe_json TEXT", [])
        .ok();

    Ok(())
}
