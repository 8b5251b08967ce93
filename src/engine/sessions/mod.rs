// Souschef Engine — Session Store
// Stores conversations, messages, memory facts, and engine config in SQLite
// via rusqlite, behind a single Mutex-guarded connection.
//
// Module layout:
//   conversations  — conversation CRUD + compaction-state snapshot
//   messages       — message CRUD + context loading
//   facts          — memory fact CRUD + case-insensitive search
//   config         — key/value engine config store
//   schema         — idempotent migrations

use crate::atoms::error::EngineResult;
use log::info;
use parking_lot::Mutex;
use rusqlite::Connection;

mod config;
mod conversations;
mod facts;
mod messages;
mod schema;

/// Thread-safe database wrapper.
pub struct SessionStore {
    /// The SQLite connection, protected by a Mutex.
    /// `pub` for integration tests that need raw access.
    pub conn: Mutex<Connection>,
}

impl SessionStore {
    /// Open (or create) the engine database and initialize tables.
    pub fn open() -> EngineResult<Self> {
        let path = crate::engine::paths::engine_db_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        info!("[engine] Opening session store at {:?}", path);

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        conn.execute_batch("PRAGMA foreign_keys=ON;").ok();

        schema::run_migrations(&conn)?;

        Ok(SessionStore {
            conn: Mutex::new(conn),
        })
    }

    /// Fully in-memory store with the complete schema. Used by tests.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").ok();
        schema::run_migrations(&conn)?;
        Ok(SessionStore {
            conn: Mutex::new(conn),
        })
    }
}
