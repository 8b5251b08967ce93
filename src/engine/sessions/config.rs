use super::SessionStore;
use crate::atoms::error::EngineResult;
use rusqlite::params;

impl SessionStore {
    // ── Key/value config store ─────────────────────────────────────────

    pub fn get_config(&self, key: &str) -> EngineResult<Option<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT value FROM engine_config WHERE key = ?1")?;
        let mut rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;
        Ok(rows.next().transpose()?)
    }

    pub fn set_config(&self, key: &str, value: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO engine_config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_roundtrip() {
        let store = SessionStore::open_in_memory().unwrap();
        assert!(store.get_config("engine_config").unwrap().is_none());
        store.set_config("engine_config", "{}").unwrap();
        assert_eq!(store.get_config("engine_config").unwrap().as_deref(), Some("{}"));
        store.set_config("engine_config", "{\"a\":1}").unwrap();
        assert_eq!(
            store.get_config("engine_config").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
    }
}
