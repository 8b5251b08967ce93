use super::SessionStore;
use crate::atoms::error::EngineResult;
use crate::atoms::types::{Message, Role, StoredMessage, ToolCall};
use rusqlite::params;

impl SessionStore {
    // ── Message CRUD ───────────────────────────────────────────────────

    pub fn add_message(&self, msg: &StoredMessage) -> EngineResult<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO messages (id, conversation_id, role, content, tool_calls_json,
                                   tool_call_id, name, recipe_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                msg.id,
                msg.conversation_id,
                msg.role,
                msg.content,
                msg.tool_calls_json,
                msg.tool_call_id,
                msg.name,
                msg.recipe_json,
            ],
        )?;

        // Update conversation stats + the compaction trigger counter.
        conn.execute(
            "UPDATE conversations SET
                message_count = message_count + 1,
                messages_since_compaction = messages_since_compaction + 1,
                updated_at = datetime('now')
             WHERE id = ?1",
            params![msg.conversation_id],
        )?;

        Ok(())
    }

    /// The most recent `limit` messages, returned in chronological order.
    /// Ordered by rowid — created_at has only second resolution and a turn
    /// can persist several messages within one second.
    pub fn get_recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> EngineResult<Vec<StoredMessage>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, role, content, tool_calls_json, tool_call_id,
                    name, recipe_json, created_at
             FROM messages WHERE conversation_id = ?1
             ORDER BY rowid DESC LIMIT ?2",
        )?;

        let mut messages: Vec<StoredMessage> = stmt
            .query_map(params![conversation_id, limit], |row| {
                Ok(StoredMessage {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role: row.get(2)?,
                    content: row.get(3)?,
                    tool_calls_json: row.get(4)?,
                    tool_call_id: row.get(5)?,
                    name: row.get(6)?,
                    recipe_json: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        messages.reverse();
        Ok(messages)
    }

    /// Convert stored messages to engine Message types for the provider,
    /// with the system prompt (when given) at position zero.
    pub fn load_conversation(
        &self,
        conversation_id: &str,
        system_prompt: Option<&str>,
        limit: i64,
    ) -> EngineResult<Vec<Message>> {
        let stored = self.get_recent_messages(conversation_id, limit)?;
        let mut messages = Vec::with_capacity(stored.len() + 1);

        if let Some(prompt) = system_prompt {
            messages.push(Message::text(Role::System, prompt));
        }

        for sm in &stored {
            let role = match sm.role.as_str() {
                "system" => Role::System,
                "assistant" => Role::Assistant,
                "tool" => Role::Tool,
                _ => Role::User,
            };

            let tool_calls: Option<Vec<ToolCall>> = sm
                .tool_calls_json
                .as_ref()
                .and_then(|json| serde_json::from_str(json).ok());

            messages.push(Message {
                role,
                content: sm.content.clone(),
                tool_calls,
                tool_call_id: sm.tool_call_id.clone(),
                name: sm.name.clone(),
            });
        }

        Ok(messages)
    }

    // ── Turn persistence helpers ───────────────────────────────────────

    pub fn persist_user_message(&self, conversation_id: &str, text: &str) -> EngineResult<String> {
        let id = format!("msg-{}", uuid::Uuid::new_v4());
        self.add_message(&StoredMessage {
            id: id.clone(),
            conversation_id: conversation_id.to_string(),
            role: "user".into(),
            content: text.to_string(),
            tool_calls_json: None,
            tool_call_id: None,
            name: None,
            recipe_json: None,
            created_at: String::new(),
        })?;
        Ok(id)
    }

    pub fn persist_assistant_reply(
        &self,
        conversation_id: &str,
        text: &str,
        recipe_json: Option<&str>,
    ) -> EngineResult<String> {
        let id = format!("msg-{}", uuid::Uuid::new_v4());
        self.add_message(&StoredMessage {
            id: id.clone(),
            conversation_id: conversation_id.to_string(),
            role: "assistant".into(),
            content: text.to_string(),
            tool_calls_json: None,
            tool_call_id: None,
            name: None,
            recipe_json: recipe_json.map(|s| s.to_string()),
            created_at: String::new(),
        })?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_roundtrip_and_counters() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create_conversation("c1", "u1").unwrap();

        store.persist_user_message("c1", "hello").unwrap();
        store
            .persist_assistant_reply("c1", "hi there", None)
            .unwrap();

        let msgs = store.get_recent_messages("c1", 10).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, "user");
        assert_eq!(msgs[1].role, "assistant");

        let meta = store.get_conversation_meta("c1").unwrap().unwrap();
        assert_eq!(meta.messages_since_compaction, 2);
        let convo = store.get_conversation("c1").unwrap().unwrap();
        assert_eq!(convo.message_count, 2);
    }

    #[test]
    fn test_recent_limit_keeps_newest() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create_conversation("c1", "u1").unwrap();
        for i in 0..6 {
            store
                .persist_user_message("c1", &format!("m{}", i))
                .unwrap();
        }
        let msgs = store.get_recent_messages("c1", 3).unwrap();
        let contents: Vec<&str> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4", "m5"]);
    }

    #[test]
    fn test_load_conversation_prepends_system() {
        let store = SessionStore::open_in_memory().unwrap();
        store.create_conversation("c1", "u1").unwrap();
        store.persist_user_message("c1", "what's for dinner?").unwrap();

        let msgs = store
            .load_conversation("c1", Some("You are a cooking assistant."), 50)
            .unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].role, Role::System);
        assert_eq!(msgs[1].role, Role::User);
    }
}
