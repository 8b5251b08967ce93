use super::SessionStore;
use crate::atoms::error::EngineResult;
use crate::atoms::types::{Confidence, MemoryCategory, MemoryFact};
use rusqlite::params;

impl MemoryFact {
    /// Map a row with columns (id, user_id, fact, category, confidence,
    /// extracted_at, source_conversation_id) → MemoryFact.
    /// Rows with an out-of-taxonomy category are dropped by the caller.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<Self>> {
        let category: String = row.get(3)?;
        let Some(category) = MemoryCategory::parse(&category) else {
            return Ok(None);
        };
        let confidence: String = row.get(4)?;
        Ok(Some(MemoryFact {
            id: row.get(0)?,
            user_id: row.get(1)?,
            fact: row.get(2)?,
            category,
            confidence: match confidence.as_str() {
                "medium" => Confidence::Medium,
                "low" => Confidence::Low,
                _ => Confidence::High,
            },
            extracted_at: row.get(5)?,
            source_conversation_id: row.get(6)?,
        }))
    }
}

const FACT_COLUMNS: &str =
    "id, user_id, fact, category, confidence, extracted_at, source_conversation_id";

impl SessionStore {
    // ── Fact CRUD ──────────────────────────────────────────────────────

    pub fn insert_fact(&self, fact: &MemoryFact) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO facts (id, user_id, fact, category, confidence, source_conversation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                fact.id,
                fact.user_id,
                fact.fact,
                fact.category.as_str(),
                match fact.confidence {
                    Confidence::High => "high",
                    Confidence::Medium => "medium",
                    Confidence::Low => "low",
                },
                fact.source_conversation_id,
            ],
        )?;
        Ok(())
    }

    /// All facts for a user in insertion order, optionally filtered by
    /// category. The per-user set is bounded — no pagination.
    pub fn list_facts(
        &self,
        user_id: &str,
        category: Option<MemoryCategory>,
    ) -> EngineResult<Vec<MemoryFact>> {
        let conn = self.conn.lock();
        match category {
            Some(cat) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM facts WHERE user_id = ?1 AND category = ?2 ORDER BY rowid",
                    FACT_COLUMNS
                ))?;
                let facts = stmt
                    .query_map(params![user_id, cat.as_str()], MemoryFact::from_row)?
                    .filter_map(|r| r.ok().flatten())
                    .collect();
                Ok(facts)
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM facts WHERE user_id = ?1 ORDER BY rowid",
                    FACT_COLUMNS
                ))?;
                let facts = stmt
                    .query_map(params![user_id], MemoryFact::from_row)?
                    .filter_map(|r| r.ok().flatten())
                    .collect();
                Ok(facts)
            }
        }
    }

    /// Just the fact strings, for the extraction prompt's known-facts block.
    pub fn fact_strings(&self, user_id: &str) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT fact FROM facts WHERE user_id = ?1 ORDER BY rowid")?;
        let facts = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(facts)
    }

    /// Case-insensitive substring/equality duplicate check across ALL of the
    /// user's facts, any category. Either containment direction counts — the
    /// simple rule is a deliberate design choice, over- and under-merge
    /// included.
    pub fn find_duplicate_fact(
        &self,
        user_id: &str,
        candidate: &str,
    ) -> EngineResult<Option<MemoryFact>> {
        let needle = candidate.to_lowercase();
        let all = self.list_facts(user_id, None)?;
        Ok(all.into_iter().find(|f| {
            let existing = f.fact.to_lowercase();
            existing.contains(&needle) || needle.contains(&existing)
        }))
    }

    /// First fact (insertion order) whose text contains the search term,
    /// case-insensitive. Used by remove/update-by-search.
    pub fn find_fact_by_search(
        &self,
        user_id: &str,
        term: &str,
    ) -> EngineResult<Option<MemoryFact>> {
        let conn = self.conn.lock();
        let pattern = format!("%{}%", term.to_lowercase());
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM facts
             WHERE user_id = ?1 AND LOWER(fact) LIKE ?2
             ORDER BY rowid LIMIT 1",
            FACT_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![user_id, pattern], MemoryFact::from_row)?;
        Ok(rows.next().transpose()?.flatten())
    }

    pub fn delete_fact(&self, id: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM facts WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Destructive in-place update — no versioning.
    pub fn update_fact(
        &self,
        id: &str,
        new_fact: &str,
        new_category: MemoryCategory,
    ) -> EngineResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE facts SET fact = ?2, category = ?3 WHERE id = ?1",
            params![id, new_fact, new_category.as_str()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(id: &str, user: &str, text: &str, category: MemoryCategory) -> MemoryFact {
        MemoryFact {
            id: id.into(),
            user_id: user.into(),
            fact: text.into(),
            category,
            confidence: Confidence::High,
            extracted_at: String::new(),
            source_conversation_id: None,
        }
    }

    #[test]
    fn test_list_scoped_to_user_and_category() {
        let store = SessionStore::open_in_memory().unwrap();
        store
            .insert_fact(&fact("f1", "u1", "User has an air fryer", MemoryCategory::Equipment))
            .unwrap();
        store
            .insert_fact(&fact("f2", "u1", "User is vegan", MemoryCategory::Restriction))
            .unwrap();
        store
            .insert_fact(&fact("f3", "u2", "User has a wok", MemoryCategory::Equipment))
            .unwrap();

        assert_eq!(store.list_facts("u1", None).unwrap().len(), 2);
        let equipment = store
            .list_facts("u1", Some(MemoryCategory::Equipment))
            .unwrap();
        assert_eq!(equipment.len(), 1);
        assert_eq!(equipment[0].fact, "User has an air fryer");
    }

    #[test]
    fn test_duplicate_check_both_directions() {
        let store = SessionStore::open_in_memory().unwrap();
        store
            .insert_fact(&fact("f1", "u1", "User is allergic to peanuts", MemoryCategory::Allergy))
            .unwrap();

        // Exact (case-insensitive)
        assert!(store
            .find_duplicate_fact("u1", "user IS ALLERGIC to peanuts")
            .unwrap()
            .is_some());
        // Candidate contained in existing
        assert!(store
            .find_duplicate_fact("u1", "allergic to peanuts")
            .unwrap()
            .is_some());
        // Existing contained in candidate
        assert!(store
            .find_duplicate_fact("u1", "User is allergic to peanuts and walnuts")
            .unwrap()
            .is_some());
        // Unrelated
        assert!(store
            .find_duplicate_fact("u1", "User is vegan")
            .unwrap()
            .is_none());
        // Other user unaffected
        assert!(store
            .find_duplicate_fact("u2", "User is allergic to peanuts")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_search_finds_first_match() {
        let store = SessionStore::open_in_memory().unwrap();
        store
            .insert_fact(&fact("f1", "u1", "User dislikes cilantro", MemoryCategory::Preference))
            .unwrap();
        store
            .insert_fact(&fact("f2", "u1", "User grows cilantro at home", MemoryCategory::Preference))
            .unwrap();

        let found = store.find_fact_by_search("u1", "CILANTRO").unwrap().unwrap();
        assert_eq!(found.id, "f1");
        assert!(store.find_fact_by_search("u1", "durian").unwrap().is_none());
    }

    #[test]
    fn test_unknown_category_rows_are_dropped() {
        let store = SessionStore::open_in_memory().unwrap();
        {
            let conn = store.conn.lock();
            conn.execute(
                "INSERT INTO facts (id, user_id, fact, category) VALUES ('x', 'u1', 'User x', 'mood')",
                [],
            )
            .unwrap();
        }
        assert!(store.list_facts("u1", None).unwrap().is_empty());
    }
}
