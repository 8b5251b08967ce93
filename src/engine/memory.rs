// Souschef Engine — Memory Fact Operations
//
// The single write path for the user's dietary profile. Both the interactive
// tool calls and the compaction engine funnel through add_fact, so the same
// sanitization and dedup rules hold regardless of entry point.
//
// Sanitizer rejection and duplicate detection are structured negative
// results, never errors — the tool loop reports them back to the model as
// data so it can explain the refusal conversationally.

use crate::atoms::error::EngineResult;
use crate::atoms::types::{Confidence, MemoryCategory, MemoryFact};
use crate::engine::sanitizer;
use crate::engine::sessions::SessionStore;
use log::info;

// ── Outcomes ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub created: bool,
    /// On success the new fact; on duplicate the pre-existing one.
    pub fact: Option<MemoryFact>,
    /// Set when the sanitizer rejected the candidate.
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    pub removed: bool,
    pub fact: Option<MemoryFact>,
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub updated: bool,
    pub fact: Option<MemoryFact>,
    pub reason: Option<String>,
}

// ── Operations ─────────────────────────────────────────────────────────────

/// Sanitize, dedup, insert. The only way a fact enters the store.
pub fn add_fact(
    store: &SessionStore,
    user_id: &str,
    raw_fact: &str,
    category: MemoryCategory,
    source_conversation_id: Option<&str>,
) -> EngineResult<AddOutcome> {
    let outcome = sanitizer::sanitize_fact(raw_fact);
    if outcome.rejected {
        info!(
            "[memory] Fact rejected for user {}: {}",
            user_id,
            outcome.reason.as_deref().unwrap_or("unspecified")
        );
        return Ok(AddOutcome {
            created: false,
            fact: None,
            reason: outcome.reason,
        });
    }
    if outcome.sanitized.is_empty() {
        return Ok(AddOutcome {
            created: false,
            fact: None,
            reason: Some("fact is empty after sanitization".into()),
        });
    }

    if let Some(existing) = store.find_duplicate_fact(user_id, &outcome.sanitized)? {
        return Ok(AddOutcome {
            created: false,
            fact: Some(existing),
            reason: None,
        });
    }

    let fact = MemoryFact {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        fact: outcome.sanitized,
        category,
        confidence: Confidence::High,
        extracted_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        source_conversation_id: source_conversation_id.map(|s| s.to_string()),
    };
    store.insert_fact(&fact)?;
    info!(
        "[memory] Stored fact for user {}: [{}] {}",
        user_id,
        fact.category.as_str(),
        fact.fact
    );

    Ok(AddOutcome {
        created: true,
        fact: Some(fact),
        reason: None,
    })
}

/// Remove the first fact matching the search term. A miss is a normal
/// negative result — callers (including the tool loop) must not treat it
/// as an error.
pub fn remove_fact_by_search(
    store: &SessionStore,
    user_id: &str,
    term: &str,
) -> EngineResult<RemoveOutcome> {
    match store.find_fact_by_search(user_id, term)? {
        Some(fact) => {
            store.delete_fact(&fact.id)?;
            info!("[memory] Removed fact for user {}: {}", user_id, fact.fact);
            Ok(RemoveOutcome {
                removed: true,
                fact: Some(fact),
            })
        }
        None => Ok(RemoveOutcome {
            removed: false,
            fact: None,
        }),
    }
}

/// Locate a fact by the same search rule and replace whichever of
/// fact-text / category were provided. A new fact text is sanitized exactly
/// as in add.
pub fn update_fact_by_search(
    store: &SessionStore,
    user_id: &str,
    term: &str,
    new_fact: Option<&str>,
    new_category: Option<MemoryCategory>,
) -> EngineResult<UpdateOutcome> {
    let Some(existing) = store.find_fact_by_search(user_id, term)? else {
        return Ok(UpdateOutcome {
            updated: false,
            fact: None,
            reason: None,
        });
    };

    let fact_text = match new_fact {
        Some(raw) => {
            let outcome = sanitizer::sanitize_fact(raw);
            if outcome.rejected {
                return Ok(UpdateOutcome {
                    updated: false,
                    fact: Some(existing),
                    reason: outcome.reason,
                });
            }
            outcome.sanitized
        }
        None => existing.fact.clone(),
    };
    let category = new_category.unwrap_or(existing.category);

    store.update_fact(&existing.id, &fact_text, category)?;
    let updated = MemoryFact {
        fact: fact_text,
        category,
        ..existing
    };
    info!(
        "[memory] Updated fact for user {}: [{}] {}",
        user_id,
        updated.category.as_str(),
        updated.fact
    );

    Ok(UpdateOutcome {
        updated: true,
        fact: Some(updated),
        reason: None,
    })
}
