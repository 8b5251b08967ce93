// Souschef Engine — Memory Compaction
// Periodically distills recent conversation history into durable profile
// facts via a dedicated extraction prompt, then funnels the survivors
// through the same add path as the interactive tools — same sanitization,
// same dedup rules.
//
// The whole routine is invoked fire-and-forget after a turn completes; any
// failure is caught, logged, and swallowed. It must never fail or delay the
// user-visible turn.

use crate::atoms::constants::{
    COMPACTION_MAX_AGE_HOURS, COMPACTION_MESSAGE_THRESHOLD, COMPACTION_RECENT_MESSAGES,
};
use crate::atoms::error::EngineResult;
use crate::atoms::types::{
    truncate_utf8, ConversationMeta, MemoryCategory, Message, Role, StoredMessage,
};
use crate::engine::memory;
use crate::engine::providers::AnyProvider;
use crate::engine::sessions::SessionStore;
use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde::Deserialize;

// ── Config & results ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Messages since the last run before compaction is triggered.
    pub message_threshold: i64,
    /// Hours since the last run before compaction is triggered.
    pub max_age_hours: i64,
    /// How many recent messages the extraction prompt sees.
    pub recent_messages: i64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            message_threshold: COMPACTION_MESSAGE_THRESHOLD,
            max_age_hours: COMPACTION_MAX_AGE_HOURS,
            recent_messages: COMPACTION_RECENT_MESSAGES,
        }
    }
}

/// Statistics returned after a compaction run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompactionOutcome {
    pub conversation_id: String,
    /// Facts the extraction produced (before confidence filtering / dedup).
    pub candidates: usize,
    /// Facts actually written to the store.
    pub new_memories: usize,
}

// ── Trigger decision ───────────────────────────────────────────────────────

/// Pure trigger check over one consistent snapshot — message volume OR
/// elapsed time, whichever crosses first.
pub fn needs_compaction(meta: &ConversationMeta, now: DateTime<Utc>, config: &CompactionConfig) -> bool {
    if meta.messages_since_compaction >= config.message_threshold {
        return true;
    }
    now - meta.last_compaction_at > Duration::hours(config.max_age_hours)
}

// ── Extraction prompt ──────────────────────────────────────────────────────

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract durable facts about a user's dietary profile from a cooking-assistant \
     conversation. Only extract facts the USER stated about themselves.\n\n\
     Each fact gets one of exactly six categories:\n\
     - allergy: a food allergy\n\
     - intolerance: a food intolerance or sensitivity\n\
     - restriction: a dietary restriction (vegetarian, kosher, low-sodium, ...)\n\
     - equipment: kitchen equipment the user owns or lacks\n\
     - goal: a nutrition or cooking goal\n\
     - preference: likes, dislikes, taste preferences\n\n\
     Confidence is \"high\" only when the user stated the fact explicitly; use \"medium\" or \
     \"low\" for anything inferred. Do NOT re-extract anything already covered by the known \
     facts listed in the request.\n\n\
     Respond with strict JSON, nothing else:\n\
     {\"memories\":[{\"fact\":\"User ...\",\"category\":\"...\",\"confidence\":\"high\"}]}\n\
     Return {\"memories\":[]} when there is nothing new.";

/// Render recent history + known facts into the extraction request.
fn build_extraction_prompt(messages: &[StoredMessage], existing_facts: &[String]) -> Vec<Message> {
    let mut transcript = String::new();
    for msg in messages {
        match msg.role.as_str() {
            // Tool chatter carries no user facts — note it and move on.
            "tool" => {
                let name = msg.name.as_deref().unwrap_or("tool");
                transcript.push_str(&format!(
                    "[tool {} → {}]\n",
                    name,
                    truncate_utf8(&msg.content, 100)
                ));
            }
            role => {
                transcript.push_str(&format!(
                    "{}: {}\n",
                    role,
                    truncate_utf8(&msg.content, 500)
                ));
            }
        }
    }

    let known = if existing_facts.is_empty() {
        "(none)".to_string()
    } else {
        existing_facts
            .iter()
            .map(|f| format!("- {}", f))
            .collect::<Vec<_>>()
            .join("\n")
    };

    vec![
        Message::text(Role::System, EXTRACTION_SYSTEM_PROMPT),
        Message::text(
            Role::User,
            format!(
                "Known facts (do not repeat):\n{}\n\nConversation:\n{}",
                known, transcript
            ),
        ),
    ]
}

// ── Permissive response parsing ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    #[serde(default)]
    memories: Vec<ExtractedMemory>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractedMemory {
    #[serde(default)]
    pub fact: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: String,
}

/// Pull the JSON payload out of a model response: fenced ```json block
/// first, else the outermost `{…}` span. Parse failure means zero facts —
/// never an error.
pub(crate) fn parse_extraction(text: &str) -> Vec<ExtractedMemory> {
    let candidate = fenced_json(text)
        .or_else(|| brace_span(text))
        .unwrap_or_default();
    match serde_json::from_str::<ExtractionPayload>(candidate) {
        Ok(payload) => payload.memories,
        Err(e) => {
            if !candidate.is_empty() {
                warn!("[compaction] Extraction JSON did not parse: {}", e);
            }
            Vec::new()
        }
    }
}

fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip a language tag ("json") up to the first newline
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}

// ── Compaction run ─────────────────────────────────────────────────────────

/// One full extraction pass over a conversation. Marks the conversation as
/// compacted even when nothing was extracted, so the trigger cannot re-fire
/// immediately.
pub async fn run_compaction(
    store: &SessionStore,
    provider: &AnyProvider,
    model: &str,
    conversation_id: &str,
) -> EngineResult<CompactionOutcome> {
    let config = CompactionConfig::default();

    let conversation = store
        .get_conversation(conversation_id)?
        .ok_or_else(|| format!("unknown conversation: {}", conversation_id))?;
    let user_id = conversation.user_id;

    let messages = store.get_recent_messages(conversation_id, config.recent_messages)?;
    if messages.is_empty() {
        store.mark_compacted(conversation_id)?;
        return Ok(CompactionOutcome {
            conversation_id: conversation_id.to_string(),
            candidates: 0,
            new_memories: 0,
        });
    }

    let existing = store.fact_strings(&user_id)?;
    let prompt = build_extraction_prompt(&messages, &existing);

    info!(
        "[compaction] Extracting from {} messages for conversation {} ({} known facts)",
        messages.len(),
        conversation_id,
        existing.len()
    );

    let completion = provider.complete(&prompt, &[], model, Some(0.2)).await?;
    let text = completion.content.unwrap_or_default();
    let candidates = parse_extraction(&text);
    let candidate_count = candidates.len();

    let mut new_memories = 0;
    for candidate in candidates {
        // Precision over recall: anything below explicit-statement
        // confidence is discarded unconditionally.
        if !candidate.confidence.eq_ignore_ascii_case("high") {
            continue;
        }
        let Some(category) = MemoryCategory::parse(&candidate.category) else {
            warn!(
                "[compaction] Dropping extraction with unknown category '{}'",
                candidate.category
            );
            continue;
        };
        if candidate.fact.trim().is_empty() {
            continue;
        }

        // Same path as the interactive tool — same sanitizer, same dedup.
        let outcome = memory::add_fact(
            store,
            &user_id,
            &candidate.fact,
            category,
            Some(conversation_id),
        )?;
        if outcome.created {
            new_memories += 1;
        }
    }

    store.mark_compacted(conversation_id)?;

    info!(
        "[compaction] Done for {}: {} candidates → {} new memories",
        conversation_id, candidate_count, new_memories
    );

    Ok(CompactionOutcome {
        conversation_id: conversation_id.to_string(),
        candidates: candidate_count,
        new_memories,
    })
}

/// Trigger check + run, with every failure contained. Safe to invoke after
/// every turn; returns None when nothing ran or the run failed.
pub async fn maybe_compact(
    store: &SessionStore,
    provider: &AnyProvider,
    model: &str,
    conversation_id: &str,
) -> Option<CompactionOutcome> {
    let config = CompactionConfig::default();

    let meta = match store.get_conversation_meta(conversation_id) {
        Ok(Some(meta)) => meta,
        Ok(None) => {
            warn!(
                "[compaction] No such conversation: {} — skipping",
                conversation_id
            );
            return None;
        }
        Err(e) => {
            warn!("[compaction] Failed to load trigger snapshot: {}", e);
            return None;
        }
    };

    if !needs_compaction(&meta, Utc::now(), &config) {
        return None;
    }

    info!(
        "[compaction] Triggered for {} ({} messages since last run)",
        conversation_id, meta.messages_since_compaction
    );
    match run_compaction(store, provider, model, conversation_id).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            // Swallowed by design — the next trigger window retries naturally.
            warn!("[compaction] Run failed for {}: {}", conversation_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(messages: i64, age_hours: i64) -> ConversationMeta {
        ConversationMeta {
            messages_since_compaction: messages,
            last_compaction_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    #[test]
    fn test_trigger_is_monotonic_in_message_count() {
        let config = CompactionConfig::default();
        let now = Utc::now();
        assert!(!needs_compaction(&meta(9, 0), now, &config));
        assert!(needs_compaction(&meta(10, 0), now, &config));
        assert!(needs_compaction(&meta(11, 0), now, &config));
    }

    #[test]
    fn test_trigger_on_age_alone() {
        let config = CompactionConfig::default();
        let now = Utc::now();
        assert!(!needs_compaction(&meta(0, 23), now, &config));
        assert!(needs_compaction(&meta(0, 25), now, &config));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here you go:\n```json\n{\"memories\":[{\"fact\":\"User is vegan\",\
                    \"category\":\"restriction\",\"confidence\":\"high\"}]}\n```";
        let parsed = parse_extraction(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].fact, "User is vegan");
    }

    #[test]
    fn test_parse_bare_braces() {
        let text = "Sure. {\"memories\":[{\"fact\":\"User has a wok\",\
                    \"category\":\"equipment\",\"confidence\":\"medium\"}]} Anything else?";
        let parsed = parse_extraction(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].confidence, "medium");
    }

    #[test]
    fn test_parse_garbage_is_empty_not_error() {
        assert!(parse_extraction("I couldn't find anything.").is_empty());
        assert!(parse_extraction("```json\nnot json\n```").is_empty());
        assert!(parse_extraction("").is_empty());
    }

    #[test]
    fn test_prompt_lists_known_facts() {
        let msgs = vec![StoredMessage {
            id: "m1".into(),
            conversation_id: "c1".into(),
            role: "user".into(),
            content: "I'm vegan now".into(),
            tool_calls_json: None,
            tool_call_id: None,
            name: None,
            recipe_json: None,
            created_at: String::new(),
        }];
        let prompt = build_extraction_prompt(&msgs, &["User has an air fryer".into()]);
        assert_eq!(prompt.len(), 2);
        assert!(prompt[1].content.contains("- User has an air fryer"));
        assert!(prompt[1].content.contains("user: I'm vegan now"));
    }
}
