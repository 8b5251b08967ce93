// Souschef Engine — Topic & Abuse Guardrails
//
// Three independent gates around one turn, layered so no single one has to
// be perfect:
//   1. pre-call abuse gate  — local injection scan, trips before any model
//      call is spent;
//   2. topic classifier     — only for ambiguous input, one minimal YES/NO
//      completion; FAILS OPEN on provider errors (explicit policy:
//      availability over strict enforcement — the system prompt and the
//      output gate below provide depth);
//   3. output guardrail     — scans the final answer for off-topic leakage
//      and replaces it wholesale with a fixed redirect.

use crate::atoms::constants::ABUSE_SCORE_THRESHOLD;
use crate::atoms::types::{Message, Role};
use crate::engine::injection;
use crate::engine::providers::AnyProvider;
use log::{info, warn};
use regex::Regex;
use std::sync::LazyLock;

// ── Gate 1: pre-call abuse check ───────────────────────────────────────────

/// True when the raw user message matches jailbreak/injection patterns
/// strongly enough to short-circuit the turn. No model call is made.
pub fn abuse_check(message: &str) -> bool {
    let scan = injection::scan(message);
    if scan.score >= ABUSE_SCORE_THRESHOLD {
        warn!(
            "[guardrail] Abuse gate tripped — severity={:?} score={} matches={}",
            scan.severity,
            scan.score,
            scan.matches.len()
        );
        for m in &scan.matches {
            info!(
                "[guardrail]   [{:?}] {}: '{}'",
                m.severity, m.category, m.matched
            );
        }
        return true;
    }
    false
}

// ── Gate 2: topic classifier ───────────────────────────────────────────────

/// Words that mark a message as clearly in-domain; the classifier is only
/// consulted when none of these (and no memory-management phrasing) appear.
const CULINARY_KEYWORDS: [&str; 32] = [
    "recipe", "cook", "bake", "baking", "roast", "grill", "fry", "simmer", "boil", "saute",
    "sauté", "ingredient", "meal", "dinner", "lunch", "breakfast", "snack", "dish", "food",
    "kitchen", "oven", "stove", "knife", "pan", "pot", "spice", "season", "flavor", "sauce",
    "dough", "marinade", "leftover",
];

/// Memory-profile phrasing is always in-domain — managing the dietary
/// profile is part of the assistant's job even with no food word present.
const MEMORY_KEYWORDS: [&str; 14] = [
    "remember", "forget", "allergic", "allergy", "intolerant", "intolerance", "vegetarian",
    "vegan", "gluten", "dairy", "kosher", "halal", "diet", "preference",
];

/// Cheap local check that skips the classifier call for obvious cases.
pub fn matches_domain_keywords(message: &str) -> bool {
    let lower = message.to_lowercase();
    CULINARY_KEYWORDS.iter().any(|k| lower.contains(k))
        || MEMORY_KEYWORDS.iter().any(|k| lower.contains(k))
}

const CLASSIFIER_PROMPT: &str = "You are a topic classifier for a cooking assistant. Reply with exactly YES if the \
     user's message is about food, cooking, recipes, nutrition, kitchen equipment, or their \
     dietary profile (allergies, restrictions, preferences). Reply with exactly NO otherwise. \
     Reply with one word only.";

/// Ask the model whether an ambiguous message is on-topic.
/// Any provider failure or unparseable verdict is PERMISSIVE — do not
/// "fix" this into fail-closed without re-evaluating the UX impact.
pub async fn is_on_topic(provider: &AnyProvider, model: &str, message: &str) -> bool {
    let messages = vec![
        Message::text(Role::System, CLASSIFIER_PROMPT),
        Message::text(Role::User, message),
    ];

    match provider.complete(&messages, &[], model, Some(0.0)).await {
        Ok(completion) => {
            let verdict = completion.content.unwrap_or_default();
            let verdict = verdict.trim().to_uppercase();
            if verdict.starts_with("NO") {
                info!("[guardrail] Topic classifier verdict: off-topic");
                false
            } else {
                // YES, or anything unexpected → permissive
                true
            }
        }
        Err(e) => {
            warn!(
                "[guardrail] Topic classifier unavailable ({}) — failing open",
                e
            );
            true
        }
    }
}

// ── Gate 3: output guardrail ───────────────────────────────────────────────

/// Signatures of off-topic leakage in a generated reply: fenced code blocks
/// and a small set of explicit non-culinary markers the system prompt
/// should have prevented.
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```").expect("valid pattern"));

static CODE_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(def |class |import |function |#include\b|console\.log|fn main\()")
        .expect("valid pattern")
});

const OFFTOPIC_MARKERS: [&str; 5] = [
    "as a large language model",
    "here's the code",
    "here is the code",
    "stock market",
    "cryptocurrency",
];

/// Check the model's final text. Returns false when the reply is clean;
/// true when it must be replaced with the fixed redirect. The rejected
/// content is logged (truncated) and never shown to the user.
pub fn output_tripped(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    let tripped = CODE_FENCE.is_match(reply)
        || CODE_SIGNATURE.is_match(reply)
        || OFFTOPIC_MARKERS.iter().any(|m| lower.contains(m));
    if tripped {
        warn!(
            "[guardrail] Output gate tripped — suppressing reply ({} chars)",
            reply.len()
        );
    }
    tripped
}
