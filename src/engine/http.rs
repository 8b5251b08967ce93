// ── Souschef Engine: HTTP Retry Utilities ──────────────────────────────────
//
// Shared retry helpers used by the AI providers.
//
// Features:
//   • Exponential backoff with ±25% jitter (base 1s, max 30s, 3 retries)
//   • Retry on 429 (rate limit), 500, 502, 503, 504, 529
//   • Respects `Retry-After` header (integer-seconds form)

use std::time::{Duration, SystemTime};

// ── Constants ──────────────────────────────────────────────────────────────

/// Default maximum number of retry attempts per request.
pub const MAX_RETRIES: u32 = 3;

/// Initial retry delay in milliseconds (doubles each attempt).
const INITIAL_RETRY_DELAY_MS: u64 = 1_000;

/// Maximum retry delay cap in milliseconds (30 seconds).
const MAX_RETRY_DELAY_MS: u64 = 30_000;

// ── Retryable status detection ─────────────────────────────────────────────

/// Check if an HTTP status code represents a transient/retryable error.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504 | 529)
}

// ── Backoff delay ──────────────────────────────────────────────────────────

/// Sleep with exponential backoff + ±25% jitter.
/// Respects Retry-After if the server sent one (capped at 60s, floored at
/// the computed backoff). Returns the actual delay duration for logging.
pub async fn retry_delay(attempt: u32, retry_after_secs: Option<u64>) -> Duration {
    let base_ms = INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt);
    let capped_ms = base_ms.min(MAX_RETRY_DELAY_MS);
    let delay_ms = match retry_after_secs {
        Some(secs) => (secs.min(60) * 1000).max(capped_ms),
        None => capped_ms,
    };
    let delay = Duration::from_millis(apply_jitter(delay_ms));
    tokio::time::sleep(delay).await;
    delay
}

/// Apply ±25% jitter to prevent thundering-herd effects.
fn apply_jitter(base_ms: u64) -> u64 {
    let jitter_range = (base_ms / 4) as i64;
    if jitter_range == 0 {
        return base_ms.max(100);
    }
    let offset = (clock_jitter() % (2 * jitter_range + 1)) - jitter_range;
    (base_ms as i64 + offset).max(100) as u64
}

/// Simple jitter source using system clock nanos (no extra crate needed).
fn clock_jitter() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as i64
}

// ── Retry-After header parsing ─────────────────────────────────────────────

/// Parse a Retry-After header value (integer seconds only).
/// HTTP-date format is not implemented — falls back to computed backoff.
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for s in [429, 500, 502, 503, 504, 529] {
            assert!(is_retryable_status(s));
        }
        for s in [200, 400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(s));
        }
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("12"), Some(12));
        assert_eq!(parse_retry_after(" 5 "), Some(5));
        assert_eq!(parse_retry_after("Fri, 31 Dec 1999 23:59:59 GMT"), None);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        for _ in 0..50 {
            let v = apply_jitter(1000);
            assert!((750..=1250).contains(&v));
        }
    }
}
