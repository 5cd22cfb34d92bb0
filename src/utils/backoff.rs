//! Exponential backoff with jitter for retry mechanisms
//!
//! Uses system time as a lightweight pseudo-randomness source instead of
//! pulling in a random crate for a single jitter value.

use std::time::Duration;

/// Generate a pseudo-random jitter value between 0 and `max_jitter_ms`
pub fn jitter_ms(max_jitter_ms: u64) -> u64 {
    if max_jitter_ms == 0 {
        return 0;
    }

    (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        % (max_jitter_ms + 1) as u128) as u64
}

/// Compute the delay before retry number `attempt` (zero-based)
///
/// Doubles the base delay per attempt, caps at `max_delay_ms`, then adds
/// jitter as a percentage of the capped delay so that many workers retrying
/// the same source do not stampede it.
pub fn retry_delay(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_percent: u8,
) -> Duration {
    let exponential = base_delay_ms.saturating_mul(2_u64.saturating_pow(attempt.min(16)));
    let capped = exponential.min(max_delay_ms);
    let jitter = jitter_ms((capped * jitter_percent as u64) / 100);

    Duration::from_millis(capped + jitter)
}
