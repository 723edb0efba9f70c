use std::time::Duration;

/// Exponential backoff capped at 30s, matching the bounded-backoff language
/// in the retry policy: `attempt` is 1-indexed (the first retry after a
/// failure passes `1`).
pub fn backoff_delay(attempt: u32) -> Duration {
    const BASE_MS: u64 = 250;
    const CAP_MS: u64 = 30_000;
    let exp = BASE_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(exp.min(CAP_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempt() {
        assert!(backoff_delay(1) < backoff_delay(2));
        assert!(backoff_delay(2) < backoff_delay(3));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(40), Duration::from_millis(30_000));
    }
}
