//! Exponential backoff with jitter for chain submission retries.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based): `base_ms * 2^(attempt-1)`
/// capped at `max_ms`, plus up to 10% random jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_ms = match delay_ms / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    };

    Duration::from_millis(delay_ms + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_attempt() {
        let first = calculate_backoff(1, 500, 5000);
        assert!(first >= Duration::from_millis(500) && first < Duration::from_millis(550));

        let second = calculate_backoff(2, 500, 5000);
        assert!(second >= Duration::from_millis(1000) && second < Duration::from_millis(1100));
    }

    #[test]
    fn test_delay_is_capped() {
        let capped = calculate_backoff(40, 500, 5000);
        assert!(capped >= Duration::from_millis(5000));
        assert!(capped < Duration::from_millis(5500));

        // Shift overflow saturates instead of panicking.
        assert!(calculate_backoff(80, 500, 5000) < Duration::from_millis(5500));
    }

    #[test]
    fn test_zeroth_attempt_has_no_delay() {
        assert_eq!(calculate_backoff(0, 500, 5000), Duration::ZERO);
    }
}
