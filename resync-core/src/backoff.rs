//! Retry backoff with jitter.
//!
//! The coordinator never retries on its own. This is the delay calculation
//! used by the retry collaborator that callers may wrap around an operation.

use std::time::Duration;

/// Exponential backoff with random jitter.
///
/// Formula: min(max, base * 2^(attempt-1)) + random(0..=max_jitter)
///
/// Jitter keeps many coordinators that failed together (e.g. after a server
/// restart) from retrying in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry, without jitter.
    pub base: Duration,
    /// Cap on the exponential part.
    pub max: Duration,
    /// Upper bound of the random jitter added to every delay.
    pub max_jitter: Duration,
}

impl Backoff {
    /// Create a backoff from its three parameters.
    pub fn new(base: Duration, max: Duration, max_jitter: Duration) -> Self {
        Self {
            base,
            max,
            max_jitter,
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Delay before retry number `attempt` (1-based), jitter included.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = random_jitter_ms(self.max_jitter.as_millis() as u64);
        self.base_delay(attempt) + Duration::from_millis(jitter_ms)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

/// Generate random jitter between 0 and `max_ms` milliseconds inclusive.
///
/// Falls back to no jitter if the OS random source is unavailable.
fn random_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return 0;
    }
    u64::from_le_bytes(bytes) % (max_ms + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(base_ms: u64, max_ms: u64) -> Backoff {
        Backoff::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
            Duration::ZERO,
        )
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let backoff = no_jitter(100, 60_000);
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn backoff_capped_at_max() {
        let backoff = no_jitter(1_000, 30_000);
        assert_eq!(backoff.delay(10), Duration::from_secs(30));
        // Huge attempt numbers must not overflow
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn attempt_zero_treated_as_first() {
        let backoff = no_jitter(250, 10_000);
        assert_eq!(backoff.delay(0), backoff.delay(1));
    }

    #[test]
    fn jitter_stays_within_bound() {
        let backoff = Backoff::new(
            Duration::from_secs(2),
            Duration::from_secs(30),
            Duration::from_millis(5000),
        );
        for _ in 0..50 {
            let delay = backoff.delay(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_secs(7));
        }
    }

    #[test]
    fn jitter_creates_variance() {
        let backoff = Backoff::new(
            Duration::from_secs(8),
            Duration::from_secs(30),
            Duration::from_millis(5000),
        );
        let delays: Vec<Duration> = (0..20).map(|_| backoff.delay(1)).collect();
        let min = delays.iter().min().unwrap();
        let max = delays.iter().max().unwrap();

        // 20 samples over 5001 jitter values; collision of all is vanishingly unlikely
        assert!(
            max.as_millis() - min.as_millis() >= 100,
            "Expected jitter variance, got min={:?} max={:?}",
            min,
            max
        );
    }

    #[test]
    fn default_backoff_values() {
        let backoff = Backoff::default();
        assert_eq!(backoff.base_delay(1), Duration::from_secs(1));
        assert_eq!(backoff.base_delay(6), Duration::from_secs(30));
    }
}
