//! Per-key exponential backoff for failed reconciliations.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use drift_api::ObjectKey;

/// Tracks consecutive failures per key and computes the next retry
/// delay: `base * 2^(failures - 1)`, capped at `max`.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl Backoff {
    /// A tracker with the given base and cap.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure and return the delay before the next attempt.
    pub fn next_delay(&self, key: &ObjectKey) -> Duration {
        let attempts = {
            let Ok(mut failures) = self.failures.lock() else {
                return self.base;
            };
            let count = failures.entry(key.clone()).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };

        let exp = attempts.saturating_sub(1).min(32);
        let delay = self.base.saturating_mul(1u32 << exp.min(31));
        delay.min(self.max)
    }

    /// Clear failure tracking for a key (on success).
    pub fn reset(&self, key: &ObjectKey) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(key);
        }
    }

    /// Consecutive failures recorded for a key.
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures
            .lock()
            .map(|f| f.get(key).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    #[test]
    fn test_delay_doubles_until_cap() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(60));
        let k = key("a");

        assert_eq!(backoff.next_delay(&k), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(&k), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(&k), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(&k), Duration::from_secs(4));

        for _ in 0..20 {
            backoff.next_delay(&k);
        }
        assert_eq!(backoff.next_delay(&k), Duration::from_secs(60));
    }

    #[test]
    fn test_keys_are_tracked_independently() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(60));
        backoff.next_delay(&key("a"));
        backoff.next_delay(&key("a"));

        assert_eq!(backoff.next_delay(&key("b")), Duration::from_millis(500));
        assert_eq!(backoff.failures(&key("a")), 2);
    }

    #[test]
    fn test_reset_clears_history() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(60));
        let k = key("a");
        backoff.next_delay(&k);
        backoff.next_delay(&k);
        backoff.reset(&k);

        assert_eq!(backoff.failures(&k), 0);
        assert_eq!(backoff.next_delay(&k), Duration::from_millis(500));
    }
}
