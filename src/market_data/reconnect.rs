use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_delay_ms() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_max_delay_ms() -> u64 {
    60_000
}

/// Delay schedule between a stream closing and the next connect attempt.
///
/// With `multiplier == 1.0` (the default) every reconnect waits exactly
/// `delay_ms`. A larger multiplier turns it into exponential backoff capped at
/// `max_delay_ms`; the stream state machine is the same either way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// Always wait `delay`, whatever the attempt number.
    pub fn fixed(delay: Duration) -> Self {
        let ms = delay.as_millis() as u64;
        Self {
            delay_ms: ms,
            multiplier: 1.0,
            max_delay_ms: ms,
        }
    }

    /// Delay before reconnect attempt number `attempt` (0-based, reset after
    /// every successful open).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.delay_ms as f64;
        if !self.multiplier.is_finite() || self.multiplier <= 1.0 {
            return Duration::from_millis(self.delay_ms);
        }
        let scaled = base * self.multiplier.powi(attempt.min(32) as i32);
        let cap = self.max_delay_ms.max(self.delay_ms) as f64;
        Duration::from_millis(scaled.min(cap) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_five_seconds() {
        let policy = ReconnectPolicy::default();
        for attempt in 0..10 {
            assert_eq!(policy.delay_for(attempt), Duration::from_secs(5));
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = ReconnectPolicy {
            delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 5_000,
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn fixed_policy_never_backs_off() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(750));
        assert_eq!(policy.delay_for(0), Duration::from_millis(750));
        assert_eq!(policy.delay_for(9), Duration::from_millis(750));
    }

    #[test]
    fn nonsense_multiplier_falls_back_to_fixed() {
        let policy = ReconnectPolicy {
            delay_ms: 250,
            multiplier: f64::NAN,
            max_delay_ms: 10,
        };
        assert_eq!(policy.delay_for(4), Duration::from_millis(250));
    }
}
