//! Reconnection policy for progress streams.
//!
//! A dropped event stream is re-opened the way a browser `EventSource`
//! would, but only [`ReconnectConfig::max_attempts`] times in a row
//! before the transport declares the connection lost. [`Backoff`] tracks
//! that budget for one stream.

use std::time::Duration;

/// Reconnect tuning, shared by every stream of a client.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait before the first reconnect, unless the server sent a
    /// `retry:` hint.
    pub initial_delay: Duration,
    /// Ceiling for any single wait, server hints included.
    pub max_delay: Duration,
    /// Growth factor applied after each failed attempt.
    pub multiplier: f64,
    /// Consecutive reconnects allowed before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: 3,
        }
    }
}

/// The wait following `current`, grown by the multiplier and clamped to
/// [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    current.mul_f64(config.multiplier).min(config.max_delay)
}

/// Reconnect budget of a single stream.
#[derive(Debug)]
pub struct Backoff {
    config: ReconnectConfig,
    delay: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        let delay = config.initial_delay.min(config.max_delay);
        Self {
            config,
            delay,
            attempts: 0,
        }
    }

    /// A stream opened successfully: the attempt budget is restored and
    /// the next wait restarts from the server's `retry:` hint, if any.
    pub fn reset(&mut self, retry_hint: Option<Duration>) {
        self.attempts = 0;
        self.delay = retry_hint
            .unwrap_or(self.config.initial_delay)
            .min(self.config.max_delay);
    }

    /// Wait before the next reconnect, or `None` once the budget is spent.
    pub fn next_wait(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        self.attempts += 1;
        let wait = self.delay;
        self.delay = next_delay(wait, &self.config);
        Some(wait)
    }

    /// Reconnects made since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            max_attempts,
            ..Default::default()
        }
    }

    fn waits(backoff: &mut Backoff) -> Vec<u64> {
        std::iter::from_fn(|| backoff.next_wait())
            .map(|d| d.as_millis() as u64)
            .collect()
    }

    #[test]
    fn waits_grow_until_budget_is_spent() {
        let mut backoff = Backoff::new(config(3));
        assert_eq!(waits(&mut backoff), vec![1000, 2000, 4000]);
        assert_eq!(backoff.attempts(), 3);
        assert_eq!(backoff.next_wait(), None);
    }

    #[test]
    fn zero_attempts_never_reconnects() {
        assert_eq!(Backoff::new(config(0)).next_wait(), None);
    }

    #[test]
    fn growth_is_clamped() {
        let mut backoff = Backoff::new(ReconnectConfig {
            max_delay: Duration::from_secs(5),
            max_attempts: 5,
            ..Default::default()
        });
        assert_eq!(waits(&mut backoff), vec![1000, 2000, 4000, 5000, 5000]);
    }

    #[test]
    fn reset_restores_budget_and_uses_hint() {
        let mut backoff = Backoff::new(config(2));
        waits(&mut backoff);

        backoff.reset(Some(Duration::from_millis(2500)));
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(waits(&mut backoff), vec![2500, 5000]);
    }

    #[test]
    fn oversized_hint_is_clamped() {
        let mut backoff = Backoff::new(config(1));
        backoff.reset(Some(Duration::from_secs(600)));
        assert_eq!(backoff.next_wait(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn reset_without_hint_falls_back_to_initial_delay() {
        let mut backoff = Backoff::new(config(3));
        waits(&mut backoff);
        backoff.reset(None);
        assert_eq!(backoff.next_wait(), Some(Duration::from_secs(1)));
    }
}
