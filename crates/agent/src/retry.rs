//! Consecutive-error accounting, backoff and the circuit breaker

use std::time::Duration;

use crate::state::AgentRunState;

/// What to do after a failed iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Sleep this long, then start the next iteration
    Retry(Duration),
    /// Too many consecutive errors; stop the run
    Trip,
}

/// Linear, capped backoff with a consecutive-error breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_errors: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
            max_errors: 5,
        }
    }
}

impl RetryPolicy {
    /// `min(error_count * base_delay, max_delay)`
    pub fn delay(&self, error_count: u32) -> Duration {
        self.base_delay
            .checked_mul(error_count)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Count a failure and decide between backing off and tripping
    pub fn record_failure(&self, state: &mut AgentRunState) -> Backoff {
        state.consecutive_errors += 1;
        if self.is_tripped(state.consecutive_errors) {
            Backoff::Trip
        } else {
            Backoff::Retry(self.delay(state.consecutive_errors))
        }
    }

    pub fn record_success(&self, state: &mut AgentRunState) {
        state.consecutive_errors = 0;
    }

    pub fn is_tripped(&self, error_count: u32) -> bool {
        error_count >= self.max_errors
    }
}

/// Bounded local retry for transient sensing timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorRetry {
    pub attempts: u32,
    pub pause: Duration,
}

impl Default for SensorRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            pause: Duration::from_secs(1),
        }
    }
}

impl SensorRetry {
    /// Linear pacing: the n-th failed attempt waits n pauses
    pub fn pause_after(&self, attempt: u32) -> Duration {
        self.pause.saturating_mul(attempt)
    }
}

/// Hint recorded in history so the oracle can adapt after a failure
pub fn adaptation_note(error: &str) -> &'static str {
    let lower = error.to_lowercase();

    if lower.contains("not found") || lower.contains("не найден") {
        "element not found, look for an alternative way to reach it"
    } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("таймаут")
    {
        "timed out, wait longer before the next attempt"
    } else if lower.contains("visible") || lower.contains("видим") {
        "element not visible, wait for the page to finish loading"
    } else {
        "retry after a delay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_linear_and_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
        assert_eq!(policy.delay(5), Duration::from_secs(10));
        assert_eq!(policy.delay(100), Duration::from_secs(10));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_delay_non_decreasing() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for n in 0..50 {
            let delay = policy.delay(n);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_breaker_trips_on_fifth_failure() {
        let policy = RetryPolicy::default();
        let mut state = AgentRunState::new();
        for n in 1..5 {
            assert_eq!(
                policy.record_failure(&mut state),
                Backoff::Retry(policy.delay(n))
            );
        }
        assert_eq!(policy.record_failure(&mut state), Backoff::Trip);
        assert_eq!(state.consecutive_errors, 5);
    }

    #[test]
    fn test_success_resets_counter() {
        let policy = RetryPolicy::default();
        let mut state = AgentRunState::new();
        for _ in 0..4 {
            policy.record_failure(&mut state);
        }
        policy.record_success(&mut state);
        assert_eq!(state.consecutive_errors, 0);
        assert!(matches!(policy.record_failure(&mut state), Backoff::Retry(_)));
    }

    #[test]
    fn test_sensor_pause_is_linear() {
        let retry = SensorRetry::default();
        assert_eq!(retry.pause_after(1), Duration::from_secs(1));
        assert_eq!(retry.pause_after(2), Duration::from_secs(2));
    }

    #[test]
    fn test_adaptation_notes() {
        assert!(adaptation_note("not found: text 'Login'").contains("alternative"));
        assert!(adaptation_note("timed out: #results").contains("wait longer"));
        assert!(adaptation_note("element is not visible").contains("loading"));
        assert_eq!(adaptation_note("connection reset"), "retry after a delay");
    }
}
