//! Loop tuning resolved from configuration

use std::time::Duration;

use webpilot_config::AgentConfig;

use crate::retry::{RetryPolicy, SensorRetry};

#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub max_iterations: u32,
    pub retry: RetryPolicy,
    pub sensor_retry: SensorRetry,
    /// History entries shown to the oracle
    pub history_window: usize,
    /// Entries scanned for repeated completion claims
    pub loop_window: usize,
    /// Completion markers within the window that count as a loop
    pub loop_threshold: usize,
    pub iteration_pause: Duration,
    pub wait_pause: Duration,
    pub wait_timeout: Duration,
    pub task_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

impl AgentSettings {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            retry: RetryPolicy {
                base_delay: Duration::from_millis(config.base_delay_ms),
                max_delay: Duration::from_millis(config.max_delay_ms),
                max_errors: config.max_errors,
            },
            sensor_retry: SensorRetry {
                attempts: config.sensor_retries.max(1),
                pause: Duration::from_millis(config.sensor_retry_pause_ms),
            },
            history_window: config.history_window,
            loop_window: config.loop_window,
            loop_threshold: config.loop_threshold,
            iteration_pause: Duration::from_millis(config.iteration_pause_ms),
            wait_pause: Duration::from_millis(config.wait_pause_ms),
            wait_timeout: Duration::from_secs(config.wait_selector_timeout_s),
            task_timeout: Duration::from_secs(config.task_timeout_s),
        }
    }

    /// Same limits with every sleep removed
    pub fn without_pauses(mut self) -> Self {
        self.retry.base_delay = Duration::ZERO;
        self.retry.max_delay = Duration::ZERO;
        self.sensor_retry.pause = Duration::ZERO;
        self.iteration_pause = Duration::ZERO;
        self.wait_pause = Duration::ZERO;
        self
    }
}
