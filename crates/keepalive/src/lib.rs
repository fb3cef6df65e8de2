//! Keep-alive service for the browser session
//!
//! Periodically runs a read-only probe so an idle session is not reaped.
//! Probe failures are logged and tolerated; they never reach the agent loop.

use std::future::Future;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_INTERVAL_S: u64 = 30;
const DEFAULT_PROBE_TIMEOUT_S: u64 = 5;

/// Result of one liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Alive,
    /// The session is gone; the service stops
    Closed,
    Failed(String),
}

/// Counters reported when the service stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepAliveReport {
    pub probes: u64,
    pub failures: u64,
}

/// Keep-alive service for long-lived sessions
pub struct KeepAliveService {
    interval: Duration,
    probe_timeout: Duration,
    enabled: bool,
}

impl KeepAliveService {
    /// Create a new keep-alive service
    pub fn new(interval_s: Option<u64>, probe_timeout_s: Option<u64>, enabled: bool) -> Self {
        Self {
            interval: Duration::from_secs(interval_s.unwrap_or(DEFAULT_INTERVAL_S).max(1)),
            probe_timeout: Duration::from_secs(
                probe_timeout_s.unwrap_or(DEFAULT_PROBE_TIMEOUT_S).max(1),
            ),
            enabled,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Probe until the session closes or `cancel` fires
    pub async fn run<F, Fut>(&self, mut probe: F, cancel: CancellationToken) -> KeepAliveReport
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = ProbeStatus> + Send,
    {
        let mut report = KeepAliveReport::default();
        if !self.enabled {
            info!("Keep-alive service disabled");
            return report;
        }

        info!("Keep-alive service started (every {}s)", self.interval.as_secs());

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately; the session is fresh, skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Keep-alive: cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            report.probes += 1;
            let status = tokio::select! {
                _ = cancel.cancelled() => break,
                result = timeout(self.probe_timeout, probe()) => result
                    .unwrap_or_else(|_| ProbeStatus::Failed("probe timed out".to_string())),
            };

            match status {
                ProbeStatus::Alive => debug!("Keep-alive: OK"),
                ProbeStatus::Closed => {
                    info!("Keep-alive: session closed, stopping");
                    break;
                }
                ProbeStatus::Failed(reason) => {
                    report.failures += 1;
                    warn!("Keep-alive probe failed: {}", reason);
                }
            }
        }

        report
    }
}
