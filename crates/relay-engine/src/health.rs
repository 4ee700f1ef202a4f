//! Media activity tracking and the periodic health probe.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Health of the running graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// The graph is not in the running state.
    NotRunning,
    /// Running, but no media left the multiplexer within the timeout.
    Stalled,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::NotRunning => write!(f, "not running"),
            HealthStatus::Stalled => write!(f, "stalled"),
        }
    }
}

/// Timestamp of the last buffer seen on the graph output.
///
/// Cloning shares the same clock; `touch` is lock-free so it can run on
/// every buffer.
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    origin: Instant,
    last_ms: Arc<AtomicU64>,
}

impl Default for ActivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityMonitor {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_ms.store(elapsed, Ordering::Relaxed);
    }

    pub fn idle_for(&self) -> Duration {
        let now = self.origin.elapsed().as_millis() as u64;
        Duration::from_millis(now.saturating_sub(self.last_ms.load(Ordering::Relaxed)))
    }
}

pub type HealthCallback = Arc<dyn Fn(HealthStatus) + Send + Sync>;

/// Periodic check combining the run state with output activity. Only
/// transitions are reported.
pub struct HealthProbe {
    activity: ActivityMonitor,
    interval: Duration,
    activity_timeout: Duration,
    last: Mutex<HealthStatus>,
    callback: Option<HealthCallback>,
}

impl HealthProbe {
    pub fn new(activity: ActivityMonitor, interval: Duration, activity_timeout: Duration) -> Self {
        Self {
            activity,
            interval,
            activity_timeout,
            last: Mutex::new(HealthStatus::Healthy),
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: HealthCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn evaluate(&self, running: bool) -> HealthStatus {
        if !running {
            HealthStatus::NotRunning
        } else if self.activity.idle_for() > self.activity_timeout {
            HealthStatus::Stalled
        } else {
            HealthStatus::Healthy
        }
    }

    /// Evaluates and returns the new status if it differs from the previous
    /// check.
    pub fn check(&self, running: bool) -> Option<HealthStatus> {
        let status = self.evaluate(running);
        let previous = std::mem::replace(&mut *self.last.lock(), status);
        if previous == status {
            return None;
        }

        if status.is_healthy() {
            info!(from = %previous, "graph healthy again");
        } else {
            warn!(
                from = %previous,
                to = %status,
                idle_ms = self.activity.idle_for().as_millis() as u64,
                "graph health degraded"
            );
        }
        if let Some(callback) = &self.callback {
            callback(status);
        }
        Some(status)
    }

    pub fn status(&self) -> HealthStatus {
        *self.last.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_reports_transitions_only() {
        let activity = ActivityMonitor::new();
        activity.touch();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let probe = HealthProbe::new(activity, Duration::from_secs(10), Duration::from_secs(30))
            .with_callback(Arc::new(move |_: HealthStatus| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));

        assert_eq!(probe.check(true), None);
        assert_eq!(probe.check(false), Some(HealthStatus::NotRunning));
        assert_eq!(probe.check(false), None);
        assert_eq!(probe.check(true), Some(HealthStatus::Healthy));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_activity_is_stalled() {
        let activity = ActivityMonitor::new();
        activity.touch();
        let probe = HealthProbe::new(activity.clone(), Duration::from_millis(5), Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(probe.evaluate(true), HealthStatus::Stalled);
        activity.touch();
        let relaxed = HealthProbe::new(activity, Duration::from_millis(5), Duration::from_secs(60));
        assert_eq!(relaxed.evaluate(true), HealthStatus::Healthy);
    }
}
