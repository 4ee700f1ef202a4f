//! Fault classification, bounded retries and restarts.

use crate::config::RecoveryConfig;
use crate::error::{Error, Result};
use crate::health::{HealthProbe, HealthStatus};
use crate::runtime::{ErrorDomain, MediaRuntime, NodeRole, RuntimeEvent};
use crate::supervisor::{GraphSignal, GraphSupervisor};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use strum::Display;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FaultCategory {
    /// Manifest or source acquisition.
    Input,
    Decoding,
    Encoding,
    /// Sink or transport.
    Output,
    Network,
    /// Buffers, queues and backpressure.
    Resource,
    Configuration,
    Unknown,
}

impl FaultCategory {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Input | Self::Resource)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultRecord {
    pub category: FaultCategory,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Node that raised the fault, if known.
    pub origin: Option<String>,
    pub detail: Option<String>,
}

impl FaultRecord {
    pub fn new(category: FaultCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            timestamp: Utc::now(),
            origin: None,
            detail: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.category)?;
        if let Some(origin) = &self.origin {
            write!(f, "{origin}: ")?;
        }
        write!(f, "{}", self.message)
    }
}

const NETWORK_KEYWORDS: &[&str] = &[
    "connection",
    "network",
    "http",
    "timeout",
    "timed out",
    "could not resolve",
    "socket",
    "host",
];

/// Maps runtime error events to fault categories.
///
/// Checks run in order: network wording in the message or debug text, then
/// the role of the node that raised the error, then the runtime's error
/// domain.
#[derive(Debug, Clone, Default)]
pub struct FaultClassifier {
    roles: HashMap<String, NodeRole>,
}

impl FaultClassifier {
    pub fn new(roles: HashMap<String, NodeRole>) -> Self {
        Self { roles }
    }

    pub fn classify(
        &self,
        origin: Option<&str>,
        message: &str,
        debug: Option<&str>,
        domain: ErrorDomain,
    ) -> FaultCategory {
        let text = format!("{} {}", message, debug.unwrap_or_default()).to_ascii_lowercase();
        if NETWORK_KEYWORDS.iter().any(|k| text.contains(k)) {
            return FaultCategory::Network;
        }

        if let Some(role) = origin.and_then(|name| self.roles.get(name)) {
            return match role {
                NodeRole::Source | NodeRole::Demultiplexer => FaultCategory::Input,
                NodeRole::Parser | NodeRole::Decoder => FaultCategory::Decoding,
                NodeRole::Converter
                | NodeRole::Scaler
                | NodeRole::Overlay
                | NodeRole::Encoder
                | NodeRole::CapsFilter => FaultCategory::Encoding,
                NodeRole::Multiplexer | NodeRole::Sink => FaultCategory::Output,
                NodeRole::Queue => FaultCategory::Resource,
            };
        }

        match domain {
            ErrorDomain::Resource => FaultCategory::Resource,
            ErrorDomain::Stream => FaultCategory::Decoding,
            ErrorDomain::Library => FaultCategory::Configuration,
            ErrorDomain::Core | ErrorDomain::Unknown => FaultCategory::Unknown,
        }
    }

    /// Fault record for an error event; `None` for any other event.
    pub fn fault_from_event(&self, event: &RuntimeEvent) -> Option<FaultRecord> {
        let RuntimeEvent::Error {
            source,
            message,
            debug,
            domain,
        } = event
        else {
            return None;
        };
        let category = self.classify(source.as_deref(), message, debug.as_deref(), *domain);
        let mut fault = FaultRecord::new(category, message.clone());
        if let Some(source) = source {
            fault = fault.with_origin(source.clone());
        }
        if let Some(debug) = debug {
            fault = fault.with_detail(debug.clone());
        }
        Some(fault)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    pub auto_restart: bool,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub restart_delay: Duration,
}

impl From<&RecoveryConfig> for RecoveryPolicy {
    fn from(config: &RecoveryConfig) -> Self {
        Self {
            auto_restart: config.auto_restart,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
            restart_delay: config.restart_delay(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    Retry { attempt: u32 },
    /// The category's counter went past the configured maximum.
    Exhausted { attempts: u32 },
    NotRetryable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    Restarted,
    AlreadyInProgress,
}

/// Why [`RecoveryManager::run`] returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    EndOfStream,
    Cancelled,
}

pub type FaultObserver = Arc<dyn Fn(&FaultRecord) + Send + Sync>;

#[derive(Default)]
struct RecoveryState {
    retries: HashMap<FaultCategory, u32>,
    last_fault: Option<FaultRecord>,
}

/// Decides whether faults are retried and restarts the supervised graph.
///
/// One manager per graph; nothing here is process global.
pub struct RecoveryManager<R: MediaRuntime> {
    supervisor: Arc<GraphSupervisor<R>>,
    policy: RecoveryPolicy,
    state: Mutex<RecoveryState>,
    observer: Option<FaultObserver>,
    restarting: AtomicBool,
    health: HealthProbe,
}

impl<R: MediaRuntime> RecoveryManager<R> {
    pub fn new(supervisor: Arc<GraphSupervisor<R>>, config: &RecoveryConfig) -> Self {
        let health = HealthProbe::new(
            supervisor.activity().clone(),
            config.health_check_interval(),
            config.activity_timeout(),
        );
        Self {
            supervisor,
            policy: RecoveryPolicy::from(config),
            state: Mutex::new(RecoveryState::default()),
            observer: None,
            restarting: AtomicBool::new(false),
            health,
        }
    }

    pub fn with_observer(mut self, observer: FaultObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_health_callback(
        mut self,
        callback: impl Fn(HealthStatus) + Send + Sync + 'static,
    ) -> Self {
        self.health = self.health.with_callback(Arc::new(callback));
        self
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }

    pub fn health(&self) -> &HealthProbe {
        &self.health
    }

    pub fn retry_count(&self, category: FaultCategory) -> u32 {
        self.state
            .lock()
            .retries
            .get(&category)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_fault(&self) -> Option<FaultRecord> {
        self.state.lock().last_fault.clone()
    }

    /// Clears every retry counter.
    pub fn reset(&self) {
        self.state.lock().retries.clear();
    }

    /// Records the fault and decides whether to retry. An approved retry
    /// returns only after the retry delay has elapsed.
    pub async fn handle_fault(&self, fault: FaultRecord) -> RecoveryDecision {
        error!(
            category = %fault.category,
            origin = fault.origin.as_deref().unwrap_or("-"),
            detail = fault.detail.as_deref().unwrap_or("-"),
            "{}",
            fault.message
        );
        let category = fault.category;
        self.state.lock().last_fault = Some(fault.clone());
        if let Some(observer) = &self.observer {
            observer(&fault);
        }

        if !category.is_retryable() {
            warn!(%category, "fault category is not retryable");
            return RecoveryDecision::NotRetryable;
        }

        let attempt = {
            let mut state = self.state.lock();
            let counter = state.retries.entry(category).or_insert(0);
            *counter += 1;
            *counter
        };
        if attempt > self.policy.max_retries {
            error!(
                %category,
                max_retries = self.policy.max_retries,
                "retry limit reached"
            );
            return RecoveryDecision::Exhausted {
                attempts: self.policy.max_retries,
            };
        }

        info!(
            %category,
            attempt,
            max_retries = self.policy.max_retries,
            delay_ms = self.policy.retry_delay.as_millis() as u64,
            "retrying after fault"
        );
        tokio::time::sleep(self.policy.retry_delay).await;
        RecoveryDecision::Retry { attempt }
    }

    /// Stops the graph, waits the restart delay and starts it again.
    ///
    /// A failed start is logged and returned; while the graph stays stopped
    /// every health tick triggers another attempt.
    pub async fn attempt_restart(&self) -> Result<RestartOutcome> {
        if self
            .restarting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("restart already in progress");
            return Ok(RestartOutcome::AlreadyInProgress);
        }
        let _guard = RestartGuard(&self.restarting);

        info!("restarting processing graph");
        if let Err(e) = self.supervisor.stop() {
            warn!(error = %e, "stop before restart failed");
        }
        self.supervisor.wait_stopped().await;
        tokio::time::sleep(self.policy.restart_delay).await;

        match self.supervisor.start() {
            Ok(()) => {
                self.reset();
                info!("processing graph restarted");
                Ok(RestartOutcome::Restarted)
            }
            Err(e) => {
                error!(error = %e, "restart failed");
                Err(e)
            }
        }
    }

    /// Drives recovery until end of stream, cancellation or a terminal
    /// fault.
    pub async fn run(
        &self,
        mut signals: mpsc::UnboundedReceiver<GraphSignal>,
        token: CancellationToken,
    ) -> Result<RunOutcome> {
        let mut ticker = tokio::time::interval(self.health.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("recovery loop cancelled");
                    return Ok(RunOutcome::Cancelled);
                }
                signal = signals.recv() => match signal {
                    Some(GraphSignal::EndOfStream) => {
                        info!("end of stream reached");
                        return Ok(RunOutcome::EndOfStream);
                    }
                    Some(GraphSignal::Fault(fault)) => self.recover(fault).await?,
                    None => {
                        debug!("graph signal channel closed");
                        return Ok(RunOutcome::Cancelled);
                    }
                },
                _ = ticker.tick() => {
                    let running = self.supervisor.is_running();
                    let status = match self.health.check(running) {
                        Some(status) => status,
                        // A graph left stopped by a failed restart keeps
                        // drawing on the retry budget until it runs out.
                        None if !running => HealthStatus::NotRunning,
                        None => continue,
                    };
                    if !status.is_healthy() && self.policy.auto_restart {
                        let fault = FaultRecord::new(
                            FaultCategory::Input,
                            format!("no media activity, graph {status}"),
                        );
                        self.recover(fault).await?;
                    }
                }
            }
        }
    }

    async fn recover(&self, fault: FaultRecord) -> Result<()> {
        let category = fault.category;
        match self.handle_fault(fault.clone()).await {
            RecoveryDecision::Retry { attempt } if self.policy.auto_restart => {
                if let Err(e) = self.attempt_restart().await {
                    warn!(
                        %category,
                        attempt,
                        error = %e,
                        "graph left stopped, health probe will retry"
                    );
                }
                Ok(())
            }
            RecoveryDecision::Retry { .. } => {
                warn!(%category, "automatic restart disabled");
                Err(Error::terminal(fault))
            }
            RecoveryDecision::Exhausted { .. } | RecoveryDecision::NotRetryable => {
                Err(Error::terminal(fault))
            }
        }
    }
}

struct RestartGuard<'a>(&'a AtomicBool);

impl Drop for RestartGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn classifier() -> FaultClassifier {
        FaultClassifier::new(HashMap::from([
            ("http-source".to_string(), NodeRole::Source),
            ("video-decoder".to_string(), NodeRole::Decoder),
            ("video-encoder".to_string(), NodeRole::Encoder),
            ("sink".to_string(), NodeRole::Sink),
            ("video-queue".to_string(), NodeRole::Queue),
        ]))
    }

    #[rstest]
    #[case(Some("sink"), "Could not resolve host", ErrorDomain::Resource, FaultCategory::Network)]
    #[case(Some("http-source"), "Internal data stream error", ErrorDomain::Stream, FaultCategory::Input)]
    #[case(Some("video-decoder"), "No valid frames", ErrorDomain::Stream, FaultCategory::Decoding)]
    #[case(Some("video-encoder"), "Encode failed", ErrorDomain::Library, FaultCategory::Encoding)]
    #[case(Some("sink"), "Could not write", ErrorDomain::Resource, FaultCategory::Output)]
    #[case(Some("video-queue"), "Overflow", ErrorDomain::Core, FaultCategory::Resource)]
    #[case(None, "Out of memory", ErrorDomain::Resource, FaultCategory::Resource)]
    #[case(Some("unknown"), "Missing plugin", ErrorDomain::Library, FaultCategory::Configuration)]
    #[case(None, "Weird", ErrorDomain::Core, FaultCategory::Unknown)]
    fn test_classification(
        #[case] origin: Option<&str>,
        #[case] message: &str,
        #[case] domain: ErrorDomain,
        #[case] expected: FaultCategory,
    ) {
        assert_eq!(classifier().classify(origin, message, None, domain), expected);
    }

    #[test]
    fn test_network_wording_in_debug_text() {
        let category = classifier().classify(
            Some("video-decoder"),
            "Stream error",
            Some("socket closed by peer"),
            ErrorDomain::Stream,
        );
        assert_eq!(category, FaultCategory::Network);
    }

    #[test]
    fn test_fault_from_event() {
        let event = RuntimeEvent::Error {
            source: Some("sink".into()),
            message: "Could not write".into(),
            debug: Some("udpsink.c:42".into()),
            domain: ErrorDomain::Resource,
        };
        let fault = classifier().fault_from_event(&event).unwrap();
        assert_eq!(fault.category, FaultCategory::Output);
        assert_eq!(fault.origin.as_deref(), Some("sink"));
        assert_eq!(fault.detail.as_deref(), Some("udpsink.c:42"));
        assert_eq!(fault.to_string(), "[output] sink: Could not write");
        assert!(classifier().fault_from_event(&RuntimeEvent::EndOfStream).is_none());
    }

    #[test]
    fn test_retryable_categories() {
        assert!(FaultCategory::Network.is_retryable());
        assert!(FaultCategory::Input.is_retryable());
        assert!(FaultCategory::Resource.is_retryable());
        assert!(!FaultCategory::Configuration.is_retryable());
        assert!(!FaultCategory::Unknown.is_retryable());
        assert!(!FaultCategory::Decoding.is_retryable());
    }
}
