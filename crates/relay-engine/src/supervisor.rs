//! Start/stop lifecycle of a processing graph and its background workers.

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::health::ActivityMonitor;
use crate::recovery::{FaultClassifier, FaultRecord};
use crate::runtime::{MediaRuntime, RuntimeEvent, RuntimeState};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// What the event loop forwards to recovery.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphSignal {
    Fault(FaultRecord),
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Bounded wait per event poll; also the cancellation latency.
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl From<&PipelineConfig> for SupervisorConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
        }
    }
}

enum RunState {
    Stopped,
    Running { token: CancellationToken },
}

/// Owns the Stopped/Running flag of one graph.
///
/// `start` spawns an event loop on the blocking pool and a dispatch driver
/// task; `stop` cancels both. The flag's lock is only held across the
/// transition itself, never across linking or event handling.
pub struct GraphSupervisor<R: MediaRuntime> {
    runtime: Arc<R>,
    config: SupervisorConfig,
    activity: ActivityMonitor,
    classifier: FaultClassifier,
    parent: CancellationToken,
    signals: Option<mpsc::UnboundedSender<GraphSignal>>,
    state: RwLock<RunState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<R: MediaRuntime> GraphSupervisor<R> {
    pub fn new(
        runtime: Arc<R>,
        config: SupervisorConfig,
        activity: ActivityMonitor,
        classifier: FaultClassifier,
        parent: CancellationToken,
    ) -> Self {
        Self {
            runtime,
            config,
            activity,
            classifier,
            parent,
            signals: None,
            state: RwLock::new(RunState::Stopped),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_signals(mut self, signals: mpsc::UnboundedSender<GraphSignal>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn activity(&self) -> &ActivityMonitor {
        &self.activity
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.read(), RunState::Running { .. })
    }

    /// Requests the running state and spawns the workers. Returns as soon as
    /// the transition is accepted; it does not wait for media.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.write();
        if matches!(*state, RunState::Running { .. }) {
            return Err(Error::AlreadyRunning);
        }

        self.runtime
            .set_state(RuntimeState::Playing)
            .map_err(Error::StateChange)?;
        self.activity.touch();

        let token = self.parent.child_token();
        let mut workers = self.workers.lock();
        workers.retain(|handle| !handle.is_finished());
        workers.push(self.spawn_event_loop(token.clone()));
        workers.push(self.spawn_dispatch_driver(token.clone()));

        *state = RunState::Running { token };
        info!(poll_interval_ms = self.config.poll_interval.as_millis() as u64, "graph started");
        Ok(())
    }

    /// Quiesces the graph and signals the workers to exit. A no-op when
    /// already stopped.
    pub fn stop(&self) -> Result<()> {
        let mut state = self.state.write();
        let RunState::Running { token } = std::mem::replace(&mut *state, RunState::Stopped) else {
            debug!("graph already stopped");
            return Ok(());
        };
        token.cancel();
        self.runtime
            .set_state(RuntimeState::Null)
            .map_err(Error::StateChange)?;
        info!("graph stopped");
        Ok(())
    }

    /// Waits for the workers of previous runs to exit. Workers notice
    /// cancellation within one poll interval.
    pub async fn wait_stopped(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "graph worker ended abnormally");
            }
        }
    }

    fn spawn_event_loop(&self, token: CancellationToken) -> JoinHandle<()> {
        let runtime = self.runtime.clone();
        let classifier = self.classifier.clone();
        let signals = self.signals.clone();
        let poll = self.config.poll_interval;
        tokio::task::spawn_blocking(move || {
            event_loop(runtime.as_ref(), &classifier, signals.as_ref(), &token, poll)
        })
    }

    fn spawn_dispatch_driver(&self, token: CancellationToken) -> JoinHandle<()> {
        let runtime = self.runtime.clone();
        let period = self.config.poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => runtime.iterate_dispatch(),
                }
            }
            trace!("dispatch driver exited");
        })
    }
}

impl<R: MediaRuntime> Drop for GraphSupervisor<R> {
    fn drop(&mut self) {
        if let RunState::Running { token } = &*self.state.read() {
            token.cancel();
        }
    }
}

fn event_loop<R: MediaRuntime>(
    runtime: &R,
    classifier: &FaultClassifier,
    signals: Option<&mpsc::UnboundedSender<GraphSignal>>,
    token: &CancellationToken,
    poll: Duration,
) {
    debug!("event loop started");
    while !token.is_cancelled() {
        let Some(event) = runtime.poll_event(poll) else {
            continue;
        };
        if token.is_cancelled() {
            trace!(?event, "dropping event after cancellation");
            break;
        }

        let signal = match &event {
            RuntimeEvent::EndOfStream => {
                info!("end of stream");
                Some(GraphSignal::EndOfStream)
            }
            RuntimeEvent::Error {
                source, message, ..
            } => {
                error!(source = source.as_deref().unwrap_or("-"), "graph error: {message}");
                classifier.fault_from_event(&event).map(GraphSignal::Fault)
            }
            RuntimeEvent::Warning {
                source, message, ..
            } => {
                warn!(source = source.as_deref().unwrap_or("-"), "graph warning: {message}");
                None
            }
            RuntimeEvent::Info { source, message } => {
                info!(source = source.as_deref().unwrap_or("-"), "graph info: {message}");
                None
            }
            RuntimeEvent::StateChanged { old, new, .. } => {
                debug!(%old, %new, "graph state changed");
                None
            }
        };

        if let (Some(signal), Some(signals)) = (signal, signals) {
            if signals.send(signal).is_err() {
                debug!("signal receiver dropped");
            }
        }
        if event.is_terminal() {
            break;
        }
    }
    debug!("event loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ErrorDomain, MemoryRuntime};

    fn supervisor(runtime: Arc<MemoryRuntime>) -> GraphSupervisor<MemoryRuntime> {
        GraphSupervisor::new(
            runtime,
            SupervisorConfig {
                poll_interval: Duration::from_millis(10),
            },
            ActivityMonitor::new(),
            FaultClassifier::default(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let runtime = Arc::new(MemoryRuntime::new());
        let supervisor = supervisor(runtime.clone());

        supervisor.start().unwrap();
        assert!(matches!(supervisor.start(), Err(Error::AlreadyRunning)));
        assert!(supervisor.is_running());
        assert_eq!(runtime.state_history(), vec![RuntimeState::Playing]);

        supervisor.stop().unwrap();
        supervisor.wait_stopped().await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let runtime = Arc::new(MemoryRuntime::new());
        let supervisor = supervisor(runtime.clone());

        supervisor.stop().unwrap();
        supervisor.start().unwrap();
        supervisor.stop().unwrap();
        supervisor.stop().unwrap();
        supervisor.wait_stopped().await;

        assert!(!supervisor.is_running());
        assert_eq!(
            runtime.state_history(),
            vec![RuntimeState::Playing, RuntimeState::Null]
        );
    }

    #[tokio::test]
    async fn test_failed_transition_stays_stopped() {
        let runtime = Arc::new(MemoryRuntime::new());
        runtime.fail_state(RuntimeState::Playing, true);
        let supervisor = supervisor(runtime);

        assert!(matches!(supervisor.start(), Err(Error::StateChange(_))));
        assert!(!supervisor.is_running());
    }

    #[tokio::test]
    async fn test_error_event_is_forwarded() {
        let runtime = Arc::new(MemoryRuntime::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor = supervisor(runtime.clone()).with_signals(tx);

        supervisor.start().unwrap();
        runtime.push_event(RuntimeEvent::warning("video-queue", "slow consumer"));
        runtime.push_event(RuntimeEvent::error(
            "http-source",
            "Connection refused",
            ErrorDomain::Resource,
        ));

        match rx.recv().await {
            Some(GraphSignal::Fault(fault)) => {
                assert_eq!(fault.category, crate::recovery::FaultCategory::Network);
                assert_eq!(fault.origin.as_deref(), Some("http-source"));
            }
            other => panic!("unexpected signal: {other:?}"),
        }

        supervisor.stop().unwrap();
        supervisor.wait_stopped().await;
    }

    #[tokio::test]
    async fn test_dispatch_driver_runs_while_started() {
        let runtime = Arc::new(MemoryRuntime::new());
        let supervisor = supervisor(runtime.clone());

        supervisor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        supervisor.stop().unwrap();
        supervisor.wait_stopped().await;

        let iterations = runtime.dispatch_iterations();
        assert!(iterations > 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runtime.dispatch_iterations(), iterations);
    }
}
