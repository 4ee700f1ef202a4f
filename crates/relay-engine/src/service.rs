//! Top-level relay: validate, build, supervise, recover.

use crate::config::RelayConfig;
use crate::error::Result;
use crate::recovery::{RecoveryManager, RunOutcome};
use crate::runtime::MediaRuntime;
use crate::strategy::{GraphFactory, ProcessingGraph};
use crate::supervisor::{GraphSupervisor, SupervisorConfig};
use hls_manifest::{HttpManifestResolver, ManifestSource, ResolverConfig};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct RelayService<R: MediaRuntime> {
    config: RelayConfig,
    runtime: Arc<R>,
    resolver: Option<Arc<dyn ManifestSource>>,
    token: CancellationToken,
}

impl<R: MediaRuntime> RelayService<R> {
    pub fn new(config: RelayConfig, runtime: Arc<R>, token: CancellationToken) -> Self {
        Self {
            config,
            runtime,
            resolver: None,
            token,
        }
    }

    /// Overrides the HTTP manifest resolver built from the input section.
    pub fn with_resolver(mut self, resolver: Arc<dyn ManifestSource>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    fn resolver(&self) -> Result<Arc<dyn ManifestSource>> {
        if let Some(resolver) = &self.resolver {
            return Ok(resolver.clone());
        }
        let input = &self.config.input;
        let resolver = HttpManifestResolver::new(ResolverConfig {
            timeout: input.timeout(),
            user_agent: input.user_agent.clone(),
            require_playlist_suffix: true,
        })?;
        Ok(Arc::new(resolver))
    }

    /// Validates the configuration and builds the graph without starting it.
    pub async fn build(&self) -> Result<ProcessingGraph<R>> {
        self.config.validate()?;
        GraphFactory::new(self.runtime.clone())
            .with_resolver(self.resolver()?)
            .build(&self.config)
            .await
    }

    /// Runs until end of stream, cancellation or a terminal fault.
    ///
    /// Construction errors are returned before anything starts.
    pub async fn run(&self) -> Result<RunOutcome> {
        let graph = self.build().await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Arc::new(
            GraphSupervisor::new(
                self.runtime.clone(),
                SupervisorConfig::from(&self.config.pipeline),
                graph.activity().clone(),
                graph.fault_classifier(),
                self.token.clone(),
            )
            .with_signals(tx),
        );
        let recovery = RecoveryManager::new(supervisor.clone(), &self.config.recovery);

        supervisor.start()?;
        info!(strategy = %graph.kind(), source = %graph.source_address(), "relay running");

        let outcome = recovery.run(rx, self.token.clone()).await;

        if let Err(e) = supervisor.stop() {
            warn!(error = %e, "failed to stop graph");
        }
        supervisor.wait_stopped().await;
        for (owner, stats) in graph.link_stats() {
            info!(%owner, %stats, "dynamic link summary");
        }
        drop(graph);

        outcome
    }
}
