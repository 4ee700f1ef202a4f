use async_trait::async_trait;
use hls_manifest::{ManifestError, ManifestSource, MasterManifest};
use relay_engine::runtime::{ErrorDomain, MemoryRuntime, RuntimeEvent, RuntimeState};
use relay_engine::{Error, FaultCategory, RelayConfig, RelayService, RunOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

struct OneVariant;

#[async_trait]
impl ManifestSource for OneVariant {
    async fn resolve(&self, url: &str) -> Result<MasterManifest, ManifestError> {
        let base = Url::parse(url).map_err(|e| ManifestError::invalid_url(url, e.to_string()))?;
        MasterManifest::parse(
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360\nlow/index.m3u8\n",
            &base,
        )
    }
}

fn config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.input.url = "https://cdn.example.com/live/master.m3u8".into();
    config.pipeline.poll_interval_ms = 5;
    config.recovery.retry_delay_ms = 1;
    config.recovery.restart_delay_ms = 1;
    config
}

async fn wait_for_state(runtime: &MemoryRuntime, state: RuntimeState) {
    for _ in 0..400 {
        if runtime.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("runtime never reached {state}");
}

#[tokio::test]
async fn test_runs_until_end_of_stream() {
    let runtime = Arc::new(MemoryRuntime::new());
    let service = RelayService::new(config(), runtime.clone(), CancellationToken::new());

    let feeder = {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            wait_for_state(&runtime, RuntimeState::Playing).await;
            runtime.push_event(RuntimeEvent::EndOfStream);
        })
    };

    let outcome = tokio::time::timeout(Duration::from_secs(5), service.run())
        .await
        .expect("service should finish");
    feeder.await.unwrap();

    assert_eq!(outcome.unwrap(), RunOutcome::EndOfStream);
    assert_eq!(runtime.state(), RuntimeState::Null);
    assert_eq!(runtime.handler_count(), 0);
}

#[tokio::test]
async fn test_cancellation_stops_the_graph() {
    let runtime = Arc::new(MemoryRuntime::new());
    let token = CancellationToken::new();
    let service = RelayService::new(config(), runtime.clone(), token.clone());

    let canceller = {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            wait_for_state(&runtime, RuntimeState::Playing).await;
            token.cancel();
        })
    };

    let outcome = tokio::time::timeout(Duration::from_secs(5), service.run())
        .await
        .expect("service should finish");
    canceller.await.unwrap();

    assert_eq!(outcome.unwrap(), RunOutcome::Cancelled);
    assert_eq!(runtime.state(), RuntimeState::Null);
}

#[tokio::test]
async fn test_non_retryable_fault_is_terminal() {
    let runtime = Arc::new(MemoryRuntime::new());
    let service = RelayService::new(config(), runtime.clone(), CancellationToken::new());

    let feeder = {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            wait_for_state(&runtime, RuntimeState::Playing).await;
            runtime.push_event(RuntimeEvent::error(
                "video-encoder",
                "Encode failed",
                ErrorDomain::Library,
            ));
        })
    };

    let result = tokio::time::timeout(Duration::from_secs(5), service.run())
        .await
        .expect("service should finish");
    feeder.await.unwrap();

    match result {
        Err(Error::Terminal(fault)) => {
            assert_eq!(fault.category, FaultCategory::Encoding);
            assert_eq!(fault.origin.as_deref(), Some("video-encoder"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(runtime.state(), RuntimeState::Null);
    assert_eq!(runtime.state_history().len(), 2);
}

#[tokio::test]
async fn test_invalid_config_fails_before_building() {
    let runtime = Arc::new(MemoryRuntime::new());
    let mut config = config();
    config.input.url = "https://cdn.example.com/live/stream.mp4".into();
    let service = RelayService::new(config, runtime.clone(), CancellationToken::new());

    let result = service.run().await;
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert!(runtime.nodes().is_empty());
    assert!(runtime.state_history().is_empty());
}

#[tokio::test]
async fn test_build_with_injected_resolver() {
    let runtime = Arc::new(MemoryRuntime::new());
    let mut config = config();
    config.input.strategy = Some("full-auto".into());
    config.input.resolve_manifest = true;
    let service = RelayService::new(config, runtime, CancellationToken::new())
        .with_resolver(Arc::new(OneVariant));

    let graph = service.build().await.unwrap();
    assert_eq!(
        graph.source_address(),
        "https://cdn.example.com/live/low/index.m3u8"
    );
    assert_eq!(graph.output_resolution(), Some((640, 360)));
}
