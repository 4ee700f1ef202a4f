use anyhow::{Context, Result, bail};
use hls_manifest::{
    HttpManifestResolver, ManifestSource, MasterManifest, ResolverConfig, SelectionPolicy,
};
use relay_engine::config::parse_resolution;
use relay_engine::runtime::MemoryRuntime;
use relay_engine::{RelayConfig, RelayService, RunOutcome};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Loads the config file and applies command-line overrides.
pub fn load_config(
    path: &Path,
    url: Option<String>,
    strategy: Option<String>,
) -> Result<RelayConfig> {
    let mut config = RelayConfig::load(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    if let Some(url) = url {
        config.input.url = url;
    }
    if strategy.is_some() {
        config.input.strategy = strategy;
    }
    Ok(config)
}

pub async fn dry_run(config: RelayConfig) -> Result<()> {
    let runtime = Arc::new(MemoryRuntime::new());
    let service = RelayService::new(config, runtime, CancellationToken::new());
    let graph = service.build().await?;

    println!("strategy: {}", graph.kind());
    println!("source:   {}", graph.source_address());
    if let Some(variant) = graph.selected_variant() {
        println!("variant:  {variant}");
    }
    if let Some((width, height)) = graph.output_resolution() {
        println!("output:   {width}x{height}");
    }
    print!("{}", graph.plan());
    Ok(())
}

#[cfg(feature = "gstreamer")]
pub async fn relay(config: RelayConfig, token: CancellationToken) -> Result<RunOutcome> {
    let runtime = relay_engine::runtime::GstRuntime::new(&config.pipeline.name)
        .context("initialising GStreamer")?;
    let service = RelayService::new(config, Arc::new(runtime), token);
    Ok(service.run().await?)
}

#[cfg(not(feature = "gstreamer"))]
pub async fn relay(config: RelayConfig, _token: CancellationToken) -> Result<RunOutcome> {
    config.validate()?;
    bail!("this build has no media runtime; rebuild with `--features gstreamer` or use --dry-run")
}

pub async fn variants(url: &str, resolutions: &[String], json: bool, timeout: u64) -> Result<()> {
    let resolver = HttpManifestResolver::new(ResolverConfig {
        timeout: Duration::from_secs(timeout),
        ..ResolverConfig::default()
    })?;
    let manifest = resolver.resolve(url).await?;
    info!(url, variants = manifest.len(), "fetched master playlist");

    let lookups = resolutions
        .iter()
        .map(|raw| {
            parse_resolution(raw)
                .map(|res| (raw.as_str(), res))
                .with_context(|| format!("`{raw}` is not WIDTHxHEIGHT"))
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&variants_json(&manifest, &lookups))?);
    } else {
        print_variants(&manifest, &lookups);
    }
    Ok(())
}

fn variants_json(manifest: &MasterManifest, lookups: &[(&str, (u32, u32))]) -> serde_json::Value {
    let picks: serde_json::Map<_, _> = SelectionPolicy::ALL
        .into_iter()
        .map(|policy| {
            (
                policy.to_string(),
                serde_json::to_value(manifest.select(policy)).unwrap_or_default(),
            )
        })
        .collect();
    let exact: serde_json::Map<_, _> = lookups
        .iter()
        .map(|(raw, (w, h))| {
            (
                raw.to_string(),
                serde_json::to_value(manifest.by_exact_resolution(*w, *h)).unwrap_or_default(),
            )
        })
        .collect();
    serde_json::json!({
        "url": manifest.url().as_str(),
        "variants": manifest.by_quality(),
        "policies": picks,
        "exact": exact,
    })
}

fn print_variants(manifest: &MasterManifest, lookups: &[(&str, (u32, u32))]) {
    println!("{:>11}  {:>12}  {:<28}  URI", "RESOLUTION", "BANDWIDTH", "CODECS");
    for variant in manifest.by_quality() {
        let resolution = variant
            .resolution()
            .map(|(w, h)| format!("{w}x{h}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>11}  {:>12}  {:<28}  {}",
            resolution,
            variant.bandwidth,
            variant.codecs.as_deref().unwrap_or("-"),
            variant.uri
        );
    }

    println!();
    for policy in SelectionPolicy::ALL {
        let name = policy.to_string();
        match manifest.select(policy) {
            Some(variant) => println!("{name:>20}: {variant}"),
            None => println!("{name:>20}: -"),
        }
    }
    for (raw, (width, height)) in lookups {
        match manifest.by_exact_resolution(*width, *height) {
            Some(variant) => println!("{raw:>20}: {variant}"),
            None => println!("{raw:>20}: no exact match"),
        }
    }
}

pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    RelayConfig::default()
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("wrote default configuration to {}", path.display());
    Ok(())
}

pub fn describe(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::EndOfStream => "stream ended",
        RunOutcome::Cancelled => "relay cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay/hlsrelay.toml");

        init_config(&path, false).unwrap();
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();

        let loaded = RelayConfig::load(&path).unwrap();
        assert_eq!(loaded, RelayConfig::default());
    }

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hlsrelay.toml");
        std::fs::write(&path, "[input]\nurl = \"https://a.example.com/x.m3u8\"\n").unwrap();

        let config = load_config(&path, None, Some("semi-auto".into())).unwrap();
        assert_eq!(config.input.url, "https://a.example.com/x.m3u8");
        assert_eq!(config.input.strategy.as_deref(), Some("semi-auto"));

        let config = load_config(&path, Some("https://b.example.com/y.m3u8".into()), None).unwrap();
        assert_eq!(config.input.url, "https://b.example.com/y.m3u8");
        assert_eq!(config.input.strategy, None);
    }

    #[tokio::test]
    async fn test_dry_run_builds_default_graph() {
        let mut config = RelayConfig::default();
        config.input.url = "https://cdn.example.com/live/master.m3u8".into();
        dry_run(config).await.unwrap();
    }
}
