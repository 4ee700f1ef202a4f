use crate::error::ManifestError;
use crate::manifest::MasterManifest;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_USER_AGENT: &str = concat!("hlsrelay/", env!("CARGO_PKG_VERSION"));

/// Anything that can turn a manifest address into a parsed master manifest.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<MasterManifest, ManifestError>;
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Refuse addresses whose path does not end in `.m3u8` / `.m3u`.
    pub require_playlist_suffix: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            require_playlist_suffix: false,
        }
    }
}

/// Fetches master manifests over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpManifestResolver {
    client: reqwest::Client,
    config: ResolverConfig,
}

impl HttpManifestResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, ManifestError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ManifestError::Client {
                reason: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: reqwest::Client, config: ResolverConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, ManifestError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ManifestError::fetch(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ManifestError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ManifestError::fetch(url.as_str(), e))
    }
}

#[async_trait]
impl ManifestSource for HttpManifestResolver {
    async fn resolve(&self, url: &str) -> Result<MasterManifest, ManifestError> {
        let parsed = validate_manifest_url(url, self.config.require_playlist_suffix)?;
        debug!(url = %parsed, "fetching master manifest");
        let body = self.fetch_text(&parsed).await?;
        let manifest = MasterManifest::parse(&body, &parsed)?;
        info!(
            url = %parsed,
            variants = manifest.len(),
            "resolved master manifest"
        );
        Ok(manifest)
    }
}

/// Checks that `input` is an http(s) address, and optionally that it names a
/// playlist file.
pub fn validate_manifest_url(input: &str, require_suffix: bool) -> Result<Url, ManifestError> {
    if input.trim().is_empty() {
        return Err(ManifestError::invalid_url(input, "address is empty"));
    }
    let url = Url::parse(input).map_err(|e| ManifestError::invalid_url(input, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ManifestError::invalid_url(
                input,
                format!("unsupported scheme `{other}`, expected http or https"),
            ));
        }
    }
    if require_suffix && !has_playlist_suffix(&url) {
        return Err(ManifestError::invalid_url(
            input,
            "path must end in .m3u8 or .m3u",
        ));
    }
    Ok(url)
}

pub fn has_playlist_suffix(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    path.ends_with(".m3u8") || path.ends_with(".m3u")
}
