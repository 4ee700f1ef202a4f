//! Relay configuration.
//!
//! Every field has a default, so a partial TOML file (or none at all) is a
//! valid configuration. `validate` performs the checks that do not require
//! touching the network.

use crate::error::{Error, Result};
use crate::output::{AudioCodec, ContainerFormat, OutputTarget, VideoCodec, validate_bitrate};
use crate::overlay::OverlayConfig;
use hls_manifest::{SelectionPolicy, validate_manifest_url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BUFFER_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_CONNECTION_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("hlsrelay/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub overlay: OverlayConfig,
    pub pipeline: PipelineConfig,
    pub recovery: RecoveryConfig,
}

impl RelayConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(format!("failed to parse config: {e}")))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {e}")))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.input.validate().map_err(Error::config)?;
        self.output.validate().map_err(Error::config)?;
        self.overlay.validate().map_err(Error::config)?;
        self.pipeline.validate().map_err(Error::config)?;
        self.recovery.validate().map_err(Error::config)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Master manifest or media playlist address.
    pub url: String,
    /// `manual` (default), `semi-auto` or `full-auto`, or their runtime
    /// factory names.
    pub strategy: Option<String>,
    pub buffer_size: u64,
    pub connection_retries: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Resolve the master manifest before playing and hand the player the
    /// selected variant instead of the master address.
    pub resolve_manifest: bool,
    pub variant_policy: SelectionPolicy,
    /// `WIDTHxHEIGHT` to look up before falling back to `variant_policy`.
    pub variant_resolution: Option<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            strategy: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connection_retries: DEFAULT_CONNECTION_RETRIES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            resolve_manifest: false,
            variant_policy: SelectionPolicy::default(),
            variant_resolution: None,
        }
    }
}

impl InputConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn exact_resolution(&self) -> Option<(u32, u32)> {
        self.variant_resolution.as_deref().and_then(parse_resolution)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        validate_manifest_url(&self.url, true).map_err(|e| e.to_string())?;
        if self.timeout_secs == 0 {
            return Err("input timeout_secs must be positive".to_string());
        }
        if let Some(raw) = &self.variant_resolution {
            if parse_resolution(raw).is_none() {
                return Err(format!("variant_resolution `{raw}` is not WIDTHxHEIGHT"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Video bitrate in bits per second.
    pub bitrate: u64,
    pub video_codec: VideoCodec,
    pub audio_codec: AudioCodec,
    pub format: ContainerFormat,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub target: OutputTarget,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bitrate: 2_000_000,
            video_codec: VideoCodec::default(),
            audio_codec: AudioCodec::default(),
            format: ContainerFormat::default(),
            width: None,
            height: None,
            target: OutputTarget::default(),
        }
    }
}

impl OutputConfig {
    /// Output resolution, only when both dimensions are set.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    pub fn container(&self) -> ContainerFormat {
        self.target.container_for(self.format)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        self.target.validate()?;
        validate_bitrate(self.bitrate)?;
        match (self.width, self.height) {
            (Some(0), _) | (_, Some(0)) => Err("output width/height must be positive".into()),
            (Some(_), None) | (None, Some(_)) => {
                Err("output width and height must be set together".into())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub buffer_time_ms: u64,
    /// How often the event loop and dispatch driver wake up.
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "hlsrelay".to_string(),
            buffer_time_ms: 200,
            poll_interval_ms: 100,
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.poll_interval_ms == 0 {
            return Err("pipeline poll_interval_ms must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub auto_restart: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub restart_delay_ms: u64,
    pub health_check_interval_secs: u64,
    /// No buffer leaving the muxer for this long marks the graph unhealthy.
    pub activity_timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            auto_restart: true,
            max_retries: 3,
            retry_delay_ms: 5_000,
            restart_delay_ms: 2_000,
            health_check_interval_secs: 10,
            activity_timeout_secs: 30,
        }
    }
}

impl RecoveryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.activity_timeout_secs)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.health_check_interval_secs == 0 {
            return Err("recovery health_check_interval_secs must be positive".to_string());
        }
        if self.activity_timeout_secs < self.health_check_interval_secs {
            return Err(
                "recovery activity_timeout_secs must be at least the health check interval"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Parses `1280x720`.
pub fn parse_resolution(raw: &str) -> Option<(u32, u32)> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::Anchor;

    fn valid() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.input.url = "https://live.example.com/app/master.m3u8".into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.input.buffer_size, 1024 * 1024);
        assert_eq!(config.input.connection_retries, 3);
        assert_eq!(config.input.timeout_secs, 30);
        assert_eq!(config.input.strategy, None);
        assert_eq!(config.output.target, OutputTarget::default());
        assert_eq!(config.output.bitrate, 2_000_000);
        assert_eq!(config.output.format, ContainerFormat::MpegTs);
        assert!(config.overlay.enabled);
        assert_eq!(config.overlay.text, "Live Stream");
        assert_eq!(config.pipeline.buffer_time_ms, 200);
        assert_eq!(config.recovery.max_retries, 3);
        assert_eq!(config.recovery.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.recovery.health_check_interval(), Duration::from_secs(10));
        assert_eq!(config.recovery.activity_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml() {
        let config = RelayConfig::from_toml(
            r#"
            [input]
            url = "https://live.example.com/app/master.m3u8"
            strategy = "full-auto"
            resolve_manifest = true
            variant_policy = "lowest"

            [output]
            bitrate = 3000000
            video_codec = "vp9"
            format = "mkv"

            [output.target]
            type = "multicast"
            group = "239.10.0.1"
            port = 5004

            [overlay]
            anchor = "bottom-right"
            "#,
        )
        .unwrap();

        assert_eq!(config.input.strategy.as_deref(), Some("full-auto"));
        assert_eq!(config.input.variant_policy, SelectionPolicy::LowestResolution);
        assert_eq!(config.output.video_codec, VideoCodec::Vp9);
        assert_eq!(config.output.format, ContainerFormat::Mkv);
        assert_eq!(
            config.output.target,
            OutputTarget::Multicast {
                group: "239.10.0.1".into(),
                port: 5004,
                ttl: 1,
                interface: None,
            }
        );
        assert_eq!(config.overlay.anchor, Anchor::BottomRight);
        assert_eq!(config.overlay.font_size, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        assert!(valid().validate().is_ok());

        let mut c = valid();
        c.input.url = "rtsp://camera.local/stream".into();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.input.url = "https://live.example.com/app/manifest.mpd".into();
        assert!(c.validate().is_err());

        let mut c = valid();
        c.output.bitrate = 10;
        assert!(c.validate().is_err());

        let mut c = valid();
        c.output.width = Some(1280);
        assert!(c.validate().is_err());

        let mut c = valid();
        c.output.target = OutputTarget::Multicast {
            group: "10.0.0.1".into(),
            port: 5000,
            ttl: 1,
            interface: None,
        };
        assert!(c.validate().is_err());

        let mut c = valid();
        c.input.variant_resolution = Some("hd".into());
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("relay.toml");

        let mut config = valid();
        config.output.width = Some(1280);
        config.output.height = Some(720);
        config.save(&path).unwrap();

        let loaded = RelayConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RelayConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, RelayConfig::default());
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1280x720"), Some((1280, 720)));
        assert_eq!(parse_resolution(" 640X360 "), Some((640, 360)));
        assert_eq!(parse_resolution("0x720"), None);
        assert_eq!(parse_resolution("wide"), None);
    }
}
