//! Encoder, multiplexer and sink choices for the re-emitted stream.

use crate::blueprint::NodeBlueprint;
use crate::runtime::NodeRole;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use strum::{Display, EnumString};

pub const MIN_BITRATE: u64 = 100_000;
pub const MAX_BITRATE: u64 = 50_000_000;
pub const AUDIO_BITRATE: u64 = 128_000;
pub const UDP_BUFFER_SIZE: u64 = 64 * 1024;
/// Latency the transport-stream muxer is allowed to add, in nanoseconds.
pub const MPEGTS_MUX_LATENCY_NS: u64 = 400_000_000;
pub const KEYFRAME_INTERVAL: u64 = 30;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
    Vp8,
    Vp9,
}

impl VideoCodec {
    pub fn encoder(&self, name: &str, bitrate: u64) -> NodeBlueprint {
        let kbps = bitrate / 1000;
        match self {
            Self::H264 => NodeBlueprint::new(NodeRole::Encoder, "x264enc", name)
                .with("bitrate", kbps)
                .with("tune", "zerolatency")
                .with("speed-preset", "ultrafast")
                .with("key-int-max", KEYFRAME_INTERVAL)
                .with("bframes", 0u64),
            Self::H265 => NodeBlueprint::new(NodeRole::Encoder, "x265enc", name)
                .with("bitrate", kbps)
                .with("tune", "zerolatency")
                .with("speed-preset", "ultrafast")
                .with("key-int-max", KEYFRAME_INTERVAL),
            Self::Vp8 => NodeBlueprint::new(NodeRole::Encoder, "vp8enc", name)
                .with("target-bitrate", bitrate)
                .with("deadline", 1u64)
                .with("cpu-used", 16i64)
                .with("keyframe-max-dist", KEYFRAME_INTERVAL),
            Self::Vp9 => NodeBlueprint::new(NodeRole::Encoder, "vp9enc", name)
                .with("target-bitrate", bitrate)
                .with("deadline", 1u64)
                .with("cpu-used", 8i64)
                .with("keyframe-max-dist", KEYFRAME_INTERVAL),
        }
    }

    /// Caps pinned right after the encoder so the muxer sees a stable format.
    pub fn encoded_caps(&self) -> Option<&'static str> {
        match self {
            Self::H264 => Some("video/x-h264,stream-format=avc,alignment=au"),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Aac,
    Mp3,
    Opus,
    Vorbis,
}

impl AudioCodec {
    pub fn encoder(&self, name: &str) -> NodeBlueprint {
        match self {
            Self::Aac => NodeBlueprint::new(NodeRole::Encoder, "avenc_aac", name)
                .with("bitrate", AUDIO_BITRATE)
                .with("compliance", -2i64),
            Self::Mp3 => NodeBlueprint::new(NodeRole::Encoder, "lamemp3enc", name)
                .with("bitrate", AUDIO_BITRATE / 1000),
            Self::Opus => NodeBlueprint::new(NodeRole::Encoder, "opusenc", name)
                .with("bitrate", AUDIO_BITRATE),
            Self::Vorbis => NodeBlueprint::new(NodeRole::Encoder, "vorbisenc", name)
                .with("bitrate", AUDIO_BITRATE),
        }
    }

    pub fn encoded_caps(&self) -> Option<&'static str> {
        match self {
            Self::Aac => Some("audio/mpeg,mpegversion=4,stream-format=raw"),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    MpegTs,
    Mp4,
    Webm,
    Mkv,
    Flv,
}

impl ContainerFormat {
    pub fn muxer(&self, name: &str) -> NodeBlueprint {
        match self {
            Self::MpegTs => NodeBlueprint::new(NodeRole::Multiplexer, "mpegtsmux", name)
                .with("alignment", 7i64)
                .with("latency", MPEGTS_MUX_LATENCY_NS)
                .with("min-upstream-latency", 0u64)
                .with("prog-map", "program_map,video_0=0,audio_0=0"),
            Self::Mp4 => NodeBlueprint::new(NodeRole::Multiplexer, "mp4mux", name)
                .with("fragment-duration", 1000u64),
            Self::Webm => {
                NodeBlueprint::new(NodeRole::Multiplexer, "webmmux", name).with("streamable", true)
            }
            Self::Mkv => NodeBlueprint::new(NodeRole::Multiplexer, "matroskamux", name)
                .with("streamable", true),
            Self::Flv => {
                NodeBlueprint::new(NodeRole::Multiplexer, "flvmux", name).with("streamable", true)
            }
        }
    }
}

/// Where the multiplexed stream goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputTarget {
    Udp {
        host: String,
        port: u16,
    },
    Multicast {
        group: String,
        port: u16,
        #[serde(default = "default_multicast_ttl")]
        ttl: u32,
        #[serde(default)]
        interface: Option<String>,
    },
    Rtmp {
        location: String,
    },
}

fn default_multicast_ttl() -> u32 {
    1
}

impl Default for OutputTarget {
    fn default() -> Self {
        Self::Udp {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl OutputTarget {
    pub fn sink(&self, name: &str) -> NodeBlueprint {
        match self {
            Self::Udp { host, port } => NodeBlueprint::new(NodeRole::Sink, "udpsink", name)
                .with("host", host.as_str())
                .with("port", u64::from(*port))
                .with("buffer-size", UDP_BUFFER_SIZE)
                .with("sync", false)
                .with("async", false),
            Self::Multicast {
                group,
                port,
                ttl,
                interface,
            } => {
                let sink = NodeBlueprint::new(NodeRole::Sink, "udpsink", name)
                    .with("host", group.as_str())
                    .with("port", u64::from(*port))
                    .with("ttl-mc", u64::from(*ttl))
                    .with("auto-multicast", true)
                    .with("buffer-size", UDP_BUFFER_SIZE)
                    .with("sync", false)
                    .with("async", false);
                match interface {
                    Some(iface) => sink.with("multicast-iface", iface.as_str()),
                    None => sink,
                }
            }
            Self::Rtmp { location } => NodeBlueprint::new(NodeRole::Sink, "rtmpsink", name)
                .with("location", location.as_str())
                .with("sync", false),
        }
    }

    /// RTMP only carries FLV; every other target honours the configured
    /// container.
    pub fn container_for(&self, configured: ContainerFormat) -> ContainerFormat {
        match self {
            Self::Rtmp { .. } => ContainerFormat::Flv,
            _ => configured,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Udp { host, port } => {
                validate_host(host)?;
                validate_port(*port)
            }
            Self::Multicast {
                group, port, ttl, ..
            } => {
                if !is_multicast(group) {
                    return Err(format!("`{group}` is not a multicast group address"));
                }
                if *ttl == 0 || *ttl > 255 {
                    return Err(format!("multicast ttl must be within 1..=255, got {ttl}"));
                }
                validate_port(*port)
            }
            Self::Rtmp { location } => {
                let url = url::Url::parse(location)
                    .map_err(|e| format!("invalid RTMP location `{location}`: {e}"))?;
                match url.scheme() {
                    "rtmp" | "rtmps" => Ok(()),
                    other => Err(format!("RTMP location must use rtmp or rtmps, got `{other}`")),
                }
            }
        }
    }
}

fn validate_port(port: u16) -> Result<(), String> {
    if port == 0 {
        return Err("port must be between 1 and 65535".to_string());
    }
    Ok(())
}

/// Accepts IP literals and syntactically valid host names. Names are not
/// resolved here.
fn validate_host(host: &str) -> Result<(), String> {
    if host.trim().is_empty() {
        return Err("host cannot be empty".to_string());
    }
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    let valid_label = |label: &str| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if host.len() <= 253 && host.split('.').all(valid_label) {
        Ok(())
    } else {
        Err(format!("invalid host `{host}`"))
    }
}

/// IPv4 224.0.0.0/4 or IPv6 ff00::/8.
pub fn is_multicast(addr: &str) -> bool {
    addr.parse::<IpAddr>().is_ok_and(|ip| ip.is_multicast())
}

pub fn validate_bitrate(bitrate: u64) -> Result<(), String> {
    if !(MIN_BITRATE..=MAX_BITRATE).contains(&bitrate) {
        return Err(format!(
            "bitrate must be between {MIN_BITRATE} and {MAX_BITRATE} bps, got {bitrate}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::PropertyValue;
    use rstest::rstest;

    #[test]
    fn test_h264_encoder_uses_kbps() {
        let enc = VideoCodec::H264.encoder("venc", 2_000_000);
        assert_eq!(enc.spec.factory, "x264enc");
        assert_eq!(enc.property("bitrate"), Some(&PropertyValue::UInt(2000)));
        assert_eq!(
            enc.property("tune"),
            Some(&PropertyValue::Str("zerolatency".into()))
        );
    }

    #[test]
    fn test_vp8_encoder_uses_bps() {
        let enc = VideoCodec::Vp8.encoder("venc", 2_000_000);
        assert_eq!(
            enc.property("target-bitrate"),
            Some(&PropertyValue::UInt(2_000_000))
        );
    }

    #[test]
    fn test_rtmp_forces_flv() {
        let target = OutputTarget::Rtmp {
            location: "rtmp://ingest.example.com/live/key".into(),
        };
        assert_eq!(
            target.container_for(ContainerFormat::MpegTs),
            ContainerFormat::Flv
        );
        assert_eq!(target.sink("sink").spec.factory, "rtmpsink");
        assert!(target.validate().is_ok());
    }

    #[rstest]
    #[case("239.1.1.1", true)]
    #[case("224.0.0.1", true)]
    #[case("ff02::1", true)]
    #[case("192.168.1.10", false)]
    #[case("240.0.0.1", false)]
    #[case("not-an-ip", false)]
    fn test_multicast_ranges(#[case] addr: &str, #[case] expected: bool) {
        assert_eq!(is_multicast(addr), expected);
    }

    #[rstest]
    #[case("127.0.0.1", 5000, true)]
    #[case("relay.internal", 5000, true)]
    #[case("::1", 1, true)]
    #[case("", 5000, false)]
    #[case("bad host", 5000, false)]
    #[case("127.0.0.1", 0, false)]
    fn test_udp_validation(#[case] host: &str, #[case] port: u16, #[case] ok: bool) {
        let target = OutputTarget::Udp {
            host: host.into(),
            port,
        };
        assert_eq!(target.validate().is_ok(), ok);
    }

    #[test]
    fn test_bitrate_bounds() {
        assert!(validate_bitrate(MIN_BITRATE).is_ok());
        assert!(validate_bitrate(MAX_BITRATE).is_ok());
        assert!(validate_bitrate(99_999).is_err());
        assert!(validate_bitrate(50_000_001).is_err());
    }

    #[test]
    fn test_multicast_sink_properties() {
        let target = OutputTarget::Multicast {
            group: "239.0.0.5".into(),
            port: 5004,
            ttl: 4,
            interface: Some("eth1".into()),
        };
        let sink = target.sink("sink");
        assert_eq!(sink.property("ttl-mc"), Some(&PropertyValue::UInt(4)));
        assert_eq!(
            sink.property("multicast-iface"),
            Some(&PropertyValue::Str("eth1".into()))
        );
    }
}
