//! Overlay node configuration: text templates, colours and placement.

use crate::blueprint::NodeBlueprint;
use crate::runtime::NodeRole;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};

const DEFAULT_COLOR: u32 = 0x00FF_FFFF;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverlayKind {
    #[default]
    Text,
    Image,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Anchor {
    #[default]
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
}

impl Anchor {
    /// `(halignment, valignment)` as understood by text overlays.
    pub fn alignment(&self) -> (&'static str, &'static str) {
        match self {
            Self::TopLeft => ("left", "top"),
            Self::TopRight => ("right", "top"),
            Self::BottomLeft => ("left", "bottom"),
            Self::BottomRight => ("right", "bottom"),
            Self::Center => ("center", "center"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub enabled: bool,
    pub kind: OverlayKind,
    /// Supports `{{.timestamp}}`, `{{.date}}`, `{{.time}}` and `{{.unix}}`.
    pub text: String,
    pub font_family: String,
    pub font_size: u32,
    pub color: String,
    pub image_path: Option<PathBuf>,
    pub alpha: f64,
    pub x: i32,
    pub y: i32,
    pub anchor: Anchor,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: OverlayKind::Text,
            text: "Live Stream".to_string(),
            font_family: "Arial".to_string(),
            font_size: 24,
            color: "white".to_string(),
            image_path: None,
            alpha: 1.0,
            x: 10,
            y: 10,
            anchor: Anchor::TopLeft,
        }
    }
}

impl OverlayConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        match self.kind {
            OverlayKind::Text => {
                if self.font_size == 0 {
                    return Err("overlay font_size must be positive".to_string());
                }
                if self.font_family.trim().is_empty() {
                    return Err("overlay font_family cannot be empty".to_string());
                }
            }
            OverlayKind::Image => {
                if self.image_path.as_ref().is_none_or(|p| p.as_os_str().is_empty()) {
                    return Err("image overlay requires image_path".to_string());
                }
                if !(0.0..=1.0).contains(&self.alpha) {
                    return Err(format!("overlay alpha must be within 0..=1, got {}", self.alpha));
                }
            }
        }
        Ok(())
    }

    /// Overlay node for the configured kind, or `None` when disabled.
    pub fn blueprint(&self, name: &str, now: DateTime<Local>) -> Option<NodeBlueprint> {
        if !self.enabled {
            return None;
        }
        let blueprint = match self.kind {
            OverlayKind::Text => {
                let (halign, valign) = self.anchor.alignment();
                NodeBlueprint::new(NodeRole::Overlay, "textoverlay", name)
                    .with("text", expand_template(&self.text, now))
                    .with(
                        "font-desc",
                        format!("{} {}", self.font_family, self.font_size),
                    )
                    .with("color", u64::from(argb(parse_color(&self.color))))
                    .with("halignment", halign)
                    .with("valignment", valign)
                    .with("xpad", i64::from(self.x))
                    .with("ypad", i64::from(self.y))
                    .with("wrap-mode", "word-char")
                    .with("line-alignment", "left")
            }
            OverlayKind::Image => {
                let location = self
                    .image_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                NodeBlueprint::new(NodeRole::Overlay, "gdkpixbufoverlay", name)
                    .with("location", location)
                    .with("offset-x", i64::from(self.x))
                    .with("offset-y", i64::from(self.y))
                    .with("alpha", self.alpha)
            }
        };
        Some(blueprint)
    }
}

/// Replaces the time placeholders in `text` using `now`.
pub fn expand_template(text: &str, now: DateTime<Local>) -> String {
    text.replace("{{.timestamp}}", &now.format("%Y-%m-%d %H:%M:%S").to_string())
        .replace("{{.date}}", &now.format("%Y-%m-%d").to_string())
        .replace("{{.time}}", &now.format("%H:%M:%S").to_string())
        .replace("{{.unix}}", &now.timestamp().to_string())
}

/// Parses a colour name or `RRGGBB` hex (with optional `#` / `0x`) into
/// `0xRRGGBB`. Anything unreadable becomes white.
pub fn parse_color(input: &str) -> u32 {
    let trimmed = input.trim();
    let hex = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let named = match hex.to_ascii_lowercase().as_str() {
        "white" => Some(0xFFFFFF),
        "black" => Some(0x000000),
        "red" => Some(0xFF0000),
        "green" => Some(0x00FF00),
        "blue" => Some(0x0000FF),
        "yellow" => Some(0xFFFF00),
        "cyan" => Some(0x00FFFF),
        "magenta" => Some(0xFF00FF),
        "gray" | "grey" => Some(0x808080),
        _ => None,
    };
    if let Some(rgb) = named {
        return rgb;
    }

    if hex.len() == 6 {
        if let Ok(rgb) = u32::from_str_radix(hex, 16) {
            return rgb;
        }
    }
    DEFAULT_COLOR
}

/// Fully opaque ARGB.
pub fn argb(rgb: u32) -> u32 {
    0xFF00_0000 | (rgb & 0x00FF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::PropertyValue;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap()
    }

    #[test]
    fn test_template_expansion() {
        let now = fixed_now();
        assert_eq!(
            expand_template("{{.date}} {{.time}}", now),
            "2024-03-09 07:05:02"
        );
        assert_eq!(
            expand_template("LIVE {{.timestamp}}", now),
            "LIVE 2024-03-09 07:05:02"
        );
        assert_eq!(
            expand_template("{{.unix}}", now),
            now.timestamp().to_string()
        );
        assert_eq!(expand_template("plain", now), "plain");
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!(parse_color("white"), 0xFFFFFF);
        assert_eq!(parse_color("Grey"), 0x808080);
        assert_eq!(parse_color("#00ff7f"), 0x00FF7F);
        assert_eq!(parse_color("0x123456"), 0x123456);
        assert_eq!(parse_color("nonsense"), DEFAULT_COLOR);
        assert_eq!(parse_color("#12345"), DEFAULT_COLOR);
        assert_eq!(argb(0x00FF7F), 0xFF00FF7F);
    }

    #[test]
    fn test_text_blueprint() {
        let config = OverlayConfig {
            text: "Now {{.time}}".into(),
            anchor: Anchor::BottomRight,
            ..OverlayConfig::default()
        };
        let bp = config.blueprint("overlay", fixed_now()).unwrap();
        assert_eq!(bp.spec.factory, "textoverlay");
        assert_eq!(
            bp.property("text"),
            Some(&PropertyValue::Str("Now 07:05:02".into()))
        );
        assert_eq!(
            bp.property("font-desc"),
            Some(&PropertyValue::Str("Arial 24".into()))
        );
        assert_eq!(
            bp.property("color"),
            Some(&PropertyValue::UInt(0xFFFF_FFFF))
        );
        assert_eq!(
            bp.property("halignment"),
            Some(&PropertyValue::Str("right".into()))
        );
    }

    #[test]
    fn test_disabled_overlay_has_no_node() {
        let config = OverlayConfig {
            enabled: false,
            ..OverlayConfig::default()
        };
        assert!(config.blueprint("overlay", fixed_now()).is_none());
    }

    #[test]
    fn test_image_overlay_validation() {
        let mut config = OverlayConfig {
            kind: OverlayKind::Image,
            ..OverlayConfig::default()
        };
        assert!(config.validate().is_err());
        config.image_path = Some("logo.png".into());
        assert!(config.validate().is_ok());
        config.alpha = 1.5;
        assert!(config.validate().is_err());
    }
}
