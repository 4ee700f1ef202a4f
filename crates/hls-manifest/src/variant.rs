use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// One rendition advertised by a master manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variant {
    /// Absolute address of the rendition's media playlist.
    pub uri: String,
    /// Peak bitrate in bits per second, always > 0.
    pub bandwidth: u64,
    pub average_bandwidth: Option<u64>,
    /// 0 when the manifest omitted or garbled `RESOLUTION`.
    pub width: u32,
    pub height: u32,
    pub codecs: Option<String>,
    pub frame_rate: Option<f64>,
}

impl Variant {
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn has_resolution(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.has_resolution().then_some((self.width, self.height))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} @ {} bps ({})",
            self.width, self.height, self.bandwidth, self.uri
        )
    }
}

/// Rule for picking one variant out of a master manifest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum SelectionPolicy {
    /// Largest pixel area, ties broken by the higher peak bitrate.
    #[default]
    #[serde(alias = "highest")]
    #[strum(to_string = "highest-resolution", serialize = "highest")]
    HighestResolution,
    /// Smallest pixel area, ties broken by the lower peak bitrate.
    #[serde(alias = "lowest")]
    #[strum(to_string = "lowest-resolution", serialize = "lowest")]
    LowestResolution,
    /// Highest peak bitrate regardless of resolution.
    #[serde(alias = "bandwidth")]
    #[strum(to_string = "highest-bandwidth", serialize = "bandwidth")]
    HighestBandwidth,
}

impl SelectionPolicy {
    pub const ALL: [SelectionPolicy; 3] = [
        SelectionPolicy::HighestResolution,
        SelectionPolicy::LowestResolution,
        SelectionPolicy::HighestBandwidth,
    ];

    /// Picks from `variants`; equal candidates resolve to the earliest in
    /// manifest order so the result is stable.
    pub fn select<'a>(&self, variants: &'a [Variant]) -> Option<&'a Variant> {
        let mut iter = variants.iter();
        let first = iter.next()?;
        Some(iter.fold(first, |best, candidate| {
            if self.prefers(candidate, best) {
                candidate
            } else {
                best
            }
        }))
    }

    fn prefers(&self, candidate: &Variant, current: &Variant) -> bool {
        match self {
            Self::HighestResolution => {
                (candidate.area(), candidate.bandwidth) > (current.area(), current.bandwidth)
            }
            Self::LowestResolution => {
                (candidate.area(), candidate.bandwidth) < (current.area(), current.bandwidth)
            }
            Self::HighestBandwidth => candidate.bandwidth > current.bandwidth,
        }
    }
}
