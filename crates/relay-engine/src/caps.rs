//! Capability descriptors and the one safe way to read a media type out of
//! them.
//!
//! A freshly created port can report a descriptor with zero entries while
//! negotiation is still in flight. Everything that needs a content type
//! goes through [`first_media_type`] / [`media_kind`], which treat an
//! absent or empty descriptor as "unknown" instead of indexing into it.

use std::collections::BTreeMap;
use std::fmt;

/// Ordered list of media-type entries reported by a port.
pub trait Capabilities {
    fn len(&self) -> usize;

    /// Media-type name of entry `index`. Implementations may assume
    /// `index < self.len()`; callers outside this module must not call it
    /// directly.
    fn media_type_at(&self, index: usize) -> Option<&str>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Media type of the first entry, or `None` when the descriptor is absent or
/// has no entries.
pub fn first_media_type<C: Capabilities + ?Sized>(caps: Option<&C>) -> Option<&str> {
    let caps = caps?;
    if caps.is_empty() {
        return None;
    }
    caps.media_type_at(0)
}

/// Classifies the first entry of `caps`.
pub fn media_kind<C: Capabilities + ?Sized>(caps: Option<&C>) -> Option<MediaKind> {
    first_media_type(caps).map(MediaKind::from_media_type)
}

/// What a negotiated stream carries, as far as routing is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    /// Multiplexed transport stream that still needs demuxing.
    TransportStream,
    Video,
    Audio,
    /// Anything else, carrying the raw media-type name for logging.
    Other(String),
}

impl MediaKind {
    pub fn from_media_type(name: &str) -> Self {
        if name.starts_with("video/mpegts") || name.starts_with("video/mp2t") {
            Self::TransportStream
        } else if name.starts_with("video/") {
            Self::Video
        } else if name.starts_with("audio/") {
            Self::Audio
        } else {
            Self::Other(name.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::TransportStream => "transport-stream",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a [`CapsDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsEntry {
    pub media_type: String,
    pub fields: BTreeMap<String, String>,
}

impl CapsEntry {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Runtime-agnostic capability descriptor.
///
/// Parses and prints the usual `media/type,key=value;other/type` notation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsDescriptor {
    entries: Vec<CapsEntry>,
}

impl CapsDescriptor {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(media_type: impl Into<String>) -> Self {
        Self {
            entries: vec![CapsEntry::new(media_type)],
        }
    }

    pub fn from_entries(entries: Vec<CapsEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[CapsEntry] {
        &self.entries
    }

    pub fn parse(input: &str) -> Self {
        let entries = input
            .split(';')
            .filter_map(|chunk| {
                let mut parts = chunk.split(',').map(str::trim);
                let media_type = parts.next().filter(|s| !s.is_empty())?;
                let mut entry = CapsEntry::new(media_type);
                for part in parts {
                    if let Some((key, value)) = part.split_once('=') {
                        entry.fields.insert(key.trim().into(), value.trim().into());
                    }
                }
                Some(entry)
            })
            .collect();
        Self { entries }
    }
}

impl Capabilities for CapsDescriptor {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn media_type_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.media_type.as_str())
    }
}

impl fmt::Display for CapsDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&entry.media_type)?;
            for (key, value) in &entry.fields {
                write!(f, ",{key}={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Descriptor that panics when indexed past its length, like a runtime
    /// binding that does no bounds checking.
    struct StrictCaps(Vec<&'static str>);

    impl Capabilities for StrictCaps {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn media_type_at(&self, index: usize) -> Option<&str> {
            Some(self.0[index])
        }
    }

    #[test]
    fn test_absent_descriptor() {
        assert_eq!(first_media_type::<CapsDescriptor>(None), None);
    }

    #[test]
    fn test_empty_descriptor_never_indexes() {
        let caps = StrictCaps(vec![]);
        assert_eq!(first_media_type(Some(&caps)), None);
        assert_eq!(media_kind(Some(&caps)), None);
    }

    #[test]
    fn test_first_entry_wins() {
        let caps = StrictCaps(vec!["audio/mpeg", "video/x-h264"]);
        assert_eq!(first_media_type(Some(&caps)), Some("audio/mpeg"));
    }

    #[test]
    fn test_media_kind_classification() {
        assert_eq!(
            MediaKind::from_media_type("video/mpegts"),
            MediaKind::TransportStream
        );
        assert_eq!(
            MediaKind::from_media_type("video/mp2t"),
            MediaKind::TransportStream
        );
        assert_eq!(MediaKind::from_media_type("video/x-h264"), MediaKind::Video);
        assert_eq!(MediaKind::from_media_type("audio/mpeg"), MediaKind::Audio);
        assert_eq!(
            MediaKind::from_media_type("application/x-id3"),
            MediaKind::Other("application/x-id3".into())
        );
    }

    #[test]
    fn test_descriptor_parse_and_display() {
        let caps = CapsDescriptor::parse(
            "video/x-h264,stream-format=avc,alignment=au; audio/mpeg,mpegversion=4",
        );
        assert_eq!(caps.len(), 2);
        assert_eq!(caps.entries()[0].fields["alignment"], "au");
        assert_eq!(
            caps.to_string(),
            "video/x-h264,alignment=au,stream-format=avc; audio/mpeg,mpegversion=4"
        );
        assert!(CapsDescriptor::parse("").is_empty());
    }
}
