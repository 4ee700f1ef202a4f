//! Master manifest model and the line-oriented parser behind it.
//!
//! Parsing is deliberately lenient: a variant whose `RESOLUTION` cannot be
//! read is kept with a 0x0 resolution, and one without a usable
//! `BANDWIDTH` is dropped, so a partially broken manifest still yields the
//! renditions that can be played.

use crate::error::ManifestError;
use crate::variant::{SelectionPolicy, Variant};
use tracing::{debug, trace};
use url::Url;

const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF:";

/// A parsed master manifest. Variants keep manifest order.
#[derive(Debug, Clone)]
pub struct MasterManifest {
    url: Url,
    base_url: Url,
    variants: Vec<Variant>,
}

impl MasterManifest {
    /// Parses manifest text fetched from `url`.
    ///
    /// Fails with [`ManifestError::Parse`] when no variant survives.
    pub fn parse(content: &str, url: &Url) -> Result<Self, ManifestError> {
        let base_url = base_url_of(url);
        let variants = parse_variants(content, &base_url);
        if variants.is_empty() {
            return Err(ManifestError::parse(
                url.as_str(),
                "no playable variants found in master manifest",
            ));
        }
        debug!(url = %url, count = variants.len(), "parsed master manifest");
        Ok(Self {
            url: url.clone(),
            base_url,
            variants,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Manifest address with its final path segment removed.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn select(&self, policy: SelectionPolicy) -> Option<&Variant> {
        policy.select(&self.variants)
    }

    /// First variant in manifest order with exactly `width`x`height`.
    pub fn by_exact_resolution(&self, width: u32, height: u32) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.width == width && v.height == height)
    }

    /// Variants ordered best first: larger area, then higher bandwidth.
    pub fn by_quality(&self) -> Vec<&Variant> {
        let mut ranked: Vec<&Variant> = self.variants.iter().collect();
        ranked.sort_by(|a, b| (b.area(), b.bandwidth).cmp(&(a.area(), a.bandwidth)));
        ranked
    }
}

fn base_url_of(url: &Url) -> Url {
    url.join(".").unwrap_or_else(|_| url.clone())
}

fn parse_variants(content: &str, base_url: &Url) -> Vec<Variant> {
    let mut variants = Vec::new();
    let mut pending: Option<Variant> = None;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(attributes) = line.strip_prefix(STREAM_INF_TAG) {
            pending = Some(variant_from_attributes(attributes));
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let Some(mut variant) = pending.take() else {
            trace!(line, "ignoring URI line without a preceding stream info tag");
            continue;
        };

        if variant.bandwidth == 0 {
            debug!(uri = line, "dropping variant without a usable bandwidth");
            continue;
        }

        variant.uri = resolve_uri(line, base_url);
        trace!(variant = %variant, "found variant");
        variants.push(variant);
    }

    variants
}

fn resolve_uri(line: &str, base_url: &Url) -> String {
    if Url::parse(line).is_ok() {
        return line.to_string();
    }
    // Leading slashes are relative to the manifest directory, not the host.
    match base_url.join(line.trim_start_matches('/')) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => line.to_string(),
    }
}

fn variant_from_attributes(attributes: &str) -> Variant {
    let mut variant = Variant {
        uri: String::new(),
        bandwidth: 0,
        average_bandwidth: None,
        width: 0,
        height: 0,
        codecs: None,
        frame_rate: None,
    };

    for (key, value) in split_attributes(attributes) {
        match key {
            "BANDWIDTH" => variant.bandwidth = parse_bandwidth(value).unwrap_or(0),
            "AVERAGE-BANDWIDTH" => variant.average_bandwidth = parse_bandwidth(value),
            "RESOLUTION" => {
                let (width, height) = parse_resolution(value).unwrap_or((0, 0));
                variant.width = width;
                variant.height = height;
            }
            "CODECS" => variant.codecs = Some(value.to_string()),
            "FRAME-RATE" => variant.frame_rate = value.parse::<f64>().ok(),
            _ => {}
        }
    }

    variant
}

/// Splits an attribute list on commas that are outside quotes. Quotes are
/// stripped from values.
fn split_attributes(input: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (idx, ch) in input.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                push_attribute(&input[start..idx], &mut pairs);
                start = idx + 1;
            }
            _ => {}
        }
    }
    push_attribute(&input[start..], &mut pairs);

    pairs
}

fn push_attribute<'a>(segment: &'a str, pairs: &mut Vec<(&'a str, &'a str)>) {
    if let Some((key, value)) = segment.split_once('=') {
        let value = value.trim().trim_matches('"');
        pairs.push((key.trim(), value));
    }
}

/// First run of ASCII digits, so `"1566000"` and `"1566000bps"` both read.
fn parse_bandwidth(value: &str) -> Option<u64> {
    let digits: String = value
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok().filter(|bw| *bw > 0)
}

fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (width, height) = value.split_once(['x', 'X'])?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}
