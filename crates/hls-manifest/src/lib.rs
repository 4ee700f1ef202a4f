//! # hls-manifest
//!
//! Fetches an HLS master manifest, parses its `#EXT-X-STREAM-INF` variants
//! and picks one of them by a [`SelectionPolicy`] or by exact resolution.
//!
//! ```no_run
//! use hls_manifest::{HttpManifestResolver, ManifestSource, ResolverConfig, SelectionPolicy};
//!
//! # async fn demo() -> Result<(), hls_manifest::ManifestError> {
//! let resolver = HttpManifestResolver::new(ResolverConfig::default())?;
//! let manifest = resolver.resolve("https://cdn.example.com/live/master.m3u8").await?;
//! if let Some(best) = manifest.select(SelectionPolicy::HighestResolution) {
//!     println!("{best}");
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

pub mod error;
pub mod manifest;
pub mod resolver;
pub mod variant;

pub use error::ManifestError;
pub use manifest::MasterManifest;
pub use resolver::{
    DEFAULT_FETCH_TIMEOUT, HttpManifestResolver, ManifestSource, ResolverConfig,
    has_playlist_suffix, validate_manifest_url,
};
pub use variant::{SelectionPolicy, Variant};
