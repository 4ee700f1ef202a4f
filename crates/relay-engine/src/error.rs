//! Engine-wide error types.

use crate::recovery::FaultRecord;
use crate::runtime::RuntimeError;
use hls_manifest::ManifestError;
use thiserror::Error;

/// Engine-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by graph construction, supervision and recovery.
///
/// Construction errors are returned synchronously and never retried;
/// runtime faults travel through the recovery manager and only show up
/// here as [`Error::Terminal`] once recovery gives up.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported source strategy `{0}`")]
    UnsupportedStrategy(String),

    #[error("Failed to create {role} node `{factory}`: {source}")]
    NodeCreation {
        role: String,
        factory: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Failed to link {from} -> {to}: {source}")]
    Link {
        from: String,
        to: String,
        #[source]
        source: RuntimeError,
    },

    #[error("Graph is already running")]
    AlreadyRunning,

    #[error("State change failed: {0}")]
    StateChange(#[source] RuntimeError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("No variant in {url} matches the selection")]
    NoVariant { url: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unrecoverable {} fault: {}", .0.category, .0.message)]
    Terminal(Box<FaultRecord>),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn node_creation(
        role: impl std::fmt::Display,
        factory: impl Into<String>,
        source: RuntimeError,
    ) -> Self {
        Self::NodeCreation {
            role: role.to_string(),
            factory: factory.into(),
            source,
        }
    }

    pub fn link(from: impl Into<String>, to: impl Into<String>, source: RuntimeError) -> Self {
        Self::Link {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    pub fn terminal(fault: FaultRecord) -> Self {
        Self::Terminal(Box::new(fault))
    }

    /// Errors raised while assembling a graph; these are never retried.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedStrategy(_)
                | Self::NodeCreation { .. }
                | Self::Link { .. }
                | Self::Configuration(_)
        )
    }
}
