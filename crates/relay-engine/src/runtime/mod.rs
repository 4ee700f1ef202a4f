//! Contract between the engine and the media runtime that actually moves
//! buffers.
//!
//! One runtime instance owns one processing graph. The engine only ever
//! talks to it through [`MediaRuntime`], so graph construction, linking and
//! supervision are identical for the in-memory runtime used in dry runs and
//! tests and for the GStreamer runtime behind the `gstreamer` feature.

mod memory;

#[cfg(feature = "gstreamer")]
mod gst;

pub use memory::{MemoryNode, MemoryPort, MemoryRuntime, MemorySubscription};

#[cfg(feature = "gstreamer")]
pub use gst::{GstRuntime, GstSubscription};

use crate::caps::Capabilities;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::{Display, EnumString};

/// Callback invoked once per newly created output port of a node.
pub type PortHandler<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Callback invoked for every buffer passing a port.
pub type DataProbe = Arc<dyn Fn() + Send + Sync>;

pub trait MediaRuntime: Send + Sync + 'static {
    type Node: Clone + Send + Sync + 'static;
    type Port: Clone + Send + Sync + 'static;
    type Caps: Capabilities + Send + 'static;
    /// Keeps a port-creation handler registered until dropped.
    type Subscription: Send + 'static;

    fn create_node(&self, spec: &NodeSpec) -> Result<Self::Node, RuntimeError>;

    fn node_name(&self, node: &Self::Node) -> String;

    fn set_property(
        &self,
        node: &Self::Node,
        key: &str,
        value: &PropertyValue,
    ) -> Result<(), RuntimeError>;

    /// Sets a property whose value is another node, e.g. a player's sinks.
    fn set_node_property(
        &self,
        node: &Self::Node,
        key: &str,
        value: &Self::Node,
    ) -> Result<(), RuntimeError>;

    fn add_node(&self, node: &Self::Node) -> Result<(), RuntimeError>;

    /// Links two nodes through their always-present ports.
    fn link_nodes(&self, src: &Self::Node, sink: &Self::Node) -> Result<(), RuntimeError>;

    fn static_port(&self, node: &Self::Node, name: &str) -> Option<Self::Port>;

    fn port_name(&self, port: &Self::Port) -> String;

    fn link_ports(&self, src: &Self::Port, sink: &Self::Port) -> Result<(), RuntimeError>;

    fn is_linked(&self, port: &Self::Port) -> bool;

    /// Negotiated capabilities, if negotiation finished.
    fn current_caps(&self, port: &Self::Port) -> Option<Self::Caps>;

    /// Capabilities the port could produce.
    fn query_caps(&self, port: &Self::Port) -> Option<Self::Caps>;

    /// Registers `handler` for every output port `node` creates from now on.
    /// Ports that already exist are replayed to the handler before this
    /// returns.
    fn on_port_added(
        &self,
        node: &Self::Node,
        handler: PortHandler<Self::Port>,
    ) -> Result<Self::Subscription, RuntimeError>;

    fn add_data_probe(&self, port: &Self::Port, probe: DataProbe) -> Result<(), RuntimeError>;

    fn set_state(&self, state: RuntimeState) -> Result<(), RuntimeError>;

    /// Waits up to `timeout` for the next graph event.
    fn poll_event(&self, timeout: Duration) -> Option<RuntimeEvent>;

    /// Runs one non-blocking iteration of the runtime's dispatch loop.
    fn iterate_dispatch(&self);
}

/// Requested state for the whole graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum RuntimeState {
    Null,
    Ready,
    Paused,
    Playing,
}

/// Role a node plays in the graph, independent of its runtime factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum NodeRole {
    Source,
    Demultiplexer,
    Queue,
    Parser,
    Decoder,
    Converter,
    Scaler,
    Overlay,
    Encoder,
    CapsFilter,
    Multiplexer,
    Sink,
}

/// Everything needed to instantiate one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub role: NodeRole,
    /// Runtime factory name, e.g. `tsdemux`.
    pub factory: String,
    /// Unique name inside the graph.
    pub name: String,
}

impl NodeSpec {
    pub fn new(role: NodeRole, factory: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            role,
            factory: factory.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.factory, self.role)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Capability string such as `video/x-raw,width=1280,height=720`.
    Caps(String),
}

impl PropertyValue {
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Caps(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) | Self::Caps(v) => f.write_str(v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Broad origin of a runtime error, mirroring the usual media-framework
/// error domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ErrorDomain {
    Core,
    Library,
    Resource,
    Stream,
    Unknown,
}

/// Something the graph reported while running.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    EndOfStream,
    Error {
        /// Name of the node that raised it.
        source: Option<String>,
        message: String,
        debug: Option<String>,
        domain: ErrorDomain,
    },
    Warning {
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    Info {
        source: Option<String>,
        message: String,
    },
    StateChanged {
        source: Option<String>,
        old: RuntimeState,
        new: RuntimeState,
    },
}

impl RuntimeEvent {
    pub fn error(source: impl Into<String>, message: impl Into<String>, domain: ErrorDomain) -> Self {
        Self::Error {
            source: Some(source.into()),
            message: message.into(),
            debug: None,
            domain,
        }
    }

    pub fn warning(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Warning {
            source: Some(source.into()),
            message: message.into(),
            debug: None,
        }
    }

    /// End of stream and errors stop the event loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::EndOfStream | Self::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("no node factory named `{0}` is available")]
    MissingFactory(String),

    #[error("node `{node}` has no property `{property}`")]
    UnknownProperty { node: String, property: String },

    #[error("invalid value for `{node}.{property}`: {reason}")]
    InvalidProperty {
        node: String,
        property: String,
        reason: String,
    },

    #[error("cannot link {src} -> {sink}: {reason}")]
    Link {
        src: String,
        sink: String,
        reason: String,
    },

    #[error("state change to {state} failed: {reason}")]
    StateChange { state: RuntimeState, reason: String },

    #[error("{0}")]
    Other(String),
}

impl RuntimeError {
    pub fn link(src: impl Into<String>, sink: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Link {
            src: src.into(),
            sink: sink.into(),
            reason: reason.into(),
        }
    }
}

/// Pops raw messages until `accept` maps one to a value or `timeout` has
/// elapsed in total. Ignored messages do not extend the wait.
#[cfg_attr(not(feature = "gstreamer"), allow(dead_code))]
pub(crate) fn poll_within<M, T>(
    timeout: Duration,
    mut pop: impl FnMut(Duration) -> Option<M>,
    mut accept: impl FnMut(M) -> Option<T>,
) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let message = pop(remaining)?;
        if let Some(value) = accept(message) {
            return Some(value);
        }
        if remaining.is_zero() {
            return None;
        }
    }
}
