//! # relay-engine
//!
//! Ingests an adaptive HLS stream, re-encodes it with an optional overlay and
//! relays it over UDP, multicast or RTMP.
//!
//! The engine is written against the [`runtime::MediaRuntime`] contract:
//!
//! - [`strategy`] builds one of three ingest topologies plus the shared
//!   output chain;
//! - [`topology`] links ports that appear only once media flows;
//! - [`supervisor`] owns the Stopped/Running lifecycle and drains events;
//! - [`recovery`] classifies faults, bounds retries and restarts the graph;
//! - [`service`] ties them together for a single relay.
//!
//! [`runtime::MemoryRuntime`] backs dry runs and tests. Enable the
//! `gstreamer` feature for `runtime::GstRuntime`.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

pub mod blueprint;
pub mod caps;
pub mod config;
pub mod error;
pub mod health;
pub mod output;
pub mod overlay;
pub mod recovery;
pub mod runtime;
pub mod service;
pub mod strategy;
pub mod supervisor;
pub mod topology;

pub use caps::{Capabilities, CapsDescriptor, MediaKind, first_media_type, media_kind};
pub use config::RelayConfig;
pub use error::{Error, Result};
pub use health::{ActivityMonitor, HealthProbe, HealthStatus};
pub use recovery::{
    FaultCategory, FaultClassifier, FaultRecord, RecoveryDecision, RecoveryManager, RunOutcome,
};
pub use runtime::{MediaRuntime, MemoryRuntime, RuntimeEvent, RuntimeState};
pub use service::RelayService;
pub use strategy::{GraphFactory, IngestNodes, ProcessingGraph, StrategyKind};
pub use supervisor::{GraphSignal, GraphSupervisor, SupervisorConfig};
pub use topology::{DynamicLinker, LinkOutcome, RouteTable, TopologyRegistry};
