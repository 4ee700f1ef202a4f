//! Dynamic topology linking.
//!
//! Demultiplexers, decoders and intake nodes create their output ports only
//! once the stream is flowing. A [`DynamicLinker`] is attached to each such
//! node and, for every new port:
//!
//! 1. reads the negotiated capabilities, falling back to the queryable ones;
//! 2. classifies the first entry through [`crate::caps::media_kind`];
//! 3. looks the [`MediaKind`] up in its [`RouteTable`];
//! 4. links the port unless either side is already linked.
//!
//! Link failures are logged and left unlinked; the graph keeps running and
//! the health probe notices a branch that never delivers media.

use crate::caps::{MediaKind, media_kind};
use crate::error::Result;
use crate::runtime::MediaRuntime;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Destination port per media kind for one emitting node.
pub struct RouteTable<P> {
    routes: Vec<(MediaKind, String, P)>,
}

impl<P> Default for RouteTable<P> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<P> RouteTable<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `kind` to `port`; `label` names the target for logs and plans.
    pub fn route(mut self, kind: MediaKind, label: impl Into<String>, port: P) -> Self {
        self.routes.retain(|(k, _, _)| *k != kind);
        self.routes.push((kind, label.into(), port));
        self
    }

    pub fn target(&self, kind: &MediaKind) -> Option<(&str, &P)> {
        self.routes
            .iter()
            .find(|(k, _, _)| k == kind)
            .map(|(_, label, port)| (label.as_str(), port))
    }

    pub fn describe(&self) -> Vec<(MediaKind, String)> {
        self.routes
            .iter()
            .map(|(kind, label, _)| (kind.clone(), label.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// What happened to one dynamic port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked(MediaKind),
    /// The port or its target was already linked; nothing changed.
    AlreadyLinked(MediaKind),
    /// No media type could be read from the port's capabilities.
    Unresolved,
    /// Media type known but nothing routes it.
    Unrouted(MediaKind),
    /// The runtime refused the link.
    Failed(MediaKind),
    /// The runtime was torn down before the port arrived.
    Detached,
}

#[derive(Debug, Default)]
pub struct LinkStats {
    linked: AtomicU64,
    already_linked: AtomicU64,
    unresolved: AtomicU64,
    unrouted: AtomicU64,
    failed: AtomicU64,
}

impl LinkStats {
    fn record(&self, outcome: &LinkOutcome) {
        let counter = match outcome {
            LinkOutcome::Linked(_) => &self.linked,
            LinkOutcome::AlreadyLinked(_) => &self.already_linked,
            LinkOutcome::Unresolved => &self.unresolved,
            LinkOutcome::Unrouted(_) => &self.unrouted,
            LinkOutcome::Failed(_) => &self.failed,
            LinkOutcome::Detached => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            linked: self.linked.load(Ordering::Relaxed),
            already_linked: self.already_linked.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatsSnapshot {
    pub linked: u64,
    pub already_linked: u64,
    pub unresolved: u64,
    pub unrouted: u64,
    pub failed: u64,
}

impl fmt::Display for LinkStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "linked={} already_linked={} unresolved={} unrouted={} failed={}",
            self.linked, self.already_linked, self.unresolved, self.unrouted, self.failed
        )
    }
}

/// Links the dynamic ports of one node according to its route table.
pub struct DynamicLinker<R: MediaRuntime> {
    owner: String,
    runtime: Weak<R>,
    routes: RouteTable<R::Port>,
    stats: Arc<LinkStats>,
}

impl<R: MediaRuntime> DynamicLinker<R> {
    pub fn new(owner: impl Into<String>, runtime: &Arc<R>, routes: RouteTable<R::Port>) -> Self {
        Self {
            owner: owner.into(),
            runtime: Arc::downgrade(runtime),
            routes,
            stats: Arc::new(LinkStats::default()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn stats(&self) -> Arc<LinkStats> {
        self.stats.clone()
    }

    pub fn handle_port(&self, port: &R::Port) -> LinkOutcome {
        let outcome = match self.runtime.upgrade() {
            Some(runtime) => self.link(&runtime, port),
            None => LinkOutcome::Detached,
        };
        self.stats.record(&outcome);
        outcome
    }

    fn link(&self, runtime: &R, port: &R::Port) -> LinkOutcome {
        let port_name = runtime.port_name(port);
        debug!(owner = %self.owner, port = %port_name, "new dynamic port");

        let kind = media_kind(runtime.current_caps(port).as_ref())
            .or_else(|| media_kind(runtime.query_caps(port).as_ref()));
        let Some(kind) = kind else {
            warn!(
                owner = %self.owner,
                port = %port_name,
                "could not determine media type, leaving port unlinked"
            );
            return LinkOutcome::Unresolved;
        };

        let Some((target_label, target)) = self.routes.target(&kind) else {
            info!(owner = %self.owner, port = %port_name, media = %kind, "no route for media type, ignoring port");
            return LinkOutcome::Unrouted(kind);
        };

        if runtime.is_linked(port) || runtime.is_linked(target) {
            warn!(
                owner = %self.owner,
                port = %port_name,
                target = %target_label,
                "target already linked, skipping"
            );
            return LinkOutcome::AlreadyLinked(kind);
        }

        match runtime.link_ports(port, target) {
            Ok(()) => {
                info!(owner = %self.owner, port = %port_name, target = %target_label, media = %kind, "linked dynamic port");
                LinkOutcome::Linked(kind)
            }
            Err(e) => {
                error!(
                    owner = %self.owner,
                    port = %port_name,
                    target = %target_label,
                    error = %e,
                    "failed to link dynamic port"
                );
                LinkOutcome::Failed(kind)
            }
        }
    }
}

/// Planned dynamic route, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescription {
    pub owner: String,
    pub kind: MediaKind,
    pub target: String,
}

/// Keeps every linker's port subscription alive; dropping the registry
/// unregisters them all.
pub struct TopologyRegistry<R: MediaRuntime> {
    entries: Vec<RegistryEntry<R>>,
}

struct RegistryEntry<R: MediaRuntime> {
    owner: String,
    routes: Vec<(MediaKind, String)>,
    stats: Arc<LinkStats>,
    _subscription: R::Subscription,
}

impl<R: MediaRuntime> Default for TopologyRegistry<R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<R: MediaRuntime> TopologyRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a linker for `node`. Ports the node already exposes are
    /// handled before this returns.
    pub fn attach(
        &mut self,
        runtime: &Arc<R>,
        node: &R::Node,
        routes: RouteTable<R::Port>,
    ) -> Result<Arc<LinkStats>> {
        let owner = runtime.node_name(node);
        let described = routes.describe();
        let linker = Arc::new(DynamicLinker::new(owner.clone(), runtime, routes));
        let stats = linker.stats();

        let handler = linker.clone();
        let subscription = runtime.on_port_added(
            node,
            Arc::new(move |port: &R::Port| {
                handler.handle_port(port);
            }),
        )?;

        debug!(owner = %owner, routes = described.len(), "attached dynamic linker");
        self.entries.push(RegistryEntry {
            owner,
            routes: described,
            stats: stats.clone(),
            _subscription: subscription,
        });
        Ok(stats)
    }

    pub fn owners(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.owner.as_str()).collect()
    }

    pub fn routes(&self) -> Vec<RouteDescription> {
        self.entries
            .iter()
            .flat_map(|entry| {
                entry.routes.iter().map(|(kind, target)| RouteDescription {
                    owner: entry.owner.clone(),
                    kind: kind.clone(),
                    target: target.clone(),
                })
            })
            .collect()
    }

    pub fn stats(&self) -> Vec<(String, LinkStatsSnapshot)> {
        self.entries
            .iter()
            .map(|e| (e.owner.clone(), e.stats.snapshot()))
            .collect()
    }

    /// Sum of all linkers' counters.
    pub fn totals(&self) -> LinkStatsSnapshot {
        self.entries
            .iter()
            .map(|e| e.stats.snapshot())
            .fold(LinkStatsSnapshot::default(), |acc, s| LinkStatsSnapshot {
                linked: acc.linked + s.linked,
                already_linked: acc.already_linked + s.already_linked,
                unresolved: acc.unresolved + s.unresolved,
                unrouted: acc.unrouted + s.unrouted,
                failed: acc.failed + s.failed,
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
