//! In-memory media runtime.
//!
//! Records every node, property and link instead of moving media. Ports
//! appear only when a driver calls [`MemoryRuntime::emit_port`], which lets
//! dry runs print the planned topology and lets tests replay the exact port
//! sequences a real runtime produces, including ports whose capabilities
//! are still empty.

use super::{
    DataProbe, MediaRuntime, NodeSpec, PortHandler, PropertyValue, RuntimeError, RuntimeEvent,
    RuntimeState,
};
use crate::caps::CapsDescriptor;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryNode(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryPort(usize);

struct NodeRecord {
    spec: NodeSpec,
    properties: BTreeMap<String, PropertyValue>,
    node_properties: BTreeMap<String, usize>,
    in_graph: bool,
}

struct PortRecord {
    node: usize,
    name: String,
    dynamic: bool,
    current: Option<CapsDescriptor>,
    query: Option<CapsDescriptor>,
    peer: Option<usize>,
    probes: Vec<DataProbe>,
}

#[derive(Default)]
struct Graph {
    nodes: Vec<NodeRecord>,
    ports: Vec<PortRecord>,
    node_links: Vec<(usize, usize)>,
    handlers: BTreeMap<u64, (usize, PortHandler<MemoryPort>)>,
    next_handler_id: u64,
    unavailable_factories: HashSet<String>,
    refused_sinks: HashSet<usize>,
    failing_states: HashSet<RuntimeState>,
    state_history: Vec<RuntimeState>,
    dispatch_iterations: u64,
}

impl Graph {
    fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.spec.name == name)
    }

    fn node_name(&self, id: usize) -> String {
        self.nodes
            .get(id)
            .map(|n| n.spec.name.clone())
            .unwrap_or_else(|| format!("node#{id}"))
    }

    fn port_label(&self, id: usize) -> String {
        match self.ports.get(id) {
            Some(port) => format!("{}:{}", self.node_name(port.node), port.name),
            None => format!("port#{id}"),
        }
    }
}

/// Graph state recorder standing in for a real media framework.
pub struct MemoryRuntime {
    graph: Arc<Mutex<Graph>>,
    state: Mutex<RuntimeState>,
    events: Mutex<VecDeque<RuntimeEvent>>,
    events_ready: Condvar,
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self {
            graph: Arc::new(Mutex::new(Graph::default())),
            state: Mutex::new(RuntimeState::Null),
            events: Mutex::new(VecDeque::new()),
            events_ready: Condvar::new(),
        }
    }

    /// Makes `create_node` fail for the given factory names.
    pub fn without_factories<I, S>(self, factories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.graph
            .lock()
            .unavailable_factories
            .extend(factories.into_iter().map(Into::into));
        self
    }

    /// Makes every `link_ports` into a port of `node_name` fail.
    pub fn refuse_links_into(&self, node_name: &str) {
        let mut graph = self.graph.lock();
        if let Some(id) = graph.find_node(node_name) {
            graph.refused_sinks.insert(id);
        }
    }

    /// Makes transitions to `state` fail until cleared.
    pub fn fail_state(&self, state: RuntimeState, fail: bool) {
        let mut graph = self.graph.lock();
        if fail {
            graph.failing_states.insert(state);
        } else {
            graph.failing_states.remove(&state);
        }
    }

    /// Creates a new output port on `node` and notifies every registered
    /// handler, exactly like a demuxer discovering a stream.
    pub fn emit_port(
        &self,
        node: &MemoryNode,
        name: &str,
        current: Option<CapsDescriptor>,
        query: Option<CapsDescriptor>,
    ) -> MemoryPort {
        let (port, handlers) = {
            let mut graph = self.graph.lock();
            graph.ports.push(PortRecord {
                node: node.0,
                name: name.to_string(),
                dynamic: true,
                current,
                query,
                peer: None,
                probes: Vec::new(),
            });
            let port = MemoryPort(graph.ports.len() - 1);
            let handlers: Vec<_> = graph
                .handlers
                .values()
                .filter(|(owner, _)| *owner == node.0)
                .map(|(_, handler)| handler.clone())
                .collect();
            (port, handlers)
        };

        for handler in handlers {
            handler(&port);
        }
        port
    }

    /// Runs every data probe attached to `port`.
    pub fn push_buffer(&self, port: &MemoryPort) {
        let probes = {
            let graph = self.graph.lock();
            graph
                .ports
                .get(port.0)
                .map(|p| p.probes.clone())
                .unwrap_or_default()
        };
        for probe in probes {
            probe();
        }
    }

    pub fn push_event(&self, event: RuntimeEvent) {
        self.events.lock().push_back(event);
        self.events_ready.notify_all();
    }

    pub fn node(&self, name: &str) -> Option<MemoryNode> {
        self.graph.lock().find_node(name).map(MemoryNode)
    }

    pub fn spec_of(&self, node: &MemoryNode) -> Option<NodeSpec> {
        self.graph.lock().nodes.get(node.0).map(|n| n.spec.clone())
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> Vec<NodeSpec> {
        self.graph
            .lock()
            .nodes
            .iter()
            .map(|n| n.spec.clone())
            .collect()
    }

    pub fn is_in_graph(&self, name: &str) -> bool {
        let graph = self.graph.lock();
        graph
            .find_node(name)
            .is_some_and(|id| graph.nodes[id].in_graph)
    }

    pub fn property(&self, node_name: &str, key: &str) -> Option<PropertyValue> {
        let graph = self.graph.lock();
        let id = graph.find_node(node_name)?;
        graph.nodes[id].properties.get(key).cloned()
    }

    /// Name of the node stored in a node-valued property.
    pub fn node_property(&self, node_name: &str, key: &str) -> Option<String> {
        let graph = self.graph.lock();
        let id = graph.find_node(node_name)?;
        let target = *graph.nodes[id].node_properties.get(key)?;
        Some(graph.node_name(target))
    }

    /// Static links as `(src, sink)` node names.
    pub fn node_links(&self) -> Vec<(String, String)> {
        let graph = self.graph.lock();
        graph
            .node_links
            .iter()
            .map(|(src, sink)| (graph.node_name(*src), graph.node_name(*sink)))
            .collect()
    }

    /// `node:port` label of whatever `port` is linked to.
    pub fn peer_of(&self, port: &MemoryPort) -> Option<String> {
        let graph = self.graph.lock();
        let peer = graph.ports.get(port.0)?.peer?;
        Some(graph.port_label(peer))
    }

    /// `node:port` labels of all linked port pairs, source first.
    pub fn port_links(&self) -> Vec<(String, String)> {
        let graph = self.graph.lock();
        graph
            .ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.dynamic)
            .filter_map(|(id, p)| p.peer.map(|peer| (graph.port_label(id), graph.port_label(peer))))
            .collect()
    }

    pub fn handler_count(&self) -> usize {
        self.graph.lock().handlers.len()
    }

    pub fn state(&self) -> RuntimeState {
        *self.state.lock()
    }

    pub fn state_history(&self) -> Vec<RuntimeState> {
        self.graph.lock().state_history.clone()
    }

    pub fn dispatch_iterations(&self) -> u64 {
        self.graph.lock().dispatch_iterations
    }

    fn get_or_create_static_port(&self, node: usize, name: &str) -> Option<MemoryPort> {
        let mut graph = self.graph.lock();
        if node >= graph.nodes.len() {
            return None;
        }
        if let Some(id) = graph
            .ports
            .iter()
            .position(|p| p.node == node && p.name == name && !p.dynamic)
        {
            return Some(MemoryPort(id));
        }
        graph.ports.push(PortRecord {
            node,
            name: name.to_string(),
            dynamic: false,
            current: None,
            query: None,
            peer: None,
            probes: Vec::new(),
        });
        Some(MemoryPort(graph.ports.len() - 1))
    }
}

impl MediaRuntime for MemoryRuntime {
    type Node = MemoryNode;
    type Port = MemoryPort;
    type Caps = CapsDescriptor;
    type Subscription = MemorySubscription;

    fn create_node(&self, spec: &NodeSpec) -> Result<MemoryNode, RuntimeError> {
        let mut graph = self.graph.lock();
        if graph.unavailable_factories.contains(&spec.factory) {
            return Err(RuntimeError::MissingFactory(spec.factory.clone()));
        }
        if graph.find_node(&spec.name).is_some() {
            return Err(RuntimeError::Other(format!(
                "a node named `{}` already exists",
                spec.name
            )));
        }
        graph.nodes.push(NodeRecord {
            spec: spec.clone(),
            properties: BTreeMap::new(),
            node_properties: BTreeMap::new(),
            in_graph: false,
        });
        trace!(node = %spec, "created node");
        Ok(MemoryNode(graph.nodes.len() - 1))
    }

    fn node_name(&self, node: &MemoryNode) -> String {
        self.graph.lock().node_name(node.0)
    }

    fn set_property(
        &self,
        node: &MemoryNode,
        key: &str,
        value: &PropertyValue,
    ) -> Result<(), RuntimeError> {
        let mut graph = self.graph.lock();
        let record = graph
            .nodes
            .get_mut(node.0)
            .ok_or_else(|| RuntimeError::Other(format!("unknown node #{}", node.0)))?;
        record.properties.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn set_node_property(
        &self,
        node: &MemoryNode,
        key: &str,
        value: &MemoryNode,
    ) -> Result<(), RuntimeError> {
        let mut graph = self.graph.lock();
        if value.0 >= graph.nodes.len() {
            return Err(RuntimeError::Other(format!("unknown node #{}", value.0)));
        }
        let record = graph
            .nodes
            .get_mut(node.0)
            .ok_or_else(|| RuntimeError::Other(format!("unknown node #{}", node.0)))?;
        record.node_properties.insert(key.to_string(), value.0);
        Ok(())
    }

    fn add_node(&self, node: &MemoryNode) -> Result<(), RuntimeError> {
        let mut graph = self.graph.lock();
        let record = graph
            .nodes
            .get_mut(node.0)
            .ok_or_else(|| RuntimeError::Other(format!("unknown node #{}", node.0)))?;
        record.in_graph = true;
        Ok(())
    }

    fn link_nodes(&self, src: &MemoryNode, sink: &MemoryNode) -> Result<(), RuntimeError> {
        let mut graph = self.graph.lock();
        let in_graph = |id: usize| graph.nodes.get(id).is_some_and(|n| n.in_graph);
        if !in_graph(src.0) || !in_graph(sink.0) {
            return Err(RuntimeError::link(
                graph.node_name(src.0),
                graph.node_name(sink.0),
                "both nodes must be added to the graph first",
            ));
        }
        graph.node_links.push((src.0, sink.0));
        Ok(())
    }

    fn static_port(&self, node: &MemoryNode, name: &str) -> Option<MemoryPort> {
        self.get_or_create_static_port(node.0, name)
    }

    fn port_name(&self, port: &MemoryPort) -> String {
        self.graph
            .lock()
            .ports
            .get(port.0)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    }

    fn link_ports(&self, src: &MemoryPort, sink: &MemoryPort) -> Result<(), RuntimeError> {
        let mut graph = self.graph.lock();
        let (Some(src_port), Some(sink_port)) = (graph.ports.get(src.0), graph.ports.get(sink.0))
        else {
            return Err(RuntimeError::Other("unknown port".into()));
        };
        let src_label = graph.port_label(src.0);
        let sink_label = graph.port_label(sink.0);

        if graph.refused_sinks.contains(&sink_port.node) {
            return Err(RuntimeError::link(src_label, sink_label, "caps not accepted"));
        }
        if src_port.peer.is_some() || sink_port.peer.is_some() {
            return Err(RuntimeError::link(src_label, sink_label, "already linked"));
        }

        graph.ports[src.0].peer = Some(sink.0);
        graph.ports[sink.0].peer = Some(src.0);
        Ok(())
    }

    fn is_linked(&self, port: &MemoryPort) -> bool {
        self.graph
            .lock()
            .ports
            .get(port.0)
            .is_some_and(|p| p.peer.is_some())
    }

    fn current_caps(&self, port: &MemoryPort) -> Option<CapsDescriptor> {
        self.graph.lock().ports.get(port.0)?.current.clone()
    }

    fn query_caps(&self, port: &MemoryPort) -> Option<CapsDescriptor> {
        self.graph.lock().ports.get(port.0)?.query.clone()
    }

    fn on_port_added(
        &self,
        node: &MemoryNode,
        handler: PortHandler<MemoryPort>,
    ) -> Result<MemorySubscription, RuntimeError> {
        let (id, existing) = {
            let mut graph = self.graph.lock();
            if node.0 >= graph.nodes.len() {
                return Err(RuntimeError::Other(format!("unknown node #{}", node.0)));
            }
            let id = graph.next_handler_id;
            graph.next_handler_id += 1;
            graph.handlers.insert(id, (node.0, handler.clone()));
            let existing: Vec<_> = graph
                .ports
                .iter()
                .enumerate()
                .filter(|(_, p)| p.node == node.0 && p.dynamic)
                .map(|(id, _)| MemoryPort(id))
                .collect();
            (id, existing)
        };

        for port in &existing {
            handler(port);
        }

        Ok(MemorySubscription {
            id,
            graph: Arc::downgrade(&self.graph),
        })
    }

    fn add_data_probe(&self, port: &MemoryPort, probe: DataProbe) -> Result<(), RuntimeError> {
        let mut graph = self.graph.lock();
        let record = graph
            .ports
            .get_mut(port.0)
            .ok_or_else(|| RuntimeError::Other("unknown port".into()))?;
        record.probes.push(probe);
        Ok(())
    }

    fn set_state(&self, state: RuntimeState) -> Result<(), RuntimeError> {
        {
            let mut graph = self.graph.lock();
            if graph.failing_states.contains(&state) {
                return Err(RuntimeError::StateChange {
                    state,
                    reason: "transition refused".into(),
                });
            }
            graph.state_history.push(state);
        }
        let old = std::mem::replace(&mut *self.state.lock(), state);
        if old != state {
            self.push_event(RuntimeEvent::StateChanged {
                source: None,
                old,
                new: state,
            });
        }
        Ok(())
    }

    fn poll_event(&self, timeout: Duration) -> Option<RuntimeEvent> {
        let mut queue = self.events.lock();
        if queue.is_empty() {
            self.events_ready.wait_for(&mut queue, timeout);
        }
        queue.pop_front()
    }

    fn iterate_dispatch(&self) {
        self.graph.lock().dispatch_iterations += 1;
    }
}

/// Unregisters its port handler when dropped.
pub struct MemorySubscription {
    id: u64,
    graph: Weak<Mutex<Graph>>,
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        if let Some(graph) = self.graph.upgrade() {
            graph.lock().handlers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::NodeRole;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spec(name: &str) -> NodeSpec {
        NodeSpec::new(NodeRole::Demultiplexer, "tsdemux", name)
    }

    #[test]
    fn test_missing_factory() {
        let runtime = MemoryRuntime::new().without_factories(["tsdemux"]);
        let err = runtime.create_node(&spec("demux")).unwrap_err();
        assert_eq!(err, RuntimeError::MissingFactory("tsdemux".into()));
    }

    #[test]
    fn test_subscription_replays_and_unregisters() {
        let runtime = MemoryRuntime::new();
        let demux = runtime.create_node(&spec("demux")).unwrap();
        runtime.emit_port(&demux, "video_0", None, None);

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let subscription = runtime
            .on_port_added(
                &demux,
                Arc::new(move |_: &MemoryPort| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        runtime.emit_port(&demux, "audio_0", None, None);
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        drop(subscription);
        assert_eq!(runtime.handler_count(), 0);
        runtime.emit_port(&demux, "private_0", None, None);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ports_link_once() {
        let runtime = MemoryRuntime::new();
        let demux = runtime.create_node(&spec("demux")).unwrap();
        let queue = runtime
            .create_node(&NodeSpec::new(NodeRole::Queue, "queue", "q"))
            .unwrap();
        let a = runtime.emit_port(&demux, "video_0", None, None);
        let b = runtime.emit_port(&demux, "video_1", None, None);
        let sink = runtime.static_port(&queue, "sink").unwrap();

        runtime.link_ports(&a, &sink).unwrap();
        assert!(runtime.is_linked(&sink));
        assert_eq!(runtime.peer_of(&a).as_deref(), Some("q:sink"));
        assert!(runtime.link_ports(&b, &sink).is_err());
    }

    #[test]
    fn test_state_changes_are_reported() {
        let runtime = MemoryRuntime::new();
        runtime.set_state(RuntimeState::Playing).unwrap();
        assert_eq!(
            runtime.poll_event(Duration::from_millis(10)),
            Some(RuntimeEvent::StateChanged {
                source: None,
                old: RuntimeState::Null,
                new: RuntimeState::Playing,
            })
        );
        assert_eq!(runtime.poll_event(Duration::from_millis(10)), None);

        runtime.fail_state(RuntimeState::Playing, true);
        runtime.set_state(RuntimeState::Null).unwrap();
        assert!(runtime.set_state(RuntimeState::Playing).is_err());
        assert_eq!(runtime.state(), RuntimeState::Null);
    }
}
