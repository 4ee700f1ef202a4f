//! GStreamer-backed media runtime.

use super::{
    DataProbe, ErrorDomain, MediaRuntime, NodeSpec, PortHandler, PropertyValue, RuntimeError,
    RuntimeEvent, RuntimeState, poll_within,
};
use crate::caps::Capabilities;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

impl Capabilities for gst::Caps {
    fn len(&self) -> usize {
        self.size() as usize
    }

    fn media_type_at(&self, index: usize) -> Option<&str> {
        let index = u32::try_from(index).ok()?;
        self.structure(index).map(|s| s.name().as_str())
    }
}

/// One GStreamer pipeline driven through [`MediaRuntime`].
pub struct GstRuntime {
    pipeline: gst::Pipeline,
    bus: gst::Bus,
}

impl GstRuntime {
    /// Initializes GStreamer (idempotent) and creates an empty pipeline.
    pub fn new(name: &str) -> Result<Self, RuntimeError> {
        gst::init().map_err(|e| RuntimeError::Other(format!("GStreamer init failed: {e}")))?;
        let pipeline = gst::Pipeline::with_name(name);
        let bus = pipeline
            .bus()
            .ok_or_else(|| RuntimeError::Other("pipeline has no bus".into()))?;
        Ok(Self { pipeline, bus })
    }

    pub fn pipeline(&self) -> &gst::Pipeline {
        &self.pipeline
    }

    /// Maps the bus messages the engine cares about; everything else is
    /// dropped.
    fn translate(&self, msg: &gst::Message) -> Option<RuntimeEvent> {
        let source = msg.src().map(|s| s.name().to_string());
        let event = match msg.view() {
            gst::MessageView::Eos(..) => RuntimeEvent::EndOfStream,
            gst::MessageView::Error(err) => RuntimeEvent::Error {
                source,
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
                domain: error_domain(&err.error()),
            },
            gst::MessageView::Warning(warning) => RuntimeEvent::Warning {
                source,
                message: warning.error().to_string(),
                debug: warning.debug().map(|d| d.to_string()),
            },
            gst::MessageView::Info(info) => RuntimeEvent::Info {
                source,
                message: info.error().to_string(),
            },
            gst::MessageView::StateChanged(change)
                if msg.src() == Some(self.pipeline.upcast_ref::<gst::Object>()) =>
            {
                RuntimeEvent::StateChanged {
                    source,
                    old: from_gst_state(change.old()),
                    new: from_gst_state(change.current()),
                }
            }
            _ => return None,
        };
        Some(event)
    }
}

fn to_gst_state(state: RuntimeState) -> gst::State {
    match state {
        RuntimeState::Null => gst::State::Null,
        RuntimeState::Ready => gst::State::Ready,
        RuntimeState::Paused => gst::State::Paused,
        RuntimeState::Playing => gst::State::Playing,
    }
}

fn from_gst_state(state: gst::State) -> RuntimeState {
    match state {
        gst::State::Ready => RuntimeState::Ready,
        gst::State::Paused => RuntimeState::Paused,
        gst::State::Playing => RuntimeState::Playing,
        _ => RuntimeState::Null,
    }
}

fn error_domain(err: &glib::Error) -> ErrorDomain {
    if err.is::<gst::ResourceError>() {
        ErrorDomain::Resource
    } else if err.is::<gst::StreamError>() {
        ErrorDomain::Stream
    } else if err.is::<gst::CoreError>() {
        ErrorDomain::Core
    } else if err.is::<gst::LibraryError>() {
        ErrorDomain::Library
    } else {
        ErrorDomain::Unknown
    }
}

impl MediaRuntime for GstRuntime {
    type Node = gst::Element;
    type Port = gst::Pad;
    type Caps = gst::Caps;
    type Subscription = GstSubscription;

    fn create_node(&self, spec: &NodeSpec) -> Result<gst::Element, RuntimeError> {
        gst::ElementFactory::make(&spec.factory)
            .name(spec.name.as_str())
            .build()
            .map_err(|_| RuntimeError::MissingFactory(spec.factory.clone()))
    }

    fn node_name(&self, node: &gst::Element) -> String {
        node.name().to_string()
    }

    fn set_property(
        &self,
        node: &gst::Element,
        key: &str,
        value: &PropertyValue,
    ) -> Result<(), RuntimeError> {
        if node.find_property(key).is_none() {
            return Err(RuntimeError::UnknownProperty {
                node: node.name().to_string(),
                property: key.to_string(),
            });
        }
        match value {
            PropertyValue::Caps(caps) => {
                let caps = gst::Caps::from_str(caps).map_err(|e| RuntimeError::InvalidProperty {
                    node: node.name().to_string(),
                    property: key.to_string(),
                    reason: e.to_string(),
                })?;
                node.set_property(key, caps);
            }
            // Parsing from text lets GStreamer coerce into enum, flag and
            // numeric property types.
            other => node.set_property_from_str(key, &other.to_string()),
        }
        Ok(())
    }

    fn set_node_property(
        &self,
        node: &gst::Element,
        key: &str,
        value: &gst::Element,
    ) -> Result<(), RuntimeError> {
        if node.find_property(key).is_none() {
            return Err(RuntimeError::UnknownProperty {
                node: node.name().to_string(),
                property: key.to_string(),
            });
        }
        node.set_property(key, value.clone());
        Ok(())
    }

    fn add_node(&self, node: &gst::Element) -> Result<(), RuntimeError> {
        self.pipeline
            .add(node)
            .map_err(|e| RuntimeError::Other(format!("failed to add {}: {e}", node.name())))
    }

    fn link_nodes(&self, src: &gst::Element, sink: &gst::Element) -> Result<(), RuntimeError> {
        src.link(sink)
            .map_err(|e| RuntimeError::link(src.name().as_str(), sink.name().as_str(), e.to_string()))
    }

    fn static_port(&self, node: &gst::Element, name: &str) -> Option<gst::Pad> {
        node.static_pad(name)
    }

    fn port_name(&self, port: &gst::Pad) -> String {
        port.name().to_string()
    }

    fn link_ports(&self, src: &gst::Pad, sink: &gst::Pad) -> Result<(), RuntimeError> {
        src.link(sink).map(|_| ()).map_err(|e| {
            RuntimeError::link(src.name().as_str(), sink.name().as_str(), format!("{e:?}"))
        })
    }

    fn is_linked(&self, port: &gst::Pad) -> bool {
        port.is_linked()
    }

    fn current_caps(&self, port: &gst::Pad) -> Option<gst::Caps> {
        port.current_caps()
    }

    fn query_caps(&self, port: &gst::Pad) -> Option<gst::Caps> {
        Some(port.query_caps(None))
    }

    fn on_port_added(
        &self,
        node: &gst::Element,
        handler: PortHandler<gst::Pad>,
    ) -> Result<GstSubscription, RuntimeError> {
        let callback = handler.clone();
        let id = node.connect_pad_added(move |_, pad| callback(pad));
        for pad in node.src_pads() {
            handler(&pad);
        }
        Ok(GstSubscription {
            element: node.clone(),
            handler: Some(id),
        })
    }

    fn add_data_probe(&self, port: &gst::Pad, probe: DataProbe) -> Result<(), RuntimeError> {
        port.add_probe(gst::PadProbeType::BUFFER, move |_, _| {
            probe();
            gst::PadProbeReturn::Ok
        })
        .map(|_| ())
        .ok_or_else(|| RuntimeError::Other(format!("could not probe {}", port.name())))
    }

    fn set_state(&self, state: RuntimeState) -> Result<(), RuntimeError> {
        self.pipeline
            .set_state(to_gst_state(state))
            .map(|_| ())
            .map_err(|e| RuntimeError::StateChange {
                state,
                reason: e.to_string(),
            })
    }

    fn poll_event(&self, timeout: Duration) -> Option<RuntimeEvent> {
        poll_within(
            timeout,
            |remaining| {
                self.bus
                    .timed_pop(gst::ClockTime::from_nseconds(remaining.as_nanos() as u64))
            },
            |msg: gst::Message| self.translate(&msg),
        )
    }

    fn iterate_dispatch(&self) {
        let context = glib::MainContext::default();
        while context.iteration(false) {}
    }
}

impl Drop for GstRuntime {
    fn drop(&mut self) {
        if self.pipeline.set_state(gst::State::Null).is_err() {
            debug!(pipeline = %self.pipeline.name(), "pipeline refused to reach null on drop");
        }
    }
}

/// Disconnects its `pad-added` handler when dropped.
pub struct GstSubscription {
    element: gst::Element,
    handler: Option<glib::SignalHandlerId>,
}

impl Drop for GstSubscription {
    fn drop(&mut self) {
        if let Some(id) = self.handler.take() {
            self.element.disconnect(id);
        }
    }
}
