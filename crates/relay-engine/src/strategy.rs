//! Source strategies and graph construction.
//!
//! Three ways to ingest the adaptive source, from most to least explicit:
//!
//! | Strategy    | Ingest nodes                                                   |
//! |-------------|----------------------------------------------------------------|
//! | `manual`    | HTTP source, container demux, TS demux, per-media decode branch |
//! | `semi-auto` | auto source+demux bin, per-media decode branch                  |
//! | `full-auto` | all-in-one player with two delivery channels and two intakes   |
//!
//! Every strategy feeds the same output chain: convert, scale, optional
//! resolution filter and overlay, encode, multiplex and send.

use crate::blueprint::NodeBlueprint;
use crate::caps::MediaKind;
use crate::config::{InputConfig, RelayConfig};
use crate::error::{Error, Result};
use crate::health::ActivityMonitor;
use crate::recovery::FaultClassifier;
use crate::runtime::{MediaRuntime, NodeRole, NodeSpec, PropertyValue, RuntimeError};
use crate::topology::{LinkStatsSnapshot, RouteDescription, RouteTable, TopologyRegistry};
use chrono::Local;
use hls_manifest::{ManifestSource, MasterManifest, Variant};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

const QUEUE_MAX_BUFFERS: u64 = 100;
const QUEUE_MAX_TIME_NS: u64 = 1_000_000_000;
const RESAMPLE_QUALITY: u64 = 4;
/// `video+audio` play flags for the all-in-one player.
const PLAYER_FLAGS: &str = "video+audio";

/// How the adaptive source is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum StrategyKind {
    /// Explicit fetch, container demux and TS demux nodes.
    #[default]
    #[strum(to_string = "manual", serialize = "souphttpsrc")]
    Manual,
    /// Auto source-and-demux node.
    #[strum(
        to_string = "semi-auto",
        serialize = "semi-automatic",
        serialize = "urisourcebin"
    )]
    SemiAuto,
    /// All-in-one player node.
    #[strum(
        to_string = "full-auto",
        serialize = "fully-automatic",
        serialize = "playbin3"
    )]
    FullAuto,
}

impl StrategyKind {
    /// Absent names select [`StrategyKind::Manual`]; unknown names are an
    /// error.
    pub fn from_config(name: Option<&str>) -> Result<Self> {
        match name.map(str::trim).filter(|n| !n.is_empty()) {
            None => Ok(Self::Manual),
            Some(name) => {
                Self::from_str(name).map_err(|_| Error::UnsupportedStrategy(name.to_string()))
            }
        }
    }
}

/// queue → parser → decoder for one elementary stream.
#[derive(Debug, Clone)]
pub struct DecodeBranch<N> {
    pub queue: N,
    pub parser: N,
    pub decoder: N,
}

#[derive(Debug, Clone)]
pub struct ManualNodes<N> {
    pub http_source: N,
    pub container_demux: N,
    pub ts_demux: N,
    pub video: DecodeBranch<N>,
    pub audio: DecodeBranch<N>,
}

#[derive(Debug, Clone)]
pub struct SemiAutoNodes<N> {
    pub source_bin: N,
    pub video: DecodeBranch<N>,
    pub audio: DecodeBranch<N>,
}

#[derive(Debug, Clone)]
pub struct FullAutoNodes<N> {
    pub player: N,
    /// Owned by the player; not added to the graph directly.
    pub video_channel: N,
    pub audio_channel: N,
    pub video_intake: N,
    pub audio_intake: N,
}

/// Strategy-specific ingest nodes.
#[derive(Debug, Clone)]
pub enum IngestNodes<N> {
    Manual(ManualNodes<N>),
    SemiAuto(SemiAutoNodes<N>),
    FullAuto(FullAutoNodes<N>),
}

impl<N> IngestNodes<N> {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Manual(_) => StrategyKind::Manual,
            Self::SemiAuto(_) => StrategyKind::SemiAuto,
            Self::FullAuto(_) => StrategyKind::FullAuto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoChain<N> {
    pub convert: N,
    pub scale: N,
    pub resolution_filter: Option<N>,
    pub overlay: Option<N>,
    pub encoder: N,
    pub encoded_filter: Option<N>,
    pub queue: N,
}

#[derive(Debug, Clone)]
pub struct AudioChain<N> {
    pub convert: N,
    pub resample: N,
    pub rate: N,
    pub encoder: N,
    pub encoded_filter: Option<N>,
    pub queue: N,
}

#[derive(Debug, Clone)]
pub struct OutputChain<N> {
    pub video: VideoChain<N>,
    pub audio: AudioChain<N>,
    pub mux: N,
    pub sink: N,
}

/// Static description of a built graph.
#[derive(Debug, Clone, Default)]
pub struct GraphPlan {
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<(String, String)>,
    pub routes: Vec<RouteDescription>,
}

impl fmt::Display for GraphPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes:")?;
        for node in &self.nodes {
            writeln!(f, "  {node}")?;
        }
        writeln!(f, "static links:")?;
        for (src, sink) in &self.links {
            writeln!(f, "  {src} -> {sink}")?;
        }
        writeln!(f, "dynamic routes:")?;
        for route in &self.routes {
            writeln!(f, "  {} [{}] -> {}", route.owner, route.kind, route.target)?;
        }
        Ok(())
    }
}

/// A fully constructed graph. Dropping it releases every port subscription.
pub struct ProcessingGraph<R: MediaRuntime> {
    kind: StrategyKind,
    source_address: String,
    selected_variant: Option<Variant>,
    output_resolution: Option<(u32, u32)>,
    ingest: IngestNodes<R::Node>,
    output: OutputChain<R::Node>,
    plan: GraphPlan,
    roles: HashMap<String, NodeRole>,
    activity: ActivityMonitor,
    topology: TopologyRegistry<R>,
}

impl<R: MediaRuntime> ProcessingGraph<R> {
    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Address the source node actually fetches.
    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn selected_variant(&self) -> Option<&Variant> {
        self.selected_variant.as_ref()
    }

    pub fn output_resolution(&self) -> Option<(u32, u32)> {
        self.output_resolution
    }

    pub fn ingest(&self) -> &IngestNodes<R::Node> {
        &self.ingest
    }

    pub fn output(&self) -> &OutputChain<R::Node> {
        &self.output
    }

    pub fn plan(&self) -> &GraphPlan {
        &self.plan
    }

    pub fn role_of(&self, node_name: &str) -> Option<NodeRole> {
        self.roles.get(node_name).copied()
    }

    pub fn fault_classifier(&self) -> FaultClassifier {
        FaultClassifier::new(self.roles.clone())
    }

    pub fn activity(&self) -> &ActivityMonitor {
        &self.activity
    }

    pub fn topology(&self) -> &TopologyRegistry<R> {
        &self.topology
    }

    pub fn link_stats(&self) -> Vec<(String, LinkStatsSnapshot)> {
        self.topology.stats()
    }
}

/// Builds processing graphs on a runtime.
pub struct GraphFactory<R: MediaRuntime> {
    runtime: Arc<R>,
    resolver: Option<Arc<dyn ManifestSource>>,
}

impl<R: MediaRuntime> GraphFactory<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ManifestSource>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub async fn build(&self, config: &RelayConfig) -> Result<ProcessingGraph<R>> {
        let kind = StrategyKind::from_config(config.input.strategy.as_deref())?;

        let mut source_address = config.input.url.clone();
        let mut output_resolution = config.output.resolution();
        let mut selected_variant = None;

        if kind == StrategyKind::FullAuto && config.input.resolve_manifest {
            let resolver = self.resolver.as_ref().ok_or_else(|| {
                Error::config("manifest resolution requested but no resolver is configured")
            })?;
            let manifest = resolver.resolve(&config.input.url).await?;
            let variant = pick_variant(&manifest, &config.input)
                .cloned()
                .ok_or_else(|| Error::NoVariant {
                    url: config.input.url.clone(),
                })?;
            info!(variant = %variant, "selected variant before playback");
            source_address = variant.uri.clone();
            if output_resolution.is_none() {
                output_resolution = variant.resolution();
            }
            selected_variant = Some(variant);
        }

        let mut builder = GraphBuilder::new(self.runtime.clone());
        let ingest = builder.ingest(kind, &source_address, config)?;
        let output = builder.output_chain(config, output_resolution)?;
        builder.link_ingest_to_output(&ingest, &output)?;
        let activity = builder.activity_probe(&output)?;

        let GraphBuilder {
            plan,
            roles,
            topology,
            ..
        } = builder;
        let plan = GraphPlan {
            routes: topology.routes(),
            ..plan
        };

        info!(
            strategy = %kind,
            source = %source_address,
            nodes = plan.nodes.len(),
            dynamic_owners = topology.len(),
            "processing graph built"
        );

        Ok(ProcessingGraph {
            kind,
            source_address,
            selected_variant,
            output_resolution,
            ingest,
            output,
            plan,
            roles,
            activity,
            topology,
        })
    }
}

/// Exact resolution first when configured, then the selection policy.
pub fn pick_variant<'a>(manifest: &'a MasterManifest, input: &InputConfig) -> Option<&'a Variant> {
    if let Some((width, height)) = input.exact_resolution() {
        match manifest.by_exact_resolution(width, height) {
            Some(variant) => return Some(variant),
            None => warn!(
                width,
                height,
                policy = %input.variant_policy,
                "no variant with requested resolution, falling back to policy"
            ),
        }
    }
    manifest.select(input.variant_policy)
}

struct GraphBuilder<R: MediaRuntime> {
    runtime: Arc<R>,
    plan: GraphPlan,
    roles: HashMap<String, NodeRole>,
    topology: TopologyRegistry<R>,
}

impl<R: MediaRuntime> GraphBuilder<R> {
    fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            plan: GraphPlan::default(),
            roles: HashMap::new(),
            topology: TopologyRegistry::new(),
        }
    }

    fn node(&mut self, blueprint: NodeBlueprint) -> Result<R::Node> {
        let node = blueprint.instantiate(self.runtime.as_ref())?;
        self.record(&blueprint.spec);
        Ok(node)
    }

    /// Creates a node without adding it to the graph, for nodes another
    /// node takes ownership of.
    fn detached_node(&mut self, blueprint: NodeBlueprint) -> Result<R::Node> {
        let spec = &blueprint.spec;
        let node = self
            .runtime
            .create_node(spec)
            .map_err(|e| Error::node_creation(spec.role, &spec.factory, e))?;
        for (key, value) in &blueprint.properties {
            self.runtime
                .set_property(&node, key, value)
                .map_err(|e| Error::node_creation(spec.role, &spec.factory, e))?;
        }
        self.record(spec);
        Ok(node)
    }

    fn record(&mut self, spec: &NodeSpec) {
        debug!(node = %spec, "node ready");
        self.roles.insert(spec.name.clone(), spec.role);
        self.plan.nodes.push(spec.clone());
    }

    fn link(&mut self, src: &R::Node, sink: &R::Node) -> Result<()> {
        let from = self.runtime.node_name(src);
        let to = self.runtime.node_name(sink);
        self.runtime
            .link_nodes(src, sink)
            .map_err(|e| Error::link(&from, &to, e))?;
        self.plan.links.push((from, to));
        Ok(())
    }

    fn link_chain(&mut self, nodes: &[&R::Node]) -> Result<()> {
        for pair in nodes.windows(2) {
            self.link(pair[0], pair[1])?;
        }
        Ok(())
    }

    fn sink_port(&self, node: &R::Node) -> Result<(String, R::Port)> {
        let name = self.runtime.node_name(node);
        let port = self.runtime.static_port(node, "sink").ok_or_else(|| {
            Error::link(
                "<dynamic>",
                name.as_str(),
                RuntimeError::Other("node has no static sink port".into()),
            )
        })?;
        Ok((name, port))
    }

    fn route_table(&self, targets: &[(MediaKind, &R::Node)]) -> Result<RouteTable<R::Port>> {
        let mut table = RouteTable::new();
        for (kind, node) in targets {
            let (label, port) = self.sink_port(node)?;
            table = table.route(kind.clone(), label, port);
        }
        Ok(table)
    }

    fn attach_routes(&mut self, owner: &R::Node, targets: &[(MediaKind, &R::Node)]) -> Result<()> {
        let routes = self.route_table(targets)?;
        self.topology.attach(&self.runtime, owner, routes)?;
        Ok(())
    }

    fn ingest(
        &mut self,
        kind: StrategyKind,
        address: &str,
        config: &RelayConfig,
    ) -> Result<IngestNodes<R::Node>> {
        let input = &config.input;
        let nodes = match kind {
            StrategyKind::Manual => {
                let http_source = self.node(
                    NodeBlueprint::new(NodeRole::Source, "souphttpsrc", "http-source")
                        .with("location", address)
                        .with("timeout", input.timeout_secs)
                        .with("retries", i64::from(input.connection_retries))
                        .with("user-agent", input.user_agent.as_str())
                        .with("automatic-redirect", true)
                        .with("keep-alive", true)
                        .with("compress", false)
                        .with("ssl-strict", false),
                )?;
                let container_demux = self.node(
                    NodeBlueprint::new(NodeRole::Demultiplexer, "hlsdemux", "container-demux")
                        .with("connection-speed", input.buffer_size / 1024)
                        .with("start-bitrate", config.output.bitrate / 1000),
                )?;
                let ts_demux =
                    self.node(NodeBlueprint::new(NodeRole::Demultiplexer, "tsdemux", "ts-demux"))?;
                let video = self.decode_branch("video", "h264parse")?;
                let audio = self.decode_branch("audio", "aacparse")?;
                self.link(&http_source, &container_demux)?;
                IngestNodes::Manual(ManualNodes {
                    http_source,
                    container_demux,
                    ts_demux,
                    video,
                    audio,
                })
            }
            StrategyKind::SemiAuto => {
                let source_bin = self.node(
                    NodeBlueprint::new(NodeRole::Source, "urisourcebin", "source-bin")
                        .with("uri", address)
                        .with("buffer-size", i64::try_from(input.buffer_size).unwrap_or(i64::MAX))
                        .with("connection-speed", input.buffer_size / 1024),
                )?;
                let video = self.decode_branch("video", "h264parse")?;
                let audio = self.decode_branch("audio", "aacparse")?;
                IngestNodes::SemiAuto(SemiAutoNodes {
                    source_bin,
                    video,
                    audio,
                })
            }
            StrategyKind::FullAuto => {
                let channel = format!("{}-{}", config.pipeline.name, std::process::id());
                let player = self.node(
                    NodeBlueprint::new(NodeRole::Source, "playbin3", "player")
                        .with("uri", address)
                        .with(
                            "buffer-duration",
                            i64::try_from(config.pipeline.buffer_time_ms.saturating_mul(1_000_000))
                                .unwrap_or(i64::MAX),
                        )
                        .with("buffer-size", i64::try_from(input.buffer_size).unwrap_or(i64::MAX))
                        .with("flags", PLAYER_FLAGS),
                )?;
                let video_channel = self.detached_node(
                    NodeBlueprint::new(NodeRole::Sink, "intervideosink", "video-channel")
                        .with("channel", format!("{channel}-video")),
                )?;
                let audio_channel = self.detached_node(
                    NodeBlueprint::new(NodeRole::Sink, "interaudiosink", "audio-channel")
                        .with("channel", format!("{channel}-audio")),
                )?;
                self.set_player_sink(&player, "video-sink", &video_channel)?;
                self.set_player_sink(&player, "audio-sink", &audio_channel)?;
                let video_intake = self.node(
                    NodeBlueprint::new(NodeRole::Source, "intervideosrc", "video-intake")
                        .with("channel", format!("{channel}-video")),
                )?;
                let audio_intake = self.node(
                    NodeBlueprint::new(NodeRole::Source, "interaudiosrc", "audio-intake")
                        .with("channel", format!("{channel}-audio")),
                )?;
                IngestNodes::FullAuto(FullAutoNodes {
                    player,
                    video_channel,
                    audio_channel,
                    video_intake,
                    audio_intake,
                })
            }
        };
        Ok(nodes)
    }

    fn set_player_sink(&mut self, player: &R::Node, key: &str, sink: &R::Node) -> Result<()> {
        self.runtime
            .set_node_property(player, key, sink)
            .map_err(|e| Error::node_creation(NodeRole::Source, "playbin3", e))
    }

    fn decode_branch(&mut self, media: &str, parser: &str) -> Result<DecodeBranch<R::Node>> {
        let queue = self.node(
            NodeBlueprint::new(NodeRole::Queue, "queue", &format!("{media}-queue"))
                .with("max-size-buffers", QUEUE_MAX_BUFFERS)
                .with("max-size-time", QUEUE_MAX_TIME_NS),
        )?;
        let parser = self.node(NodeBlueprint::new(
            NodeRole::Parser,
            parser,
            &format!("{media}-parser"),
        ))?;
        let decoder = self.node(NodeBlueprint::new(
            NodeRole::Decoder,
            "decodebin",
            &format!("{media}-decoder"),
        ))?;
        self.link_chain(&[&queue, &parser, &decoder])?;
        Ok(DecodeBranch {
            queue,
            parser,
            decoder,
        })
    }

    fn output_chain(
        &mut self,
        config: &RelayConfig,
        resolution: Option<(u32, u32)>,
    ) -> Result<OutputChain<R::Node>> {
        let output = &config.output;

        let convert =
            self.node(NodeBlueprint::new(NodeRole::Converter, "videoconvert", "video-convert"))?;
        let scale = self.node(NodeBlueprint::new(NodeRole::Scaler, "videoscale", "video-scale"))?;
        let resolution_filter = match resolution {
            Some((width, height)) => Some(self.node(
                NodeBlueprint::new(NodeRole::CapsFilter, "capsfilter", "video-resolution").with(
                    "caps",
                    PropertyValue::Caps(format!(
                        "video/x-raw,width={width},height={height}"
                    )),
                ),
            )?),
            None => None,
        };
        let overlay = match config.overlay.blueprint("overlay", Local::now()) {
            Some(blueprint) => Some(self.node(blueprint)?),
            None => None,
        };
        let encoder = self.node(output.video_codec.encoder("video-encoder", output.bitrate))?;
        let encoded_filter = match output.video_codec.encoded_caps() {
            Some(caps) => Some(self.node(
                NodeBlueprint::new(NodeRole::CapsFilter, "capsfilter", "video-encoded-caps")
                    .with("caps", PropertyValue::Caps(caps.to_string())),
            )?),
            None => None,
        };
        let queue = self.node(
            NodeBlueprint::new(NodeRole::Queue, "queue", "video-encoder-queue")
                .with("max-size-buffers", QUEUE_MAX_BUFFERS)
                .with("max-size-time", QUEUE_MAX_TIME_NS),
        )?;
        let video = VideoChain {
            convert,
            scale,
            resolution_filter,
            overlay,
            encoder,
            encoded_filter,
            queue,
        };

        let convert =
            self.node(NodeBlueprint::new(NodeRole::Converter, "audioconvert", "audio-convert"))?;
        let resample = self.node(
            NodeBlueprint::new(NodeRole::Converter, "audioresample", "audio-resample")
                .with("quality", RESAMPLE_QUALITY),
        )?;
        let rate = self.node(NodeBlueprint::new(NodeRole::Converter, "audiorate", "audio-rate"))?;
        let encoder = self.node(output.audio_codec.encoder("audio-encoder"))?;
        let encoded_filter = match output.audio_codec.encoded_caps() {
            Some(caps) => Some(self.node(
                NodeBlueprint::new(NodeRole::CapsFilter, "capsfilter", "audio-encoded-caps")
                    .with("caps", PropertyValue::Caps(caps.to_string())),
            )?),
            None => None,
        };
        let queue = self.node(
            NodeBlueprint::new(NodeRole::Queue, "queue", "audio-encoder-queue")
                .with("max-size-buffers", QUEUE_MAX_BUFFERS)
                .with("max-size-time", QUEUE_MAX_TIME_NS),
        )?;
        let audio = AudioChain {
            convert,
            resample,
            rate,
            encoder,
            encoded_filter,
            queue,
        };

        let container = output.container();
        if container != output.format {
            warn!(configured = %output.format, used = %container, "output target overrides container format");
        }
        let mux = self.node(container.muxer("mux"))?;
        let sink = self.node(output.target.sink("sink"))?;

        let mut video_nodes: Vec<&R::Node> = vec![&video.convert, &video.scale];
        video_nodes.extend(video.resolution_filter.iter());
        video_nodes.extend(video.overlay.iter());
        video_nodes.push(&video.encoder);
        video_nodes.extend(video.encoded_filter.iter());
        video_nodes.extend([&video.queue, &mux]);
        self.link_chain(&video_nodes)?;

        let mut audio_nodes: Vec<&R::Node> = vec![&audio.convert, &audio.resample, &audio.rate];
        audio_nodes.push(&audio.encoder);
        audio_nodes.extend(audio.encoded_filter.iter());
        audio_nodes.extend([&audio.queue, &mux]);
        self.link_chain(&audio_nodes)?;

        self.link(&mux, &sink)?;

        Ok(OutputChain {
            video,
            audio,
            mux,
            sink,
        })
    }

    /// Attaches linkers to every node that creates ports at runtime.
    fn link_ingest_to_output(
        &mut self,
        ingest: &IngestNodes<R::Node>,
        output: &OutputChain<R::Node>,
    ) -> Result<()> {
        let video_convert = &output.video.convert;
        let audio_convert = &output.audio.convert;

        match ingest {
            IngestNodes::Manual(nodes) => {
                self.attach_routes(
                    &nodes.container_demux,
                    &[
                        (MediaKind::TransportStream, &nodes.ts_demux),
                        (MediaKind::Video, &nodes.video.queue),
                        (MediaKind::Audio, &nodes.audio.queue),
                    ],
                )?;
                self.attach_routes(
                    &nodes.ts_demux,
                    &[
                        (MediaKind::Video, &nodes.video.queue),
                        (MediaKind::Audio, &nodes.audio.queue),
                    ],
                )?;
                self.attach_decoders(&nodes.video, &nodes.audio, video_convert, audio_convert)?;
            }
            IngestNodes::SemiAuto(nodes) => {
                self.attach_routes(
                    &nodes.source_bin,
                    &[
                        (MediaKind::Video, &nodes.video.queue),
                        (MediaKind::Audio, &nodes.audio.queue),
                    ],
                )?;
                self.attach_decoders(&nodes.video, &nodes.audio, video_convert, audio_convert)?;
            }
            IngestNodes::FullAuto(nodes) => {
                self.attach_routes(&nodes.video_intake, &[(MediaKind::Video, video_convert)])?;
                self.attach_routes(&nodes.audio_intake, &[(MediaKind::Audio, audio_convert)])?;
            }
        }
        Ok(())
    }

    fn attach_decoders(
        &mut self,
        video: &DecodeBranch<R::Node>,
        audio: &DecodeBranch<R::Node>,
        video_convert: &R::Node,
        audio_convert: &R::Node,
    ) -> Result<()> {
        self.attach_routes(&video.decoder, &[(MediaKind::Video, video_convert)])?;
        self.attach_routes(&audio.decoder, &[(MediaKind::Audio, audio_convert)])
    }

    /// Touches the returned monitor for every buffer leaving the muxer.
    fn activity_probe(&mut self, output: &OutputChain<R::Node>) -> Result<ActivityMonitor> {
        let activity = ActivityMonitor::new();
        match self.runtime.static_port(&output.mux, "src") {
            Some(port) => {
                let monitor = activity.clone();
                self.runtime
                    .add_data_probe(&port, Arc::new(move || monitor.touch()))?;
            }
            None => warn!("multiplexer has no static output port, activity is not tracked"),
        }
        Ok(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        assert_eq!(StrategyKind::from_config(None).unwrap(), StrategyKind::Manual);
        assert_eq!(StrategyKind::from_config(Some("  ")).unwrap(), StrategyKind::Manual);
        assert_eq!(
            StrategyKind::from_config(Some("souphttpsrc")).unwrap(),
            StrategyKind::Manual
        );
        assert_eq!(
            StrategyKind::from_config(Some("URISOURCEBIN")).unwrap(),
            StrategyKind::SemiAuto
        );
        assert_eq!(
            StrategyKind::from_config(Some("full-auto")).unwrap(),
            StrategyKind::FullAuto
        );
        assert_eq!(
            StrategyKind::from_config(Some("playbin3")).unwrap(),
            StrategyKind::FullAuto
        );
        assert!(matches!(
            StrategyKind::from_config(Some("decodebin3")),
            Err(Error::UnsupportedStrategy(name)) if name == "decodebin3"
        ));
        assert_eq!(StrategyKind::SemiAuto.to_string(), "semi-auto");
    }
}
