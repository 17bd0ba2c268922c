use crate::buffer::memory_buffer::MemoryBuffer;
use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel, Rect, Resolution};
use crate::foundation::error::{TilecompError, TilecompResult};
use crate::nodes::desc::{NodeDesc, NodeGraphDesc};
use crate::operation::blur::{BlurAxis, GaussianBlurOperation};
use crate::operation::constant::{ConstantColorOperation, ConstantValueOperation};
use crate::operation::core::{OperationId, ResizeMode};
use crate::operation::downsample::DownsampleOperation;
use crate::operation::flip::FlipOperation;
use crate::operation::graph::OperationGraph;
use crate::operation::id_mask::IdMaskOperation;
use crate::operation::image_input::ImageOperation;
use crate::operation::math::{MathFunction, MathOperation};
use crate::operation::mix::{MixBlend, MixOperation};
use crate::operation::output::{OutputKind, OutputOperation};
use crate::operation::resample::ResampleOperation;
use crate::operation::shape_mask::{MaskGeometry, MaskMode, MaskShape, ShapeMaskOperation};
use crate::operation::transform::{TransformOperation, TransformParams};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Operations one node expands into.
///
/// Socket `n` of the node is socket `n` of `entry`; the node's output is `output`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodePorts {
    /// Operation receiving the node's inputs.
    pub entry: OperationId,
    /// Operation producing the node's output.
    pub output: OperationId,
}

impl NodePorts {
    /// Node backed by a single operation.
    pub fn single(id: OperationId) -> Self {
        Self {
            entry: id,
            output: id,
        }
    }
}

/// Build-time context handed to node builders.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeContext<'a> {
    base_dir: Option<&'a Path>,
}

impl NodeContext<'_> {
    /// Resolve a path parameter against the description's directory.
    pub fn resolve_path(&self, p: &str) -> PathBuf {
        let path = Path::new(p);
        match self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Adds the operations for one node to the graph.
pub type NodeBuilder =
    fn(&NodeDesc, &NodeContext<'_>, &mut OperationGraph) -> TilecompResult<NodePorts>;

/// Operation graph built from a [`NodeGraphDesc`], with the ports of every node.
#[derive(Debug)]
pub struct BuiltGraph {
    /// The operation graph.
    pub graph: OperationGraph,
    /// Ports by node id.
    pub nodes: BTreeMap<String, NodePorts>,
}

/// Maps node type names to builders.
#[derive(Clone, Debug, Default)]
pub struct NodeRegistry {
    builders: BTreeMap<String, NodeBuilder>,
}

fn params<T: DeserializeOwned>(node: &NodeDesc) -> TilecompResult<T> {
    let value = if node.params.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        node.params.clone()
    };
    serde_json::from_value(value).map_err(|e| {
        TilecompError::validation(format!("node '{}' ({}): bad params: {e}", node.id, node.kind))
    })
}

fn default_color_type() -> DataType {
    DataType::Color
}

fn default_bilinear() -> PixelSampler {
    PixelSampler::Bilinear
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ValueParams {
    #[serde(default)]
    value: f32,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ColorParams {
    #[serde(default = "opaque_black")]
    color: Pixel,
}

fn opaque_black() -> Pixel {
    [0.0, 0.0, 0.0, 1.0]
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageParams {
    path: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default = "default_color_type")]
    data_type: DataType,
    #[serde(default)]
    data: Vec<f32>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct MathParams {
    function: MathFunction,
    #[serde(default = "half")]
    a: f32,
    #[serde(default = "half")]
    b: f32,
    #[serde(default)]
    clamp: bool,
}

fn half() -> f32 {
    0.5
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct MixParams {
    #[serde(default)]
    blend: MixBlend,
    #[serde(default)]
    use_alpha: bool,
    #[serde(default)]
    clamp: bool,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct FlipParams {
    #[serde(default = "default_color_type")]
    data_type: DataType,
    #[serde(default)]
    x: bool,
    #[serde(default)]
    y: bool,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct IdMaskParams {
    index: u32,
}

#[derive(serde::Deserialize)]
struct MaskParams {
    #[serde(default)]
    mode: MaskMode,
    #[serde(flatten)]
    geometry: MaskGeometry,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct BlurParams {
    #[serde(default)]
    size: f32,
    size_x: Option<f32>,
    size_y: Option<f32>,
    #[serde(default = "default_color_type")]
    data_type: DataType,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DownsampleParams {
    #[serde(default = "two")]
    factor: u32,
    #[serde(default = "default_color_type")]
    data_type: DataType,
}

fn two() -> u32 {
    2
}

#[derive(serde::Deserialize)]
struct TransformNodeParams {
    #[serde(flatten)]
    transform: TransformParams,
    #[serde(default = "default_bilinear")]
    sampler: PixelSampler,
    #[serde(default = "default_color_type")]
    data_type: DataType,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ResampleParams {
    width: u32,
    height: u32,
    #[serde(default)]
    mode: ResizeMode,
    #[serde(default = "default_bilinear")]
    sampler: PixelSampler,
    #[serde(default = "default_color_type")]
    data_type: DataType,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct OutputParams {
    label: Option<String>,
    #[serde(default)]
    priority: u8,
}

fn build_value(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: ValueParams = params(node)?;
    Ok(NodePorts::single(g.add_operation(ConstantValueOperation::new(p.value))))
}

fn build_rgb(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: ColorParams = params(node)?;
    Ok(NodePorts::single(g.add_operation(ConstantColorOperation::new(p.color))))
}

fn build_image(node: &NodeDesc, ctx: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: ImageParams = params(node)?;
    let op = match p.path {
        Some(path) => ImageOperation::load(&ctx.resolve_path(&path))?,
        None => {
            Resolution::non_zero(p.width, p.height)?;
            let rect = Rect::from_size(p.width, p.height);
            ImageOperation::new(MemoryBuffer::from_data(p.data_type, rect, p.data)?)?
        }
    };
    Ok(NodePorts::single(g.add_operation(op)))
}

fn build_math(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: MathParams = params(node)?;
    let op = MathOperation::new(p.function)
        .with_defaults(p.a, p.b)
        .with_clamp(p.clamp);
    Ok(NodePorts::single(g.add_operation(op)))
}

fn build_mix(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: MixParams = params(node)?;
    let op = MixOperation::new(p.blend)
        .with_alpha(p.use_alpha)
        .with_clamp(p.clamp);
    Ok(NodePorts::single(g.add_operation(op)))
}

fn build_flip(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: FlipParams = params(node)?;
    Ok(NodePorts::single(
        g.add_operation(FlipOperation::new(p.data_type, p.x, p.y)),
    ))
}

fn build_id_mask(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: IdMaskParams = params(node)?;
    Ok(NodePorts::single(g.add_operation(IdMaskOperation::new(p.index))))
}

fn build_mask(shape: MaskShape, node: &NodeDesc, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: MaskParams = params(node)?;
    Ok(NodePorts::single(
        g.add_operation(ShapeMaskOperation::new(shape, p.mode, p.geometry)),
    ))
}

fn build_box_mask(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    build_mask(MaskShape::Box, node, g)
}

fn build_ellipse_mask(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    build_mask(MaskShape::Ellipse, node, g)
}

fn build_blur(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: BlurParams = params(node)?;
    let x = g.add_operation(GaussianBlurOperation::new(
        BlurAxis::X,
        p.data_type,
        p.size_x.unwrap_or(p.size),
    ));
    let y = g.add_operation(GaussianBlurOperation::new(
        BlurAxis::Y,
        p.data_type,
        p.size_y.unwrap_or(p.size),
    ));
    g.connect(x, y, 0)?;
    Ok(NodePorts { entry: x, output: y })
}

fn build_downsample(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: DownsampleParams = params(node)?;
    if p.factor == 0 {
        return Err(TilecompError::validation(format!(
            "node '{}': downsample factor must be >= 1",
            node.id
        )));
    }
    Ok(NodePorts::single(
        g.add_operation(DownsampleOperation::new(p.data_type, p.factor)),
    ))
}

fn build_transform(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: TransformNodeParams = params(node)?;
    Ok(NodePorts::single(g.add_operation(TransformOperation::new(
        p.data_type,
        p.transform,
        p.sampler,
    ))))
}

fn build_resample(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: ResampleParams = params(node)?;
    let target = Resolution::non_zero(p.width, p.height)?;
    let op = ResampleOperation::new(p.data_type, p.mode, target).with_sampler(p.sampler);
    Ok(NodePorts::single(g.add_operation(op)))
}

fn build_output(kind: OutputKind, node: &NodeDesc, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    let p: OutputParams = params(node)?;
    let op = match p.label {
        Some(label) => OutputOperation::new(kind, label),
        None if kind == OutputKind::Viewer => OutputOperation::viewer(),
        None => OutputOperation::composite(),
    };
    Ok(NodePorts::single(g.add_operation(op.with_priority(p.priority))))
}

fn build_composite(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    build_output(OutputKind::Composite, node, g)
}

fn build_viewer(node: &NodeDesc, _: &NodeContext<'_>, g: &mut OperationGraph) -> TilecompResult<NodePorts> {
    build_output(OutputKind::Viewer, node, g)
}

impl NodeRegistry {
    /// Registry without any node types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in node type.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register("value", build_value);
        r.register("rgb", build_rgb);
        r.register("image", build_image);
        r.register("math", build_math);
        r.register("mix", build_mix);
        r.register("flip", build_flip);
        r.register("id_mask", build_id_mask);
        r.register("box_mask", build_box_mask);
        r.register("ellipse_mask", build_ellipse_mask);
        r.register("blur", build_blur);
        r.register("downsample", build_downsample);
        r.register("transform", build_transform);
        r.register("resample", build_resample);
        r.register("composite", build_composite);
        r.register("viewer", build_viewer);
        r
    }

    /// Add or replace the builder for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, builder: NodeBuilder) {
        self.builders.insert(kind.into(), builder);
    }

    /// `true` when `kind` has a builder.
    pub fn contains(&self, kind: &str) -> bool {
        self.builders.contains_key(kind)
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> + '_ {
        self.builders.keys().map(String::as_str)
    }

    /// Convert a description into an operation graph.
    ///
    /// Unknown node types, duplicate node ids, links naming unknown nodes and out-of-range
    /// sockets are errors. Links that would close a cycle or target an already linked socket
    /// are skipped with a warning.
    #[tracing::instrument(skip_all, fields(nodes = desc.nodes.len(), links = desc.links.len()))]
    pub fn build(&self, desc: &NodeGraphDesc, base_dir: Option<&Path>) -> TilecompResult<BuiltGraph> {
        let ctx = NodeContext { base_dir };
        let mut graph = OperationGraph::new();
        let mut nodes = BTreeMap::new();

        for node in &desc.nodes {
            let builder = self.builders.get(&node.kind).ok_or_else(|| {
                TilecompError::validation(format!(
                    "node '{}': unknown node type '{}'",
                    node.id, node.kind
                ))
            })?;
            if nodes.contains_key(&node.id) {
                return Err(TilecompError::validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
            let ports = builder(node, &ctx, &mut graph)?;
            nodes.insert(node.id.clone(), ports);
        }

        for link in &desc.links {
            let lookup = |id: &str| {
                nodes.get(id).copied().ok_or_else(|| {
                    TilecompError::validation(format!("link references unknown node '{id}'"))
                })
            };
            let from = lookup(&link.from)?;
            let to = lookup(&link.to)?;
            let sockets = graph.sockets(to.entry).len();
            if link.socket >= sockets {
                return Err(TilecompError::validation(format!(
                    "link {} -> {}: node has {sockets} sockets, got socket {}",
                    link.from, link.to, link.socket
                )));
            }
            if graph.input(to.entry, link.socket).is_some() {
                tracing::warn!(
                    from = %link.from,
                    to = %link.to,
                    socket = link.socket,
                    "socket already linked; skipping link"
                );
                continue;
            }
            if let Err(e) = graph.connect(from.output, to.entry, link.socket) {
                tracing::warn!(from = %link.from, to = %link.to, error = %e, "skipping link");
            }
        }

        tracing::debug!(operations = graph.len(), "node graph built");
        Ok(BuiltGraph { graph, nodes })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/nodes/registry.rs"]
mod tests;
