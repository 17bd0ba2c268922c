use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel, Rect, Resolution, TRANSPARENT};
use crate::operation::inputs::PixelInputs;
use smallvec::SmallVec;
use std::any::Any;

/// Stable handle of an operation inside an [`crate::OperationGraph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationId(pub u32);

impl OperationId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// How an input socket reacts when its producer runs at a different resolution.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Read the producer as-is, in its own coordinate space.
    None,
    /// Centre the producer without scaling.
    #[default]
    Center,
    /// Scale uniformly so the producer fits, then centre.
    Fit,
    /// Scale each axis independently to fill.
    Stretch,
}

/// Declaration of one input socket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputSocket {
    /// Layout the operation expects to read.
    pub data_type: DataType,
    /// Resolution adaptation applied when the producer's resolution differs.
    pub resize_mode: ResizeMode,
    /// Value read when the socket is unconnected.
    pub default: Pixel,
}

impl InputSocket {
    /// Socket with a zero default and [`ResizeMode::Center`].
    pub const fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            resize_mode: ResizeMode::Center,
            default: TRANSPARENT,
        }
    }

    /// Single-channel socket defaulting to `v`.
    pub const fn value(v: f32) -> Self {
        Self::new(DataType::Value).with_default([v, 0.0, 0.0, 0.0])
    }

    /// Colour socket defaulting to `c`.
    pub const fn color(c: Pixel) -> Self {
        Self::new(DataType::Color).with_default(c)
    }

    /// Replace the default value.
    pub const fn with_default(mut self, default: Pixel) -> Self {
        self.default = default;
        self
    }

    /// Replace the resize mode.
    pub const fn with_resize(mut self, mode: ResizeMode) -> Self {
        self.resize_mode = mode;
        self
    }
}

/// Socket list returned by [`Operation::inputs`].
pub type InputSockets = SmallVec<[InputSocket; 4]>;

/// Engine-visible role of an operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum OperationRole {
    /// Ordinary pixel operation.
    #[default]
    Compute,
    /// Publishes its input's chunks to the buffer cache. Roots an execution group.
    WriteBuffer,
    /// Reads a consolidated region of a write buffer's published chunks.
    ReadBuffer,
    /// Resolution adapter inserted between mismatched sockets.
    Resample,
}

/// Resolved geometry of an operation, handed to area-of-interest queries.
#[derive(Clone, Debug, PartialEq)]
pub struct OpShape {
    /// The operation's own resolution.
    pub resolution: Resolution,
    /// Resolution of each input's producer; zero for unconnected sockets.
    pub input_resolutions: SmallVec<[Resolution; 4]>,
}

impl OpShape {
    /// Resolution of input `i`, zero if out of range or unconnected.
    pub fn input(&self, i: usize) -> Resolution {
        self.input_resolutions.get(i).copied().unwrap_or_default()
    }
}

/// Opaque per-tile state produced by [`Operation::initialize_tile_data`].
pub type TileData = Box<dyn Any + Send + Sync>;

/// A node of the execution graph.
///
/// Simple operations are evaluated inline, pixel by pixel, from whatever consumes them. Complex
/// operations are evaluated once per chunk into a cached buffer and may keep per-tile state.
/// Pixel functions never fail: unusable input degrades to defaults or zero.
pub trait Operation: Send + Sync + std::fmt::Debug {
    /// Short type name used in logs and graph dumps.
    fn name(&self) -> &str;

    /// Input socket declarations, in socket order.
    fn inputs(&self) -> InputSockets;

    /// Layout of the single output.
    fn output_type(&self) -> DataType;

    /// Tile-based, cacheable operation.
    fn is_complex(&self) -> bool {
        false
    }

    /// Engine role. Only the built-in adapters override this.
    fn role(&self) -> OperationRole {
        OperationRole::Compute
    }

    /// `true` when this operation produces a final output for the given run mode.
    fn is_output(&self, _rendering: bool) -> bool {
        false
    }

    /// Label of the produced output, for output operations.
    fn output_name(&self) -> Option<&str> {
        None
    }

    /// Scheduling priority of an output, `0..=9`, higher first.
    fn render_priority(&self) -> u8 {
        0
    }

    /// Socket whose producer's resolution drives [`Operation::determine_resolution`].
    fn resolution_input(&self) -> usize {
        0
    }

    /// Pick this operation's resolution.
    ///
    /// `main_input` is the resolved resolution of the driving input, if one is connected.
    /// `preferred` is what the consumer would like. Follows the driving input by default.
    fn determine_resolution(&self, main_input: Option<Resolution>, preferred: Resolution) -> Resolution {
        match main_input {
            Some(res) if !res.is_zero() => res,
            _ => preferred,
        }
    }

    /// Region of input `input` needed to compute `output`. Must be a pure function.
    fn depending_area_of_interest(&self, _input: usize, output: Rect, _shape: &OpShape) -> Rect {
        output
    }

    /// Prepare per-tile state before the pixels of `rect` are computed.
    fn initialize_tile_data(&self, _rect: Rect, _inputs: &PixelInputs<'_>) -> Option<TileData> {
        None
    }

    /// Compute one output pixel at `(x, y)` in this operation's space.
    fn execute_pixel(
        &self,
        out: &mut Pixel,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        inputs: &PixelInputs<'_>,
        tile: Option<&TileData>,
    );

    /// Release per-tile state.
    fn deinitialize_tile_data(&self, _tile: TileData) {}
}

#[cfg(test)]
#[path = "../../tests/unit/operation/core.rs"]
mod tests;
