use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel};
use crate::operation::core::{InputSockets, Operation, TileData};
use crate::operation::inputs::PixelInputs;

/// Single value everywhere. Takes the resolution its consumer prefers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantValueOperation {
    /// Emitted value.
    pub value: f32,
}

impl ConstantValueOperation {
    /// Constant `value`.
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Operation for ConstantValueOperation {
    fn name(&self) -> &str {
        "ConstantValue"
    }

    fn inputs(&self) -> InputSockets {
        InputSockets::new()
    }

    fn output_type(&self) -> DataType {
        DataType::Value
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        _x: f32,
        _y: f32,
        _sampler: PixelSampler,
        _inputs: &PixelInputs<'_>,
        _tile: Option<&TileData>,
    ) {
        out[0] = self.value;
    }
}

/// Single RGBA colour everywhere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantColorOperation {
    /// Emitted colour (straight alpha).
    pub color: Pixel,
}

impl ConstantColorOperation {
    /// Constant `color`.
    pub fn new(color: Pixel) -> Self {
        Self { color }
    }
}

impl Operation for ConstantColorOperation {
    fn name(&self) -> &str {
        "ConstantColor"
    }

    fn inputs(&self) -> InputSockets {
        InputSockets::new()
    }

    fn output_type(&self) -> DataType {
        DataType::Color
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        _x: f32,
        _y: f32,
        _sampler: PixelSampler,
        _inputs: &PixelInputs<'_>,
        _tile: Option<&TileData>,
    ) {
        *out = self.color;
    }
}
