use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel, Rect};
use crate::operation::core::{InputSocket, InputSockets, OpShape, Operation, TileData};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// Mirror the input horizontally and/or vertically.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlipOperation {
    data_type: DataType,
    flip_x: bool,
    flip_y: bool,
}

impl FlipOperation {
    /// Flip of a `data_type` input.
    pub fn new(data_type: DataType, flip_x: bool, flip_y: bool) -> Self {
        Self {
            data_type,
            flip_x,
            flip_y,
        }
    }
}

impl Operation for FlipOperation {
    fn name(&self) -> &str {
        "Flip"
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::new(self.data_type)]
    }

    fn output_type(&self) -> DataType {
        self.data_type
    }

    fn depending_area_of_interest(&self, _input: usize, output: Rect, shape: &OpShape) -> Rect {
        let w = i32::try_from(shape.resolution.width).unwrap_or(i32::MAX);
        let h = i32::try_from(shape.resolution.height).unwrap_or(i32::MAX);
        let (xmin, xmax) = if self.flip_x {
            (w - output.xmax, w - output.xmin)
        } else {
            (output.xmin, output.xmax)
        };
        let (ymin, ymax) = if self.flip_y {
            (h - output.ymax, h - output.ymin)
        } else {
            (output.ymin, output.ymax)
        };
        Rect::new(xmin, ymin, xmax, ymax)
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        inputs: &PixelInputs<'_>,
        _tile: Option<&TileData>,
    ) {
        let res = inputs.resolution();
        let nx = if self.flip_x { res.width as f32 - 1.0 - x } else { x };
        let ny = if self.flip_y { res.height as f32 - 1.0 - y } else { y };
        *out = inputs.read(0, nx, ny, sampler);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/flip.rs"]
mod tests;
