use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel, Rect, Resolution, TRANSPARENT};
use crate::operation::core::{
    InputSocket, InputSockets, OpShape, Operation, OperationRole, ResizeMode, TileData,
};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// Resolution adapter spliced between a producer and a consumer that disagree on size.
///
/// Maps pixel centres: `in = (out + 0.5 - c_out) / s + c_in - 0.5`, where `s` is chosen by the
/// resize mode and `c` are the frame centres. Reads outside the producer are zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResampleOperation {
    data_type: DataType,
    mode: ResizeMode,
    target: Resolution,
    sampler: PixelSampler,
}

impl ResampleOperation {
    /// Adapter producing `target` from a `data_type` input.
    pub fn new(data_type: DataType, mode: ResizeMode, target: Resolution) -> Self {
        Self {
            data_type,
            mode,
            target,
            sampler: PixelSampler::Bilinear,
        }
    }

    /// Override the interpolation used on the producer.
    pub fn with_sampler(mut self, sampler: PixelSampler) -> Self {
        self.sampler = sampler;
        self
    }

    fn scale(&self, src: Resolution) -> (f32, f32) {
        if src.is_zero() || self.target.is_zero() {
            return (1.0, 1.0);
        }
        let sx = self.target.width as f32 / src.width as f32;
        let sy = self.target.height as f32 / src.height as f32;
        match self.mode {
            ResizeMode::None | ResizeMode::Center => (1.0, 1.0),
            ResizeMode::Fit => {
                let s = sx.min(sy);
                (s, s)
            }
            ResizeMode::Stretch => (sx, sy),
        }
    }

    fn to_input(&self, x: f32, y: f32, src: Resolution) -> (f32, f32) {
        let (sx, sy) = self.scale(src);
        let cx_out = self.target.width as f32 * 0.5;
        let cy_out = self.target.height as f32 * 0.5;
        let cx_in = src.width as f32 * 0.5;
        let cy_in = src.height as f32 * 0.5;
        (
            (x + 0.5 - cx_out) / sx + cx_in - 0.5,
            (y + 0.5 - cy_out) / sy + cy_in - 0.5,
        )
    }
}

impl Operation for ResampleOperation {
    fn name(&self) -> &str {
        "Resample"
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::new(self.data_type).with_resize(ResizeMode::None)]
    }

    fn output_type(&self) -> DataType {
        self.data_type
    }

    fn role(&self) -> OperationRole {
        OperationRole::Resample
    }

    fn determine_resolution(&self, _main_input: Option<Resolution>, _preferred: Resolution) -> Resolution {
        self.target
    }

    fn depending_area_of_interest(&self, _input: usize, output: Rect, shape: &OpShape) -> Rect {
        let src = shape.input(0);
        let (x0, y0) = self.to_input(output.xmin as f32, output.ymin as f32, src);
        let (x1, y1) = self.to_input(output.xmax as f32, output.ymax as f32, src);
        Rect::covering(
            f64::from(x0.min(x1)),
            f64::from(y0.min(y1)),
            f64::from(x0.max(x1)),
            f64::from(y0.max(y1)),
        )
        .expand(2, 2)
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        x: f32,
        y: f32,
        _sampler: PixelSampler,
        inputs: &PixelInputs<'_>,
        _tile: Option<&TileData>,
    ) {
        let src = inputs.input_resolution(0);
        let (ix, iy) = self.to_input(x, y, src);
        if ix < -0.5 || iy < -0.5 || ix >= src.width as f32 - 0.5 || iy >= src.height as f32 - 0.5 {
            *out = TRANSPARENT;
            return;
        }
        *out = inputs.read(0, ix, iy, self.sampler);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/resample.rs"]
mod tests;
