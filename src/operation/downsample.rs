use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel, Rect, Resolution, TRANSPARENT};
use crate::operation::core::{InputSocket, InputSockets, OpShape, Operation, ResizeMode, TileData};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// Integer box-filter downscale. Output resolution is the input's divided by `factor`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DownsampleOperation {
    data_type: DataType,
    factor: u32,
}

impl DownsampleOperation {
    /// Downscale by `factor` (clamped to at least 1).
    pub fn new(data_type: DataType, factor: u32) -> Self {
        Self {
            data_type,
            factor: factor.max(1),
        }
    }

    fn factor_i32(&self) -> i32 {
        i32::try_from(self.factor).unwrap_or(i32::MAX)
    }
}

impl Operation for DownsampleOperation {
    fn name(&self) -> &str {
        "Downsample"
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::new(self.data_type).with_resize(ResizeMode::None)]
    }

    fn output_type(&self) -> DataType {
        self.data_type
    }

    fn is_complex(&self) -> bool {
        true
    }

    fn determine_resolution(&self, main_input: Option<Resolution>, preferred: Resolution) -> Resolution {
        let src = match main_input {
            Some(r) if !r.is_zero() => r,
            _ => preferred,
        };
        Resolution::new(
            src.width.div_ceil(self.factor).max(1),
            src.height.div_ceil(self.factor).max(1),
        )
    }

    fn depending_area_of_interest(&self, _input: usize, output: Rect, _shape: &OpShape) -> Rect {
        let f = self.factor_i32();
        Rect::new(
            output.xmin.saturating_mul(f),
            output.ymin.saturating_mul(f),
            output.xmax.saturating_mul(f),
            output.ymax.saturating_mul(f),
        )
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
        let f = self.factor_i32();
        let src = inputs.input_resolution(0);
        let x0 = (x.floor() as i32).saturating_mul(f);
        let y0 = (y.floor() as i32).saturating_mul(f);
        let area = Rect::new(x0, y0, x0.saturating_add(f), y0.saturating_add(f));
        let Some(area) = area.intersect(&src.rect()) else {
            *out = TRANSPARENT;
            return;
        };

        let mut acc = TRANSPARENT;
        for sy in area.ymin..area.ymax {
            for sx in area.xmin..area.xmax {
                let px = inputs.read(0, sx as f32, sy as f32, PixelSampler::Nearest);
                for c in 0..4 {
                    acc[c] += px[c];
                }
            }
        }
        let n = area.area() as f32;
        for (o, a) in out.iter_mut().zip(acc) {
            *o = a / n;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/downsample.rs"]
mod tests;
