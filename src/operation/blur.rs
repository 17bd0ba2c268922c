use crate::buffer::memory_buffer::MemoryBuffer;
use crate::buffer::sampler::{EdgeMode, PixelSampler};
use crate::foundation::core::{DataType, Pixel, Rect, TRANSPARENT};
use crate::operation::core::{InputSocket, InputSockets, OpShape, Operation, TileData};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// Direction of one separable blur pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurAxis {
    /// Horizontal pass.
    X,
    /// Vertical pass.
    Y,
}

/// One pass of a separable Gaussian blur.
///
/// Complex: each chunk first blurs its whole rect into tile data, then pixels are served from it.
/// Taps past the image border repeat the edge pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct GaussianBlurOperation {
    axis: BlurAxis,
    data_type: DataType,
    radius: i32,
    kernel: Vec<f32>,
}

impl GaussianBlurOperation {
    /// Blur pass of `size` pixels (kernel radius) along `axis`.
    pub fn new(axis: BlurAxis, data_type: DataType, size: f32) -> Self {
        let size = if size.is_finite() { size.max(0.0) } else { 0.0 };
        let radius = size.ceil() as i32;
        Self {
            axis,
            data_type,
            radius,
            kernel: gaussian_kernel(radius, size),
        }
    }

    /// Kernel radius in pixels.
    pub fn radius(&self) -> i32 {
        self.radius
    }

    fn blur_tile(&self, rect: Rect, inputs: &PixelInputs<'_>) -> MemoryBuffer {
        let mut tile = MemoryBuffer::new(self.data_type, rect);
        let res = inputs.input_resolution(0);
        let (w, h) = (res.width as i32, res.height as i32);
        let buffer = inputs.buffer(0);
        for y in rect.ymin..rect.ymax {
            for x in rect.xmin..rect.xmax {
                let mut acc = TRANSPARENT;
                for (k, weight) in self.kernel.iter().enumerate() {
                    let d = k as i32 - self.radius;
                    let (sx, sy) = match self.axis {
                        BlurAxis::X => (clamp_tap(x + d, w), y),
                        BlurAxis::Y => (x, clamp_tap(y + d, h)),
                    };
                    let px = match buffer {
                        Some(b) => b.read(sx, sy, EdgeMode::Clamp, EdgeMode::Clamp),
                        None => inputs.read(0, sx as f32, sy as f32, PixelSampler::Nearest),
                    };
                    for c in 0..4 {
                        acc[c] += px[c] * weight;
                    }
                }
                tile.write_pixel(x, y, &acc);
            }
        }
        tile
    }
}

fn clamp_tap(v: i32, len: i32) -> i32 {
    if len <= 0 { v } else { v.clamp(0, len - 1) }
}

fn gaussian_kernel(radius: i32, size: f32) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = (size / 2.0).max(0.5);
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|d| {
            let d = d as f32;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in &mut kernel {
        *w /= sum;
    }
    kernel
}

impl Operation for GaussianBlurOperation {
    fn name(&self) -> &str {
        match self.axis {
            BlurAxis::X => "GaussianBlurX",
            BlurAxis::Y => "GaussianBlurY",
        }
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::new(self.data_type)]
    }

    fn output_type(&self) -> DataType {
        self.data_type
    }

    fn is_complex(&self) -> bool {
        true
    }

    fn depending_area_of_interest(&self, _input: usize, output: Rect, _shape: &OpShape) -> Rect {
        match self.axis {
            BlurAxis::X => output.expand(self.radius, 0),
            BlurAxis::Y => output.expand(0, self.radius),
        }
    }

    fn initialize_tile_data(&self, rect: Rect, inputs: &PixelInputs<'_>) -> Option<TileData> {
        Some(Box::new(self.blur_tile(rect, inputs)))
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        _inputs: &PixelInputs<'_>,
        tile: Option<&TileData>,
    ) {
        *out = match tile.and_then(|t| t.downcast_ref::<MemoryBuffer>()) {
            Some(buf) => buf.read_sampled(x, y, sampler, EdgeMode::Clamp, EdgeMode::Clamp),
            None => TRANSPARENT,
        };
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/blur.rs"]
mod tests;
