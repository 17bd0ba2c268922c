use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel};
use crate::operation::core::{InputSocket, InputSockets, Operation, TileData};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// `1` where the input equals the object index, `0` elsewhere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IdMaskOperation {
    index: f32,
}

impl IdMaskOperation {
    /// Mask selecting `object_index`.
    pub fn new(object_index: u32) -> Self {
        Self {
            index: object_index as f32,
        }
    }
}

impl Operation for IdMaskOperation {
    fn name(&self) -> &str {
        "IdMask"
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::value(0.0)]
    }

    fn output_type(&self) -> DataType {
        DataType::Value
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
        // Index passes are id-valued; interpolating them would invent ids.
        let v = inputs.read(0, x, y, PixelSampler::Nearest)[0];
        out[0] = if v == self.index { 1.0 } else { 0.0 };
    }
}
