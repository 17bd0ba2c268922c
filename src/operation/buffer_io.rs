use crate::buffer::sampler::{EdgeMode, PixelSampler};
use crate::foundation::core::{DataType, Pixel, TRANSPARENT};
use crate::operation::core::{
    InputSocket, InputSockets, Operation, OperationRole, ResizeMode, TileData,
};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// Publishes the chunks of its input to the buffer cache. Roots an execution group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WriteBufferOperation {
    data_type: DataType,
}

impl WriteBufferOperation {
    /// Writer for a `data_type` producer.
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

impl Operation for WriteBufferOperation {
    fn name(&self) -> &str {
        "WriteBuffer"
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::new(self.data_type).with_resize(ResizeMode::None)]
    }

    fn output_type(&self) -> DataType {
        self.data_type
    }

    fn role(&self) -> OperationRole {
        OperationRole::WriteBuffer
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
        *out = inputs.read(0, x, y, sampler);
    }
}

/// Serves pixels from the region of a write buffer consolidated for the current chunk.
///
/// Socket 0 names the write buffer. Outside the consolidated region reads are zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReadBufferOperation {
    data_type: DataType,
}

impl ReadBufferOperation {
    /// Reader of a `data_type` write buffer.
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

impl Operation for ReadBufferOperation {
    fn name(&self) -> &str {
        "ReadBuffer"
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::new(self.data_type).with_resize(ResizeMode::None)]
    }

    fn output_type(&self) -> DataType {
        self.data_type
    }

    fn role(&self) -> OperationRole {
        OperationRole::ReadBuffer
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
        *out = match inputs.own_buffer() {
            Some(buf) => buf.read_sampled(x, y, sampler, EdgeMode::Zero, EdgeMode::Zero),
            None => TRANSPARENT,
        };
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/buffer_io.rs"]
mod tests;
