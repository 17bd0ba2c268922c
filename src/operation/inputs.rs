use crate::buffer::memory_buffer::MemoryBuffer;
use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{Pixel, Resolution};
use crate::operation::core::OperationId;
use crate::operation::graph::OperationGraph;
use std::collections::HashMap;

/// Consolidated input regions of one chunk, keyed by read-buffer operation.
pub type ReadBufferSet = HashMap<OperationId, MemoryBuffer>;

/// Read access to an operation's inputs while one of its pixels is computed.
///
/// Reading a socket evaluates the producer inline (recursively for simple producers) and
/// converts the result to the socket's data type. Unconnected sockets yield their default.
#[derive(Clone, Copy)]
pub struct PixelInputs<'a> {
    graph: &'a OperationGraph,
    op: OperationId,
    buffers: &'a ReadBufferSet,
}

impl<'a> PixelInputs<'a> {
    pub(crate) fn new(graph: &'a OperationGraph, op: OperationId, buffers: &'a ReadBufferSet) -> Self {
        Self { graph, op, buffers }
    }

    /// Operation whose pixel is being computed.
    pub fn operation(&self) -> OperationId {
        self.op
    }

    /// Read socket `input` at `(x, y)` in the producer's space.
    pub fn read(&self, input: usize, x: f32, y: f32, sampler: PixelSampler) -> Pixel {
        let Some(socket) = self.graph.sockets(self.op).get(input) else {
            return Pixel::default();
        };
        match self.graph.input(self.op, input) {
            Some(src) => {
                let px = self.graph.evaluate(src, x, y, sampler, self.buffers);
                self.graph.output_type(src).convert(socket.data_type, px)
            }
            None => socket.default,
        }
    }

    /// `true` when socket `input` has a producer.
    pub fn is_connected(&self, input: usize) -> bool {
        self.graph.input(self.op, input).is_some()
    }

    /// Consolidated buffer behind socket `input`, when its producer is a read buffer.
    pub fn buffer(&self, input: usize) -> Option<&'a MemoryBuffer> {
        let src = self.graph.input(self.op, input)?;
        self.buffers.get(&src)
    }

    /// Consolidated buffer of the current operation, for read-buffer operations.
    pub fn own_buffer(&self) -> Option<&'a MemoryBuffer> {
        self.buffers.get(&self.op)
    }

    /// Resolution of the current operation.
    pub fn resolution(&self) -> Resolution {
        self.graph.resolution(self.op)
    }

    /// Resolution of the producer behind socket `input`; zero when unconnected.
    pub fn input_resolution(&self, input: usize) -> Resolution {
        self.graph
            .input(self.op, input)
            .map(|src| self.graph.resolution(src))
            .unwrap_or_default()
    }
}
