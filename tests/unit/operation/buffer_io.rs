use super::*;
use crate::buffer::memory_buffer::MemoryBuffer;
use crate::foundation::core::Rect;
use crate::operation::constant::ConstantValueOperation;
use crate::operation::graph::OperationGraph;
use crate::operation::inputs::ReadBufferSet;

#[test]
fn read_buffer_serves_its_consolidated_region() {
    let mut g = OperationGraph::new();
    let src = g.add_operation(ConstantValueOperation::new(9.0));
    let write = g.add_operation(WriteBufferOperation::new(DataType::Value));
    let read = g.add_operation(ReadBufferOperation::new(DataType::Value));
    g.connect(src, write, 0).unwrap();
    g.connect(write, read, 0).unwrap();
    assert_eq!(g.role(write), OperationRole::WriteBuffer);
    assert_eq!(g.role(read), OperationRole::ReadBuffer);

    let mut buffers = ReadBufferSet::new();
    let region = MemoryBuffer::filled(DataType::Value, Rect::new(2, 2, 4, 4), [3.0, 0.0, 0.0, 0.0]);
    buffers.insert(read, region);

    let inputs = PixelInputs::new(&g, read, &buffers);
    let op = g.operation(read).unwrap();
    let mut px = TRANSPARENT;
    op.execute_pixel(&mut px, 3.0, 2.0, PixelSampler::Nearest, &inputs, None);
    assert_eq!(px[0], 3.0);
    op.execute_pixel(&mut px, 0.0, 0.0, PixelSampler::Nearest, &inputs, None);
    assert_eq!(px, TRANSPARENT, "outside the region reads zero, never the producer");
}

#[test]
fn read_buffer_without_data_is_transparent() {
    let mut g = OperationGraph::new();
    let read = g.add_operation(ReadBufferOperation::new(DataType::Color));
    let buffers = ReadBufferSet::new();
    let inputs = PixelInputs::new(&g, read, &buffers);
    let mut px = [1.0; 4];
    g.operation(read)
        .unwrap()
        .execute_pixel(&mut px, 0.0, 0.0, PixelSampler::Bilinear, &inputs, None);
    assert_eq!(px, TRANSPARENT);
}

#[test]
fn write_buffer_passes_through() {
    let mut g = OperationGraph::new();
    let src = g.add_operation(ConstantValueOperation::new(0.5));
    let write = g.add_operation(WriteBufferOperation::new(DataType::Value));
    g.connect(src, write, 0).unwrap();
    let buffers = ReadBufferSet::new();
    let inputs = PixelInputs::new(&g, write, &buffers);
    let mut px = TRANSPARENT;
    g.operation(write)
        .unwrap()
        .execute_pixel(&mut px, 1.0, 1.0, PixelSampler::Nearest, &inputs, None);
    assert_eq!(px[0], 0.5);
}
