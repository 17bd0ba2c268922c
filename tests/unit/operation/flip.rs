use super::*;
use crate::buffer::memory_buffer::MemoryBuffer;
use crate::foundation::core::Resolution;
use crate::operation::graph::OperationGraph;
use crate::operation::image_input::ImageOperation;
use crate::operation::inputs::ReadBufferSet;

fn flipped(flip_x: bool, flip_y: bool) -> Vec<f32> {
    let data = (1..=8).map(|v| v as f32).collect();
    let buf = MemoryBuffer::from_data(DataType::Value, Rect::new(0, 0, 4, 2), data).unwrap();
    let mut g = OperationGraph::new();
    let img = g.add_operation(ImageOperation::new(buf).unwrap());
    let flip = g.add_operation(FlipOperation::new(DataType::Value, flip_x, flip_y));
    g.connect(img, flip, 0).unwrap();
    g.set_resolution(img, Resolution::new(4, 2));
    g.set_resolution(flip, Resolution::new(4, 2));
    let buffers = ReadBufferSet::new();
    let mut out = Vec::new();
    for y in 0..2 {
        for x in 0..4 {
            out.push(g.evaluate(flip, x as f32, y as f32, PixelSampler::Nearest, &buffers)[0]);
        }
    }
    out
}

#[test]
fn flips_each_axis() {
    assert_eq!(flipped(true, false), vec![4.0, 3.0, 2.0, 1.0, 8.0, 7.0, 6.0, 5.0]);
    assert_eq!(flipped(false, true), vec![5.0, 6.0, 7.0, 8.0, 1.0, 2.0, 3.0, 4.0]);
    assert_eq!(flipped(true, true), vec![8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
}

#[test]
fn area_of_interest_mirrors_the_rect() {
    let op = FlipOperation::new(DataType::Color, true, false);
    let shape = OpShape {
        resolution: Resolution::new(10, 4),
        input_resolutions: smallvec![Resolution::new(10, 4)],
    };
    let area = op.depending_area_of_interest(0, Rect::new(0, 1, 3, 2), &shape);
    assert_eq!(area, Rect::new(7, 1, 10, 2));
    // Pure: same answer twice.
    assert_eq!(op.depending_area_of_interest(0, Rect::new(0, 1, 3, 2), &shape), area);
}
