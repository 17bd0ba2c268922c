use super::*;
use crate::foundation::core::Resolution;
use crate::operation::graph::OperationGraph;
use crate::operation::image_input::ImageOperation;
use crate::operation::inputs::ReadBufferSet;
use crate::operation::core::OperationId;

fn impulse_graph(axis: BlurAxis, size: f32) -> (OperationGraph, OperationId) {
    let mut buf = MemoryBuffer::new(DataType::Value, Rect::new(0, 0, 9, 9));
    buf.write_pixel(4, 4, &[1.0, 0.0, 0.0, 0.0]);
    let mut g = OperationGraph::new();
    let img = g.add_operation(ImageOperation::new(buf).unwrap());
    let blur = g.add_operation(GaussianBlurOperation::new(axis, DataType::Value, size));
    g.connect(img, blur, 0).unwrap();
    g.set_resolution(img, Resolution::new(9, 9));
    g.set_resolution(blur, Resolution::new(9, 9));
    (g, blur)
}

fn run_tile(g: &OperationGraph, op: OperationId, rect: Rect) -> MemoryBuffer {
    let buffers = ReadBufferSet::new();
    let inputs = PixelInputs::new(g, op, &buffers);
    let blur = g.operation(op).unwrap();
    let tile = blur.initialize_tile_data(rect, &inputs);
    let mut out = MemoryBuffer::new(DataType::Value, rect);
    for y in rect.ymin..rect.ymax {
        for x in rect.xmin..rect.xmax {
            let mut px = TRANSPARENT;
            blur.execute_pixel(&mut px, x as f32, y as f32, PixelSampler::Nearest, &inputs, tile.as_ref());
            out.write_pixel(x, y, &px);
        }
    }
    if let Some(t) = tile {
        blur.deinitialize_tile_data(t);
    }
    out
}

#[test]
fn kernel_is_normalized_and_symmetric() {
    let op = GaussianBlurOperation::new(BlurAxis::X, DataType::Color, 3.0);
    assert_eq!(op.radius(), 3);
    let sum: f32 = op.kernel.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
    assert_eq!(op.kernel.len(), 7);
    assert!((op.kernel[0] - op.kernel[6]).abs() < 1e-7);
    assert!(op.kernel[3] > op.kernel[2]);
}

#[test]
fn horizontal_pass_spreads_only_along_x() {
    let (g, blur) = impulse_graph(BlurAxis::X, 2.0);
    let out = run_tile(&g, blur, Rect::new(0, 0, 9, 9));
    let row_sum: f32 = (0..9).map(|x| out.read(x, 4, EdgeMode::Zero, EdgeMode::Zero)[0]).sum();
    assert!((row_sum - 1.0).abs() < 1e-5);
    assert!(out.read(3, 4, EdgeMode::Zero, EdgeMode::Zero)[0] > 0.0);
    assert_eq!(out.read(4, 3, EdgeMode::Zero, EdgeMode::Zero)[0], 0.0);
}

#[test]
fn sub_tile_matches_full_tile() {
    let (g, blur) = impulse_graph(BlurAxis::Y, 2.0);
    let full = run_tile(&g, blur, Rect::new(0, 0, 9, 9));
    let part = run_tile(&g, blur, Rect::new(3, 2, 6, 5));
    for y in 2..5 {
        for x in 3..6 {
            assert_eq!(
                part.read(x, y, EdgeMode::Zero, EdgeMode::Zero),
                full.read(x, y, EdgeMode::Zero, EdgeMode::Zero)
            );
        }
    }
}

#[test]
fn missing_tile_data_yields_zero() {
    let (g, blur) = impulse_graph(BlurAxis::X, 2.0);
    let buffers = ReadBufferSet::new();
    let inputs = PixelInputs::new(&g, blur, &buffers);
    let mut px = [9.0; 4];
    g.operation(blur)
        .unwrap()
        .execute_pixel(&mut px, 4.0, 4.0, PixelSampler::Nearest, &inputs, None);
    assert_eq!(px, TRANSPARENT);
}

#[test]
fn area_of_interest_grows_by_radius_on_one_axis() {
    let shape = OpShape {
        resolution: Resolution::new(9, 9),
        input_resolutions: smallvec![Resolution::new(9, 9)],
    };
    let r = Rect::new(2, 2, 4, 4);
    let x = GaussianBlurOperation::new(BlurAxis::X, DataType::Color, 1.5);
    let y = GaussianBlurOperation::new(BlurAxis::Y, DataType::Color, 1.5);
    assert_eq!(x.depending_area_of_interest(0, r, &shape), Rect::new(0, 2, 6, 4));
    assert_eq!(y.depending_area_of_interest(0, r, &shape), Rect::new(2, 0, 4, 6));
    assert!(x.is_complex());
}

#[test]
fn zero_size_is_identity() {
    let op = GaussianBlurOperation::new(BlurAxis::X, DataType::Value, 0.0);
    assert_eq!(op.kernel, vec![1.0]);
    assert_eq!(op.radius(), 0);
    let nan = GaussianBlurOperation::new(BlurAxis::X, DataType::Value, f32::NAN);
    assert_eq!(nan.radius(), 0);
}
