use super::*;
use crate::operation::constant::ConstantValueOperation;
use crate::operation::graph::OperationGraph;
use crate::operation::inputs::ReadBufferSet;

#[test]
fn viewers_only_count_while_editing() {
    let comp = OutputOperation::composite();
    let view = OutputOperation::viewer();
    assert!(comp.is_output(true) && comp.is_output(false));
    assert!(!view.is_output(true));
    assert!(view.is_output(false));
    assert_eq!(view.output_name(), Some("Viewer"));
}

#[test]
fn priority_is_clamped() {
    let op = OutputOperation::new(OutputKind::Composite, "hi").with_priority(200);
    assert_eq!(op.render_priority(), MAX_RENDER_PRIORITY);
    assert_eq!(op.kind(), OutputKind::Composite);
}

#[test]
fn passes_its_input_through_as_color() {
    let mut g = OperationGraph::new();
    let v = g.add_operation(ConstantValueOperation::new(0.25));
    let out = g.add_operation(OutputOperation::composite());
    g.connect(v, out, 0).unwrap();
    let buffers = ReadBufferSet::new();
    let inputs = PixelInputs::new(&g, out, &buffers);
    let mut px: Pixel = [0.0; 4];
    g.operation(out)
        .unwrap()
        .execute_pixel(&mut px, 0.0, 0.0, PixelSampler::Nearest, &inputs, None);
    assert_eq!(px, [0.25, 0.25, 0.25, 1.0]);
}

