use super::*;
use crate::buffer::sampler::{EdgeMode, PixelSampler};
use crate::execution::group::ChunkState;
use crate::foundation::core::{DataType, Rect};
use crate::operation::blur::{BlurAxis, GaussianBlurOperation};
use crate::operation::constant::{ConstantColorOperation, ConstantValueOperation};
use crate::operation::flip::FlipOperation;
use crate::operation::image_input::ImageOperation;
use crate::operation::math::{MathFunction, MathOperation};
use crate::operation::mix::{MixBlend, MixOperation};
use crate::operation::output::{OutputKind, OutputOperation};
use std::sync::atomic::{AtomicUsize, Ordering};

fn config(w: u32, h: u32, chunk: u32) -> CompositorConfig {
    CompositorConfig {
        chunk_size: chunk,
        render_size: Resolution::new(w, h),
        threads: Some(2),
        ..CompositorConfig::default()
    }
}

fn pattern(w: u32, h: u32) -> ImageOperation {
    let data = (0..w * h)
        .flat_map(|i| {
            let v = i as f32 / (w * h) as f32;
            [v, 1.0 - v, (i % 3) as f32 * 0.5, 1.0]
        })
        .collect();
    ImageOperation::new(MemoryBuffer::from_data(DataType::Color, Rect::from_size(w, h), data).unwrap())
        .unwrap()
}

fn blurred_pattern_graph() -> OperationGraph {
    let mut g = OperationGraph::new();
    let img = g.add_operation(pattern(9, 7));
    let bx = g.add_operation(GaussianBlurOperation::new(BlurAxis::X, DataType::Color, 2.0));
    let by = g.add_operation(GaussianBlurOperation::new(BlurAxis::Y, DataType::Color, 1.5));
    let flip = g.add_operation(FlipOperation::new(DataType::Color, true, false));
    let out = g.add_operation(OutputOperation::composite());
    g.connect(img, bx, 0).unwrap();
    g.connect(bx, by, 0).unwrap();
    g.connect(by, flip, 0).unwrap();
    g.connect(flip, out, 0).unwrap();
    g
}

fn assert_close(a: &MemoryBuffer, b: &MemoryBuffer) {
    assert_eq!(a.rect(), b.rect());
    for (x, y) in a.data().iter().zip(b.data()) {
        assert!((x - y).abs() < 1e-5, "{x} vs {y}");
    }
}

#[test]
fn blur_splits_the_graph_into_three_groups() {
    let mut g = OperationGraph::new();
    let c = g.add_operation(ConstantColorOperation::new([1.0; 4]));
    let blur = g.add_operation(GaussianBlurOperation::new(BlurAxis::X, DataType::Color, 2.0));
    let out = g.add_operation(OutputOperation::composite());
    g.connect(c, blur, 0).unwrap();
    g.connect(blur, out, 0).unwrap();

    let sys = ExecutionSystem::new(g, true, &config(8, 8, 2)).unwrap();
    assert_eq!(sys.groups().len(), 3);
    assert_eq!(sys.execution_order(), &[0, 1, 2]);

    let [source, middle, output] = [&sys.groups()[0], &sys.groups()[1], &sys.groups()[2]];
    assert_eq!(source.producer(), c);
    assert!(source.read_buffers().is_empty());
    assert_eq!(middle.producer(), blur);
    assert_eq!(middle.read_buffers().len(), 1);
    assert_eq!(output.root(), out);
    assert_eq!(output.output_name(), Some("Composite"));
    assert!(!middle.is_output());
    assert_eq!(sys.graph().role(middle.root()), OperationRole::WriteBuffer);
    assert_eq!(sys.total_chunks(), 48);
}

#[test]
fn mismatched_inputs_get_a_resample_adapter() {
    let mut g = OperationGraph::new();
    let big = g.add_operation(pattern(4, 4));
    let small = g.add_operation(pattern(2, 2));
    let mix = g.add_operation(MixOperation::new(MixBlend::Blend));
    let out = g.add_operation(OutputOperation::composite());
    g.connect(big, mix, 1).unwrap();
    g.connect(small, mix, 2).unwrap();
    g.connect(mix, out, 0).unwrap();
    let before = g.len();

    let sys = ExecutionSystem::new(g, true, &config(16, 16, 4)).unwrap();
    let graph = sys.graph();
    assert_eq!(graph.len(), before + 1);
    assert_eq!(graph.resolution(mix), Resolution::new(4, 4));
    assert_eq!(graph.resolution(out), Resolution::new(4, 4));
    assert_eq!(graph.input(mix, 1), Some(big));
    let adapter = graph.input(mix, 2).unwrap();
    assert_eq!(graph.role(adapter), OperationRole::Resample);
    assert_eq!(graph.resolution(adapter), Resolution::new(4, 4));
    assert_eq!(graph.input(adapter, 0), Some(small));
}

#[test]
fn sources_take_the_preferred_render_size() {
    let mut g = OperationGraph::new();
    let c = g.add_operation(ConstantValueOperation::new(1.0));
    let out = g.add_operation(OutputOperation::composite());
    g.connect(c, out, 0).unwrap();
    let sys = ExecutionSystem::new(g, true, &config(7, 3, 4)).unwrap();
    assert_eq!(sys.graph().resolution(c), Resolution::new(7, 3));
    assert_eq!(sys.groups()[0].resolution(), Resolution::new(7, 3));
}

#[test]
fn viewers_are_inactive_when_rendering() {
    let build = || {
        let mut g = OperationGraph::new();
        let c = g.add_operation(ConstantValueOperation::new(1.0));
        let comp = g.add_operation(OutputOperation::composite());
        let view = g.add_operation(OutputOperation::viewer());
        g.connect(c, comp, 0).unwrap();
        g.connect(c, view, 0).unwrap();
        g
    };
    let rendering = ExecutionSystem::new(build(), true, &config(4, 4, 4)).unwrap();
    assert_eq!(rendering.groups().len(), 1);
    let editing = ExecutionSystem::new(build(), false, &config(4, 4, 4)).unwrap();
    assert_eq!(editing.groups().len(), 2);
}

#[test]
fn upstream_groups_inherit_output_priority() {
    let mut g = OperationGraph::new();
    let c = g.add_operation(ConstantColorOperation::new([1.0; 4]));
    let blur = g.add_operation(GaussianBlurOperation::new(BlurAxis::Y, DataType::Color, 1.0));
    let view = g.add_operation(OutputOperation::new(OutputKind::Viewer, "Preview").with_priority(5));
    g.connect(c, blur, 0).unwrap();
    g.connect(blur, view, 0).unwrap();
    let sys = ExecutionSystem::new(g, false, &config(4, 4, 2)).unwrap();
    assert!(sys.groups().iter().all(|grp| grp.priority() == 5));
}

#[test]
fn empty_graph_yields_no_outputs() {
    let mut sys = ExecutionSystem::new(OperationGraph::new(), true, &config(4, 4, 2)).unwrap();
    let out = sys.execute().unwrap();
    assert!(out.outputs.is_empty());
    assert_eq!(out.stats.chunks_total, 0);
}

#[test]
fn invalid_config_is_rejected() {
    let cfg = CompositorConfig {
        chunk_size: 0,
        ..CompositorConfig::default()
    };
    assert!(ExecutionSystem::new(OperationGraph::new(), true, &cfg).is_err());
}

#[test]
fn multiply_fills_every_chunk() {
    let mut g = OperationGraph::new();
    let a = g.add_operation(ConstantValueOperation::new(1.0));
    let b = g.add_operation(ConstantValueOperation::new(2.0));
    let mul = g.add_operation(MathOperation::new(MathFunction::Multiply));
    let out = g.add_operation(OutputOperation::composite());
    g.connect(a, mul, 0).unwrap();
    g.connect(b, mul, 1).unwrap();
    g.connect(mul, out, 0).unwrap();

    let result = execute(g, true, &config(4, 4, 2)).unwrap();
    let buf = result.output("Composite").unwrap();
    assert_eq!(buf.rect(), Rect::new(0, 0, 4, 4));
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(buf.read(x, y, EdgeMode::Zero, EdgeMode::Zero), [2.0, 2.0, 2.0, 1.0]);
        }
    }
    assert_eq!(result.stats.chunks_total, 4);
    assert_eq!(result.stats.chunks_finished, 4);
    assert!(!result.stats.cancelled);
}

#[test]
fn chunking_does_not_change_the_result() {
    let whole = execute(blurred_pattern_graph(), true, &config(9, 7, 64)).unwrap();
    let tiled = execute(blurred_pattern_graph(), true, &config(9, 7, 2)).unwrap();
    assert_close(
        whole.output("Composite").unwrap(),
        tiled.output("Composite").unwrap(),
    );
    assert!(tiled.stats.cache.published > 0);
}

#[test]
fn eviction_keeps_results_bit_identical() {
    let roomy = execute(blurred_pattern_graph(), true, &config(9, 7, 3)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cfg = CompositorConfig {
        memory_budget_bytes: 0,
        scratch_dir: Some(dir.path().to_path_buf()),
        ..config(9, 7, 3)
    };
    let tight = execute(blurred_pattern_graph(), true, &cfg).unwrap();
    assert_eq!(
        roomy.output("Composite").unwrap().data(),
        tight.output("Composite").unwrap().data()
    );
    assert!(tight.stats.cache.evictions > 0);
    assert!(tight.stats.cache.reloads > 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0, "scratch cleaned up");
}

#[test]
fn system_can_run_twice() {
    let mut sys = ExecutionSystem::new(blurred_pattern_graph(), true, &config(9, 7, 4)).unwrap();
    let first = sys.execute().unwrap();
    let second = sys.execute().unwrap();
    assert_eq!(
        first.output("Composite").unwrap().data(),
        second.output("Composite").unwrap().data()
    );
    assert!(
        sys.groups()
            .iter()
            .flat_map(|g| g.chunks())
            .all(|c| c.state() == ChunkState::Finished)
    );
}

#[derive(Default)]
struct CountingObserver {
    progress: AtomicUsize,
    groups: AtomicUsize,
    stop_after: Option<usize>,
}

impl ExecutionObserver for CountingObserver {
    fn on_progress(&self, _fraction: f32, _status: &str) {
        self.progress.fetch_add(1, Ordering::SeqCst);
    }

    fn should_cancel(&self) -> bool {
        self.stop_after
            .is_some_and(|k| self.progress.load(Ordering::SeqCst) >= k)
    }

    fn on_group_finished(&self, _group: usize) {
        self.groups.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn observer_sees_every_chunk_and_group() {
    let observer = Arc::new(CountingObserver::default());
    let mut sys = ExecutionSystem::new(blurred_pattern_graph(), true, &config(9, 7, 4)).unwrap();
    let out = sys.execute_with(observer.clone()).unwrap();
    assert_eq!(observer.progress.load(Ordering::SeqCst), sys.total_chunks());
    assert_eq!(observer.groups.load(Ordering::SeqCst), sys.groups().len());
    assert_eq!(out.stats.chunks_finished, sys.total_chunks());
}

#[test]
fn cancellation_stops_after_the_requested_chunks() {
    let mut g = OperationGraph::new();
    let c = g.add_operation(ConstantValueOperation::new(1.0));
    let out = g.add_operation(OutputOperation::composite());
    g.connect(c, out, 0).unwrap();
    let cfg = CompositorConfig {
        threads: Some(1),
        ..config(8, 8, 2)
    };
    let observer = Arc::new(CountingObserver {
        stop_after: Some(3),
        ..CountingObserver::default()
    });
    let mut sys = ExecutionSystem::new(g, true, &cfg).unwrap();
    let result = sys.execute_with(observer.clone()).unwrap();

    assert!(result.stats.cancelled);
    assert_eq!(result.stats.chunks_finished, 3);
    let buf = result.output("Composite").unwrap();
    let written = buf
        .data()
        .chunks_exact(4)
        .filter(|px| px[3] == 1.0)
        .count();
    assert_eq!(written, 3 * 4, "three 2x2 chunks were computed");
}

#[derive(Debug)]
struct Exploding;

impl crate::operation::core::Operation for Exploding {
    fn name(&self) -> &str {
        "Exploding"
    }

    fn inputs(&self) -> crate::operation::core::InputSockets {
        Default::default()
    }

    fn output_type(&self) -> DataType {
        DataType::Value
    }

    fn execute_pixel(
        &self,
        out: &mut crate::foundation::core::Pixel,
        x: f32,
        _y: f32,
        _sampler: PixelSampler,
        _inputs: &crate::operation::inputs::PixelInputs<'_>,
        _tile: Option<&crate::operation::core::TileData>,
    ) {
        if x >= 2.0 {
            panic!("boom");
        }
        out[0] = 1.0;
    }
}

fn exploding_graph() -> OperationGraph {
    let mut g = OperationGraph::new();
    let e = g.add_operation(Exploding);
    let out = g.add_operation(OutputOperation::composite());
    g.connect(e, out, 0).unwrap();
    g
}

#[test]
fn panicking_chunks_are_isolated_by_default() {
    let result = execute(exploding_graph(), true, &config(4, 2, 2)).unwrap();
    assert_eq!(result.stats.chunks_failed, 1);
    assert_eq!(result.stats.chunks_finished, 2);
    let buf = result.output("Composite").unwrap();
    assert_eq!(buf.read(0, 0, EdgeMode::Zero, EdgeMode::Zero), [1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn fail_fast_turns_a_panic_into_an_error() {
    let cfg = CompositorConfig {
        fail_fast: true,
        ..config(4, 2, 2)
    };
    let err = execute(exploding_graph(), true, &cfg).unwrap_err();
    assert!(matches!(err, TilecompError::Execution(_)));
}
