use super::*;
use crate::config::compositor::CompositorConfig;
use crate::execution::system::ExecutionSystem;
use crate::foundation::core::DataType;
use crate::operation::blur::{BlurAxis, GaussianBlurOperation};
use crate::operation::constant::ConstantColorOperation;
use crate::operation::output::OutputOperation;

fn config(w: u32, h: u32, chunk: u32) -> CompositorConfig {
    CompositorConfig {
        chunk_size: chunk,
        render_size: Resolution::new(w, h),
        threads: Some(2),
        ..CompositorConfig::default()
    }
}

fn constant_system(w: u32, h: u32, chunk: u32) -> ExecutionSystem {
    let mut graph = OperationGraph::new();
    let c = graph.add_operation(ConstantColorOperation::new([0.2, 0.4, 0.6, 1.0]));
    let out = graph.add_operation(OutputOperation::composite());
    graph.connect(c, out, 0).unwrap();
    ExecutionSystem::new(graph, true, &config(w, h, chunk)).unwrap()
}

fn blur_system() -> (ExecutionSystem, OperationId) {
    let mut graph = OperationGraph::new();
    let c = graph.add_operation(ConstantColorOperation::new([1.0; 4]));
    let blur = graph.add_operation(GaussianBlurOperation::new(BlurAxis::X, DataType::Color, 2.0));
    let out = graph.add_operation(OutputOperation::composite());
    graph.connect(c, blur, 0).unwrap();
    graph.connect(blur, out, 0).unwrap();
    (
        ExecutionSystem::new(graph, true, &config(8, 8, 2)).unwrap(),
        blur,
    )
}

#[test]
fn chunk_grid_covers_the_frame_with_partial_edges() {
    let sys = constant_system(5, 3, 2);
    let group = &sys.groups()[0];
    assert_eq!(group.chunk_grid(), (3, 2));
    assert_eq!(group.chunks().len(), 6);
    assert_eq!(group.chunk_rect(0), Rect::new(0, 0, 2, 2));
    assert_eq!(group.chunk_rect(2), Rect::new(4, 0, 5, 2));
    assert_eq!(group.chunk_rect(5), Rect::new(4, 2, 5, 3));

    let mut covered = vec![0u32; 15];
    for chunk in group.chunks() {
        let r = chunk.rect();
        for y in r.ymin..r.ymax {
            for x in r.xmin..r.xmax {
                covered[(y * 5 + x) as usize] += 1;
            }
        }
    }
    assert!(covered.iter().all(|n| *n == 1), "every pixel in exactly one chunk");
}

#[test]
fn chunks_for_area_clips_to_the_frame() {
    let sys = constant_system(5, 3, 2);
    let group = &sys.groups()[0];
    assert_eq!(group.chunks_for_area(Rect::new(1, 1, 3, 3)), vec![0, 1, 3, 4]);
    assert_eq!(group.chunks_for_area(Rect::new(-4, -4, 1, 1)), vec![0]);
    assert!(group.chunks_for_area(Rect::new(10, 10, 12, 12)).is_empty());
    assert_eq!(group.chunks_for_area(Rect::new(0, 0, 5, 3)).len(), 6);
}

#[test]
fn chunk_order_sorts_by_distance_then_index() {
    let sys = constant_system(6, 6, 2);
    let group = &sys.groups()[0];
    let order = group.chunk_order();
    assert_eq!(order[0], 4, "centre chunk first");
    assert_eq!(order.len(), 9);
}

#[test]
fn depending_area_expands_through_blur_and_is_idempotent() {
    let (sys, blur) = blur_system();
    let group = sys
        .groups()
        .iter()
        .find(|g| g.producer() == blur)
        .unwrap();
    let read = group.read_buffers()[0];
    let rect = Rect::new(2, 2, 4, 4);
    let area = group.determine_depending_area(sys.graph(), rect, read).unwrap();
    assert_eq!(area, Rect::new(0, 2, 6, 4));
    assert_eq!(
        group.determine_depending_area(sys.graph(), rect, read),
        Some(area)
    );
    assert_eq!(
        group.determine_depending_area(sys.graph(), rect, blur),
        None,
        "only the read buffer is a boundary"
    );
}

#[test]
fn chunk_dependencies_link_both_directions() {
    let (sys, blur) = blur_system();
    let blur_group = sys
        .groups()
        .iter()
        .find(|g| g.producer() == blur)
        .unwrap();
    let chunk = blur_group.chunk(0).unwrap();
    let upstream = chunk.depends_on();
    assert_eq!(upstream.len(), 2, "area (0,0)-(4,2) spans two source chunks");
    for dep in upstream {
        let source = &sys.groups()[dep.group];
        assert!(
            source.chunk(dep.chunk).unwrap().dependents().contains(&ChunkRef {
                group: blur_group.id(),
                chunk: 0
            })
        );
    }
    assert_eq!(chunk.read_areas().len(), 1);
    assert_eq!(chunk.read_areas()[0].area, Rect::new(0, 0, 4, 2));
    assert_eq!(chunk.unfinished_dependencies(), 2);
    assert_eq!(chunk.state(), ChunkState::Created);
}

#[test]
fn chunk_state_transitions_once() {
    let sys = constant_system(2, 2, 2);
    let chunk = sys.groups()[0].chunk(0).unwrap();
    assert!(chunk.try_schedule());
    assert!(!chunk.try_schedule());
    assert_eq!(chunk.state(), ChunkState::Scheduled);
    chunk.finish();
    assert_eq!(chunk.state(), ChunkState::Finished);
    chunk.reset();
    assert_eq!(chunk.state(), ChunkState::Created);
    assert!(!chunk.dependency_finished(), "no dependencies to count down");
}
