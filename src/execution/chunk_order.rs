use crate::config::compositor::ChunkOrder;
use crate::foundation::core::{Rect, Resolution};

const THIRDS: [[f32; 2]; 4] = [
    [1.0 / 3.0, 1.0 / 3.0],
    [2.0 / 3.0, 1.0 / 3.0],
    [1.0 / 3.0, 2.0 / 3.0],
    [2.0 / 3.0, 2.0 / 3.0],
];

/// Scheduling distance of one chunk; smaller is dequeued first.
///
/// Positions are normalized to the group's frame so hotspots apply to any resolution.
pub(crate) fn chunk_distance(
    order: ChunkOrder,
    hotspots: &[[f32; 2]],
    index: usize,
    rect: Rect,
    res: Resolution,
) -> f32 {
    if order == ChunkOrder::TopDown {
        return index as f32;
    }
    let w = res.width.max(1) as f32;
    let h = res.height.max(1) as f32;
    let cx = (rect.xmin as f32 + rect.xmax as f32) * 0.5 / w;
    let cy = (rect.ymin as f32 + rect.ymax as f32) * 0.5 / h;
    let nearest = |points: &[[f32; 2]]| {
        points
            .iter()
            .map(|[px, py]| ((cx - px).powi(2) + (cy - py).powi(2)).sqrt())
            .fold(None, |acc: Option<f32>, d| Some(acc.map_or(d, |a| a.min(d))))
            .unwrap_or(0.0)
    };
    match order {
        ChunkOrder::TopDown => index as f32,
        ChunkOrder::CenterOut => nearest(&[[0.5, 0.5]]),
        ChunkOrder::RuleOfThirds => nearest(&THIRDS),
        ChunkOrder::Hotspots => nearest(hotspots),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/execution/chunk_order.rs"]
mod tests;
