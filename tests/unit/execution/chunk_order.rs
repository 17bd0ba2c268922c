use super::*;

fn grid_distances(order: ChunkOrder, hotspots: &[[f32; 2]]) -> Vec<f32> {
    let res = Resolution::new(30, 30);
    (0..9)
        .map(|i| {
            let (x, y) = ((i % 3) as i32 * 10, (i / 3) as i32 * 10);
            chunk_distance(order, hotspots, i, Rect::new(x, y, x + 10, y + 10), res)
        })
        .collect()
}

fn argmin(v: &[f32]) -> usize {
    v.iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn top_down_is_row_major() {
    let d = grid_distances(ChunkOrder::TopDown, &[]);
    assert!(d.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn center_out_prefers_the_middle_chunk() {
    let d = grid_distances(ChunkOrder::CenterOut, &[]);
    assert_eq!(argmin(&d), 4);
    assert!(d[4].abs() < 1e-6);
    assert!((d[0] - d[8]).abs() < 1e-6);
}

#[test]
fn hotspots_pick_the_nearest_point() {
    let d = grid_distances(ChunkOrder::Hotspots, &[[0.9, 0.1]]);
    assert_eq!(argmin(&d), 2);
    let none = grid_distances(ChunkOrder::Hotspots, &[]);
    assert!(none.iter().all(|v| *v == 0.0));
}

#[test]
fn rule_of_thirds_avoids_the_exact_centre() {
    let d = grid_distances(ChunkOrder::RuleOfThirds, &[]);
    // Corner chunks sit closer to a thirds point than edge-middle chunks.
    assert!(d[0] < d[1]);
}
