use super::*;

#[test]
fn rect_new_collapses_inverted_bounds() {
    let r = Rect::new(5, 5, 2, 1);
    assert!(r.is_empty());
    assert_eq!(r.width(), 0);
    assert_eq!(r.height(), 0);
    assert_eq!((r.xmin, r.ymin), (5, 5));
}

#[test]
fn rect_intersect_and_union() {
    let a = Rect::new(0, 0, 4, 4);
    let b = Rect::new(2, 2, 6, 6);
    assert_eq!(a.intersect(&b), Some(Rect::new(2, 2, 4, 4)));
    assert_eq!(a.union(&b), Rect::new(0, 0, 6, 6));

    let c = Rect::new(4, 0, 8, 4);
    assert_eq!(a.intersect(&c), None, "touching edges do not overlap");
    assert_eq!(Rect::default().union(&c), c);
}

#[test]
fn rect_expand_translate_and_contains() {
    let r = Rect::new(2, 2, 4, 4).expand(1, 2);
    assert_eq!(r, Rect::new(1, 0, 5, 6));
    assert!(r.contains(1, 0));
    assert!(!r.contains(5, 0));
    assert_eq!(r.translate(-1, 1), Rect::new(0, 1, 4, 7));
    assert!(r.contains_rect(&Rect::new(2, 2, 3, 3)));
    assert!(!r.contains_rect(&Rect::new(0, 0, 3, 3)));
}

#[test]
fn rect_covering_rounds_outwards() {
    let r = Rect::covering(0.5, -0.25, 3.2, 2.0);
    assert_eq!(r, Rect::new(0, -1, 4, 2));
    assert!(Rect::covering(f64::NAN, 0.0, 1.0, 1.0).xmin == 0);
}

#[test]
fn resolution_rect_and_validation() {
    let res = Resolution::new(4, 3);
    assert_eq!(res.rect(), Rect::new(0, 0, 4, 3));
    assert_eq!(res.pixel_count(), 12);
    assert_eq!(res.to_string(), "4x3");
    assert!(Resolution::new(0, 3).is_zero());
    assert!(Resolution::non_zero(0, 1).is_err());
    assert!(Resolution::non_zero(1, 1).is_ok());
}

#[test]
fn data_type_conversions() {
    assert_eq!(DataType::Value.channels(), 1);
    assert_eq!(DataType::Vector.channels(), 3);
    assert_eq!(DataType::Color.channels(), 4);

    let grey = DataType::Value.convert(DataType::Color, [0.5, 0.0, 0.0, 0.0]);
    assert_eq!(grey, [0.5, 0.5, 0.5, 1.0]);

    let luma = DataType::Color.convert(DataType::Value, [1.0, 1.0, 1.0, 1.0]);
    assert!((luma[0] - 1.0).abs() < 1e-6);

    let same = DataType::Color.convert(DataType::Color, [0.1, 0.2, 0.3, 0.4]);
    assert_eq!(same, [0.1, 0.2, 0.3, 0.4]);
}
