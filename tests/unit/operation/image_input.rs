use super::*;

#[test]
fn offset_buffers_are_reanchored_at_the_origin() {
    let buf = MemoryBuffer::from_data(DataType::Value, Rect::new(5, 5, 7, 6), vec![0.1, 0.9]).unwrap();
    let op = ImageOperation::new(buf).unwrap();
    assert_eq!(op.size(), Resolution::new(2, 1));
    assert_eq!(op.output_type(), DataType::Value);
    assert_eq!(
        op.determine_resolution(Some(Resolution::new(64, 64)), Resolution::new(8, 8)),
        Resolution::new(2, 1)
    );
    assert_eq!(op.pixels.read(1, 0, EdgeMode::Zero, EdgeMode::Zero)[0], 0.9);
}

#[test]
fn empty_buffers_are_rejected() {
    assert!(ImageOperation::new(MemoryBuffer::new(DataType::Color, Rect::default())).is_err());
}

#[test]
fn png_files_load_as_straight_color() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("px.png");
    let mut img = image::RgbaImage::new(2, 2);
    img.put_pixel(1, 0, image::Rgba([255, 0, 51, 255]));
    img.save(&path).unwrap();

    let op = ImageOperation::load(&path).unwrap();
    assert_eq!(op.size(), Resolution::new(2, 2));
    let px = op.pixels.read(1, 0, EdgeMode::Zero, EdgeMode::Zero);
    assert_eq!(px[0], 1.0);
    assert!((px[2] - 0.2).abs() < 1e-6);
    assert!(ImageOperation::load(&dir.path().join("missing.png")).is_err());
}
