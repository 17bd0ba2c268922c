use super::*;
use crate::operation::constant::ConstantValueOperation;

#[test]
fn socket_builders_set_fields() {
    let s = InputSocket::value(0.25).with_resize(ResizeMode::Stretch);
    assert_eq!(s.data_type, DataType::Value);
    assert_eq!(s.default, [0.25, 0.0, 0.0, 0.0]);
    assert_eq!(s.resize_mode, ResizeMode::Stretch);

    let c = InputSocket::color([1.0, 0.0, 0.0, 1.0]);
    assert_eq!(c.resize_mode, ResizeMode::Center);
}

#[test]
fn default_resolution_follows_main_input_unless_zero() {
    let op = ConstantValueOperation::new(1.0);
    let preferred = Resolution::new(8, 8);
    assert_eq!(op.determine_resolution(None, preferred), preferred);
    assert_eq!(
        op.determine_resolution(Some(Resolution::new(3, 2)), preferred),
        Resolution::new(3, 2)
    );
    assert_eq!(
        op.determine_resolution(Some(Resolution::new(0, 2)), preferred),
        preferred
    );
}

#[test]
fn default_area_of_interest_is_identity() {
    let op = ConstantValueOperation::new(1.0);
    let shape = OpShape {
        resolution: Resolution::new(4, 4),
        input_resolutions: SmallVec::new(),
    };
    let r = Rect::new(1, 1, 3, 3);
    assert_eq!(op.depending_area_of_interest(0, r, &shape), r);
    assert_eq!(shape.input(5), Resolution::default());
}

#[test]
fn operation_id_displays_compactly() {
    assert_eq!(OperationId(7).to_string(), "op#7");
}
