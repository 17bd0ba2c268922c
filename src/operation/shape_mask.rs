use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel};
use crate::operation::core::{InputSocket, InputSockets, Operation, TileData};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// Mask shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskShape {
    /// Rotated rectangle.
    #[default]
    Box,
    /// Rotated ellipse.
    Ellipse,
}

/// How the shape combines with the incoming mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskMode {
    /// `max(mask, value)` inside.
    #[default]
    Add,
    /// `mask - value` inside, clamped at zero.
    Subtract,
    /// `mask * value` inside, zero outside.
    Multiply,
    /// `value` inside where the mask is empty, zero where it is set.
    Not,
}

/// Geometry of a box or ellipse mask, in normalized frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MaskGeometry {
    /// Centre x (`0..1`).
    pub x: f32,
    /// Centre y (`0..1`).
    pub y: f32,
    /// Full width relative to the frame width.
    pub width: f32,
    /// Full height relative to the frame height.
    pub height: f32,
    /// Rotation in radians.
    pub rotation: f32,
}

impl Default for MaskGeometry {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            width: 0.2,
            height: 0.1,
            rotation: 0.0,
        }
    }
}

/// Box or ellipse mask. Sockets: mask, value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeMaskOperation {
    shape: MaskShape,
    mode: MaskMode,
    geometry: MaskGeometry,
    sin: f32,
    cos: f32,
}

impl ShapeMaskOperation {
    /// Mask of `shape` combined with the input by `mode`.
    pub fn new(shape: MaskShape, mode: MaskMode, geometry: MaskGeometry) -> Self {
        Self {
            shape,
            mode,
            geometry,
            sin: geometry.rotation.sin(),
            cos: geometry.rotation.cos(),
        }
    }

    fn inside(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        if width <= 0.0 || height <= 0.0 {
            return false;
        }
        let g = &self.geometry;
        let aspect = width / height;
        let dx = x / width - g.x;
        let dy = (y / height - g.y) / aspect;
        let rx = self.cos * dx + self.sin * dy;
        let ry = (-self.sin * dx + self.cos * dy) * aspect;
        let hw = g.width * 0.5;
        let hh = g.height * 0.5;
        match self.shape {
            MaskShape::Box => rx.abs() < hw && ry.abs() < hh,
            MaskShape::Ellipse => {
                if hw <= 0.0 || hh <= 0.0 {
                    return false;
                }
                let (nx, ny) = (rx / hw, ry / hh);
                nx * nx + ny * ny < 1.0
            }
        }
    }
}

impl Operation for ShapeMaskOperation {
    fn name(&self) -> &str {
        match self.shape {
            MaskShape::Box => "BoxMask",
            MaskShape::Ellipse => "EllipseMask",
        }
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::value(0.0), InputSocket::value(1.0)]
    }

    fn output_type(&self) -> DataType {
        DataType::Value
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        inputs: &PixelInputs<'_>,
        _tile: Option<&TileData>,
    ) {
        let res = inputs.resolution();
        let mask = inputs.read(0, x, y, sampler)[0];
        let value = inputs.read(1, x, y, sampler)[0];
        let inside = self.inside(x + 0.5, y + 0.5, res.width as f32, res.height as f32);
        out[0] = match (self.mode, inside) {
            (MaskMode::Add, true) => mask.max(value),
            (MaskMode::Subtract, true) => (mask - value).clamp(0.0, 1.0),
            (MaskMode::Multiply, true) => mask * value,
            (MaskMode::Multiply, false) => 0.0,
            (MaskMode::Not, true) => {
                if mask > 0.0 {
                    0.0
                } else {
                    value
                }
            }
            (_, false) => mask,
        };
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/shape_mask.rs"]
mod tests;
