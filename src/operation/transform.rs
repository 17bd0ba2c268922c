use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel, Rect, Resolution, TRANSPARENT};
use crate::operation::core::{InputSocket, InputSockets, OpShape, Operation, TileData};
use crate::operation::inputs::PixelInputs;
use kurbo::{Affine, Point, Vec2};
use smallvec::smallvec;

/// Translate / rotate / scale parameters, applied about the frame centre.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TransformParams {
    /// Offset in pixels.
    pub translate: [f64; 2],
    /// Counter-clockwise rotation in degrees (y points down).
    pub rotate_deg: f64,
    /// Per-axis scale factor.
    pub scale: [f64; 2],
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            translate: [0.0, 0.0],
            rotate_deg: 0.0,
            scale: [1.0, 1.0],
        }
    }
}

impl TransformParams {
    /// Forward map from input to output pixel space for a frame of `res`.
    pub fn affine(&self, res: Resolution) -> Affine {
        let c = Vec2::new(f64::from(res.width) * 0.5, f64::from(res.height) * 0.5);
        Affine::translate(c + Vec2::new(self.translate[0], self.translate[1]))
            * Affine::rotate(-self.rotate_deg.to_radians())
            * Affine::scale_non_uniform(self.scale[0], self.scale[1])
            * Affine::translate(-c)
    }
}

/// Affine resampling of the input. Output pixels are inverse-mapped into the input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformOperation {
    data_type: DataType,
    params: TransformParams,
    sampler: PixelSampler,
}

impl TransformOperation {
    /// Transform of a `data_type` input.
    pub fn new(data_type: DataType, params: TransformParams, sampler: PixelSampler) -> Self {
        Self {
            data_type,
            params,
            sampler,
        }
    }

    fn inverse(&self, res: Resolution) -> Option<Affine> {
        let fwd = self.params.affine(res);
        let det = fwd.determinant();
        (det.is_finite() && det.abs() > 1e-12).then(|| fwd.inverse())
    }
}

impl Operation for TransformOperation {
    fn name(&self) -> &str {
        "Transform"
    }

    fn inputs(&self) -> InputSockets {
        smallvec![InputSocket::new(self.data_type)]
    }

    fn output_type(&self) -> DataType {
        self.data_type
    }

    fn depending_area_of_interest(&self, _input: usize, output: Rect, shape: &OpShape) -> Rect {
        let Some(inv) = self.inverse(shape.resolution) else {
            return Rect::default();
        };
        let bbox = inv.transform_rect_bbox(kurbo::Rect::new(
            f64::from(output.xmin),
            f64::from(output.ymin),
            f64::from(output.xmax),
            f64::from(output.ymax),
        ));
        // Bicubic reaches two pixels past the mapped footprint.
        Rect::covering(bbox.x0, bbox.y0, bbox.x1, bbox.y1).expand(2, 2)
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        x: f32,
        y: f32,
        _sampler: PixelSampler,
        inputs: &PixelInputs<'_>,
        _tile: Option<&TileData>,
    ) {
        let res = inputs.resolution();
        let Some(inv) = self.inverse(res) else {
            *out = TRANSPARENT;
            return;
        };
        let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
        let src = inputs.input_resolution(0);
        if p.x < 0.0 || p.y < 0.0 || p.x >= f64::from(src.width) || p.y >= f64::from(src.height) {
            *out = TRANSPARENT;
            return;
        }
        *out = inputs.read(0, (p.x - 0.5) as f32, (p.y - 0.5) as f32, self.sampler);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/transform.rs"]
mod tests;
