use crate::buffer::sampler::PixelSampler;
use crate::foundation::core::{DataType, Pixel};
use crate::operation::core::{InputSocket, InputSockets, Operation, TileData};
use crate::operation::inputs::PixelInputs;
use smallvec::smallvec;

/// Binary scalar function applied by [`MathOperation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathFunction {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b`, zero when `b` is zero.
    Divide,
    /// `a ^ b`, zero when undefined.
    Power,
    /// `min(a, b)`
    Minimum,
    /// `max(a, b)`
    Maximum,
    /// `1` when `a < b`, else `0`.
    LessThan,
    /// `1` when `a > b`, else `0`.
    GreaterThan,
}

impl MathFunction {
    /// Apply to one pair of operands. Never produces NaN or infinity from finite input.
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            MathFunction::Add => a + b,
            MathFunction::Subtract => a - b,
            MathFunction::Multiply => a * b,
            MathFunction::Divide => {
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
            MathFunction::Power => {
                let v = a.powf(b);
                if v.is_finite() { v } else { 0.0 }
            }
            MathFunction::Minimum => a.min(b),
            MathFunction::Maximum => a.max(b),
            MathFunction::LessThan => f32::from(u8::from(a < b)),
            MathFunction::GreaterThan => f32::from(u8::from(a > b)),
        }
    }
}

/// Pointwise `f(a, b)` over two value inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MathOperation {
    function: MathFunction,
    defaults: [f32; 2],
    clamp: bool,
}

impl MathOperation {
    /// Math operation with both unconnected operands at `0.5`.
    pub fn new(function: MathFunction) -> Self {
        Self {
            function,
            defaults: [0.5, 0.5],
            clamp: false,
        }
    }

    /// Values read by unconnected operand sockets.
    pub fn with_defaults(mut self, a: f32, b: f32) -> Self {
        self.defaults = [a, b];
        self
    }

    /// Clamp the result to `[0, 1]`.
    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    /// Applied function.
    pub fn function(&self) -> MathFunction {
        self.function
    }
}

impl Operation for MathOperation {
    fn name(&self) -> &str {
        "Math"
    }

    fn inputs(&self) -> InputSockets {
        smallvec![
            InputSocket::value(self.defaults[0]),
            InputSocket::value(self.defaults[1]),
        ]
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
        let a = inputs.read(0, x, y, sampler)[0];
        let b = inputs.read(1, x, y, sampler)[0];
        let mut v = self.function.apply(a, b);
        if self.clamp {
            v = v.clamp(0.0, 1.0);
        }
        out[0] = v;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/math.rs"]
mod tests;
