/// Interpolation used when a read lands on a non-integral coordinate.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PixelSampler {
    /// Pixel whose centre is closest to the coordinate.
    #[default]
    Nearest,
    /// 2x2 linear blend.
    Bilinear,
    /// 4x4 Catmull-Rom blend.
    Bicubic,
}

/// Out-of-bounds policy, applied per axis.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Outside reads are transparent black.
    #[default]
    #[serde(alias = "clip")]
    Zero,
    /// Outside reads repeat the nearest edge pixel.
    #[serde(alias = "extend")]
    Clamp,
    /// Outside reads wrap around.
    Repeat,
}

impl EdgeMode {
    /// Map a coordinate relative to the buffer origin onto `[0, len)`, or `None` when the
    /// policy yields zero.
    pub(crate) fn wrap(self, v: i32, len: i32) -> Option<i32> {
        if len <= 0 {
            return None;
        }
        match self {
            EdgeMode::Zero => (0..len).contains(&v).then_some(v),
            EdgeMode::Clamp => Some(v.clamp(0, len - 1)),
            EdgeMode::Repeat => Some(v.rem_euclid(len)),
        }
    }
}

/// Catmull-Rom weights for the four taps around a fractional offset `t` in `[0, 1)`.
pub(crate) fn cubic_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        0.5 * (-t3 + 2.0 * t2 - t),
        0.5 * (3.0 * t3 - 5.0 * t2 + 2.0),
        0.5 * (-3.0 * t3 + 4.0 * t2 + t),
        0.5 * (t3 - t2),
    ]
}
