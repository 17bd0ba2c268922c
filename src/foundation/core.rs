use crate::foundation::error::{TilecompError, TilecompResult};

/// One pixel worth of channel values. Unused channels are zero.
pub type Pixel = [f32; 4];

/// Fully transparent black.
pub const TRANSPARENT: Pixel = [0.0; 4];

/// Integer axis-aligned rectangle with exclusive max (`[xmin, xmax) x [ymin, ymax)`).
///
/// Invariant: `xmin <= xmax` and `ymin <= ymax`. Constructors normalize inverted input to an
/// empty rectangle anchored at the min corner.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Rect {
    /// Inclusive left edge.
    pub xmin: i32,
    /// Inclusive top edge.
    pub ymin: i32,
    /// Exclusive right edge.
    pub xmax: i32,
    /// Exclusive bottom edge.
    pub ymax: i32,
}

impl Rect {
    /// Build a rectangle; inverted bounds collapse to empty.
    pub fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax: xmax.max(xmin),
            ymax: ymax.max(ymin),
        }
    }

    /// Rectangle anchored at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, clamp_dim(width), clamp_dim(height))
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        (self.xmax - self.xmin) as u32
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        (self.ymax - self.ymin) as u32
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// `true` when the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.xmin >= self.xmax || self.ymin >= self.ymax
    }

    /// `true` when `(x, y)` lies inside.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.xmin && x < self.xmax && y >= self.ymin && y < self.ymax
    }

    /// `true` when `other` lies completely inside `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.xmin >= self.xmin
                && other.xmax <= self.xmax
                && other.ymin >= self.ymin
                && other.ymax <= self.ymax)
    }

    /// Overlapping area, or `None` when the rectangles do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect {
            xmin: self.xmin.max(other.xmin),
            ymin: self.ymin.max(other.ymin),
            xmax: self.xmax.min(other.xmax),
            ymax: self.ymax.min(other.ymax),
        };
        (!r.is_empty()).then_some(r)
    }

    /// Smallest rectangle covering both. Empty operands are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    /// Grow by `dx` horizontally and `dy` vertically on every side.
    pub fn expand(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.xmin.saturating_sub(dx),
            self.ymin.saturating_sub(dy),
            self.xmax.saturating_add(dx),
            self.ymax.saturating_add(dy),
        )
    }

    /// Shift by `(dx, dy)`.
    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.xmin.saturating_add(dx),
            self.ymin.saturating_add(dy),
            self.xmax.saturating_add(dx),
            self.ymax.saturating_add(dy),
        )
    }

    /// Smallest integer rectangle covering the float bounds `[x0, x1) x [y0, y1)`.
    pub fn covering(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect {
        fn to_i32(v: f64) -> i32 {
            if v.is_nan() {
                0
            } else {
                v.clamp(f64::from(i32::MIN / 2), f64::from(i32::MAX / 2)) as i32
            }
        }
        Rect::new(
            to_i32(x0.floor()),
            to_i32(y0.floor()),
            to_i32(x1.ceil()),
            to_i32(y1.ceil()),
        )
    }
}

fn clamp_dim(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Output resolution of an operation, in pixels.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Create a resolution.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a validated, non-zero resolution.
    pub fn non_zero(width: u32, height: u32) -> TilecompResult<Self> {
        if width == 0 || height == 0 {
            return Err(TilecompError::validation(format!(
                "resolution must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// `true` when either dimension is zero.
    pub fn is_zero(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The full-frame rectangle `[0, width) x [0, height)`.
    pub fn rect(self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Number of pixels.
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Socket / buffer data type. Determines the number of meaningful channels per pixel.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Single channel.
    Value,
    /// Three channels.
    Vector,
    /// RGBA.
    #[default]
    Color,
}

impl DataType {
    /// Number of channels stored per pixel.
    pub fn channels(self) -> usize {
        match self {
            DataType::Value => 1,
            DataType::Vector => 3,
            DataType::Color => 4,
        }
    }

    /// Convert a pixel produced as `self` into the layout expected by `to`.
    ///
    /// Value widens to opaque grey, color narrows to luminance, vector and color copy channels.
    pub fn convert(self, to: DataType, px: Pixel) -> Pixel {
        match (self, to) {
            (a, b) if a == b => px,
            (DataType::Value, DataType::Color) => [px[0], px[0], px[0], 1.0],
            (DataType::Value, DataType::Vector) => [px[0], px[0], px[0], 0.0],
            (DataType::Color, DataType::Value) => {
                [0.35 * px[0] + 0.45 * px[1] + 0.2 * px[2], 0.0, 0.0, 0.0]
            }
            (DataType::Vector, DataType::Value) => {
                [(px[0] + px[1] + px[2]) / 3.0, 0.0, 0.0, 0.0]
            }
            (DataType::Color, DataType::Vector) => [px[0], px[1], px[2], 0.0],
            (DataType::Vector, DataType::Color) => [px[0], px[1], px[2], 1.0],
            _ => px,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
