use crate::{
    buffer::sampler::{EdgeMode, PixelSampler, cubic_weights},
    foundation::core::{DataType, Pixel, Rect, TRANSPARENT},
    foundation::error::{TilecompError, TilecompResult},
};

/// Float pixel storage for one rectangular region.
///
/// Coordinates passed to every accessor are absolute (in the owning operation's space), not
/// relative to `rect`. Pixels are stored row-major, `channels` floats each.
#[derive(Clone, Debug, PartialEq)]
pub struct MemoryBuffer {
    rect: Rect,
    data_type: DataType,
    data: Vec<f32>,
}

impl MemoryBuffer {
    /// Zero-filled buffer covering `rect`.
    pub fn new(data_type: DataType, rect: Rect) -> Self {
        let len = rect.area() as usize * data_type.channels();
        Self {
            rect,
            data_type,
            data: vec![0.0; len],
        }
    }

    /// Buffer covering `rect` with every pixel set to `px`.
    pub fn filled(data_type: DataType, rect: Rect, px: Pixel) -> Self {
        let channels = data_type.channels();
        let mut data = Vec::with_capacity(rect.area() as usize * channels);
        for _ in 0..rect.area() {
            data.extend_from_slice(&px[..channels]);
        }
        Self {
            rect,
            data_type,
            data,
        }
    }

    /// Wrap existing channel data. `data.len()` must equal `area * channels`.
    pub fn from_data(data_type: DataType, rect: Rect, data: Vec<f32>) -> TilecompResult<Self> {
        let expected = rect.area() as usize * data_type.channels();
        if data.len() != expected {
            return Err(TilecompError::validation(format!(
                "buffer data length {} does not match {}x{}x{}",
                data.len(),
                rect.width(),
                rect.height(),
                data_type.channels()
            )));
        }
        Ok(Self {
            rect,
            data_type,
            data,
        })
    }

    /// Covered region.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Width of the covered region.
    pub fn width(&self) -> u32 {
        self.rect.width()
    }

    /// Height of the covered region.
    pub fn height(&self) -> u32 {
        self.rect.height()
    }

    /// Data type of the stored pixels.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Floats per pixel (1, 3 or 4).
    pub fn channels(&self) -> usize {
        self.data_type.channels()
    }

    /// Raw channel data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable raw channel data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Bytes held in RAM by the pixel storage.
    pub fn byte_len(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    fn offset(&self, x: i32, y: i32) -> Option<usize> {
        if !self.rect.contains(x, y) {
            return None;
        }
        let dx = (x - self.rect.xmin) as usize;
        let dy = (y - self.rect.ymin) as usize;
        Some((dy * self.rect.width() as usize + dx) * self.channels())
    }

    fn load(&self, offset: usize) -> Pixel {
        let mut px = TRANSPARENT;
        let c = self.channels();
        px[..c].copy_from_slice(&self.data[offset..offset + c]);
        px
    }

    /// Nearest read with per-axis edge policy.
    pub fn read(&self, x: i32, y: i32, edge_x: EdgeMode, edge_y: EdgeMode) -> Pixel {
        let w = self.rect.width() as i32;
        let h = self.rect.height() as i32;
        let (Some(lx), Some(ly)) = (
            edge_x.wrap(x.saturating_sub(self.rect.xmin), w),
            edge_y.wrap(y.saturating_sub(self.rect.ymin), h),
        ) else {
            return TRANSPARENT;
        };
        self.load((ly as usize * w as usize + lx as usize) * self.channels())
    }

    /// Read at a float coordinate with the given sampler and edge policy.
    ///
    /// Integral coordinates address pixel centres, so nearest sampling rounds.
    pub fn read_sampled(
        &self,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        edge_x: EdgeMode,
        edge_y: EdgeMode,
    ) -> Pixel {
        match sampler {
            PixelSampler::Nearest => {
                if !x.is_finite() || !y.is_finite() {
                    return TRANSPARENT;
                }
                self.read(floor_i32(x + 0.5), floor_i32(y + 0.5), edge_x, edge_y)
            }
            PixelSampler::Bilinear => self.read_bilinear(x, y, edge_x, edge_y),
            PixelSampler::Bicubic => self.read_bicubic(x, y, edge_x, edge_y),
        }
    }

    /// Bilinear read. Integral coordinates return the stored pixel exactly.
    pub fn read_bilinear(&self, x: f32, y: f32, edge_x: EdgeMode, edge_y: EdgeMode) -> Pixel {
        if !x.is_finite() || !y.is_finite() {
            return TRANSPARENT;
        }
        let x1 = x.floor();
        let y1 = y.floor();
        let fx = x - x1;
        let fy = y - y1;
        let (x1, y1) = (x1 as i32, y1 as i32);

        let c00 = self.read(x1, y1, edge_x, edge_y);
        let (x2, y2) = (x1.saturating_add(1), y1.saturating_add(1));
        let c01 = self.read(x1, y2, edge_x, edge_y);
        let c10 = self.read(x2, y1, edge_x, edge_y);
        let c11 = self.read(x2, y2, edge_x, edge_y);

        let mut out = TRANSPARENT;
        for c in 0..self.channels() {
            let left = c00[c] * (1.0 - fy) + c01[c] * fy;
            let right = c10[c] * (1.0 - fy) + c11[c] * fy;
            out[c] = left * (1.0 - fx) + right * fx;
        }
        out
    }

    /// Bicubic (Catmull-Rom) read over the surrounding 4x4 pixels.
    pub fn read_bicubic(&self, x: f32, y: f32, edge_x: EdgeMode, edge_y: EdgeMode) -> Pixel {
        if !x.is_finite() || !y.is_finite() {
            return TRANSPARENT;
        }
        let x1 = x.floor();
        let y1 = y.floor();
        let wx = cubic_weights(x - x1);
        let wy = cubic_weights(y - y1);
        let (x1, y1) = (x1 as i32, y1 as i32);

        let mut out = TRANSPARENT;
        for (j, wyj) in wy.iter().enumerate() {
            let sy = y1.saturating_add(j as i32 - 1);
            for (i, wxi) in wx.iter().enumerate() {
                let sx = x1.saturating_add(i as i32 - 1);
                let px = self.read(sx, sy, edge_x, edge_y);
                let w = wxi * wyj;
                for c in 0..self.channels() {
                    out[c] += px[c] * w;
                }
            }
        }
        out
    }

    /// Overwrite one pixel. Writes outside `rect` are ignored.
    pub fn write_pixel(&mut self, x: i32, y: i32, px: &Pixel) {
        if let Some(o) = self.offset(x, y) {
            let c = self.channels();
            self.data[o..o + c].copy_from_slice(&px[..c]);
        }
    }

    /// Accumulate into one pixel. Writes outside `rect` are ignored.
    pub fn add_pixel(&mut self, x: i32, y: i32, px: &Pixel) {
        if let Some(o) = self.offset(x, y) {
            let c = self.channels();
            for (dst, src) in self.data[o..o + c].iter_mut().zip(&px[..c]) {
                *dst += src;
            }
        }
    }

    /// Deep copy.
    pub fn duplicate(&self) -> MemoryBuffer {
        self.clone()
    }

    /// Copy the overlapping area of `other` into `self`, converting channel layout if needed.
    ///
    /// Pixels of `self` outside the overlap are left untouched.
    pub fn copy_content_from(&mut self, other: &MemoryBuffer) {
        let Some(overlap) = self.rect.intersect(&other.rect) else {
            return;
        };
        if self.data_type == other.data_type {
            let c = self.channels();
            let row_len = overlap.width() as usize * c;
            for y in overlap.ymin..overlap.ymax {
                let (Some(dst), Some(src)) =
                    (self.offset(overlap.xmin, y), other.offset(overlap.xmin, y))
                else {
                    continue;
                };
                self.data[dst..dst + row_len].copy_from_slice(&other.data[src..src + row_len]);
            }
            return;
        }
        for y in overlap.ymin..overlap.ymax {
            for x in overlap.xmin..overlap.xmax {
                let px = other.read(x, y, EdgeMode::Zero, EdgeMode::Zero);
                let px = other.data_type.convert(self.data_type, px);
                self.write_pixel(x, y, &px);
            }
        }
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Largest first-channel value, optionally restricted to `area`.
    ///
    /// Returns `0.0` for an empty region.
    pub fn max_value(&self, area: Option<Rect>) -> f32 {
        let area = match area {
            Some(a) => match a.intersect(&self.rect) {
                Some(a) => a,
                None => return 0.0,
            },
            None => self.rect,
        };
        let mut max: Option<f32> = None;
        for y in area.ymin..area.ymax {
            for x in area.xmin..area.xmax {
                if let Some(o) = self.offset(x, y) {
                    let v = self.data[o];
                    max = Some(max.map_or(v, |m: f32| m.max(v)));
                }
            }
        }
        max.unwrap_or(0.0)
    }

    /// Single-channel copy holding the first channel of every pixel.
    pub fn to_value_buffer(&self) -> MemoryBuffer {
        let c = self.channels();
        let data = self.data.chunks_exact(c).map(|px| px[0]).collect();
        MemoryBuffer {
            rect: self.rect,
            data_type: DataType::Value,
            data,
        }
    }
}

/// `floor` into `i32`, saturating at the type bounds. NaN maps to zero.
pub(crate) fn floor_i32(v: f32) -> i32 {
    v.floor() as i32
}

#[cfg(test)]
#[path = "../../tests/unit/buffer/memory_buffer.rs"]
mod tests;
