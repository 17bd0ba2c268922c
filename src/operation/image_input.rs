use crate::buffer::memory_buffer::MemoryBuffer;
use crate::buffer::sampler::{EdgeMode, PixelSampler};
use crate::foundation::core::{DataType, Pixel, Rect, Resolution};
use crate::foundation::error::{TilecompError, TilecompResult};
use crate::operation::core::{InputSockets, Operation, TileData};
use crate::operation::inputs::PixelInputs;
use std::path::Path;
use std::sync::Arc;

/// Source operation backed by an in-memory image. Its resolution is the image size.
#[derive(Clone, Debug)]
pub struct ImageOperation {
    pixels: Arc<MemoryBuffer>,
}

impl ImageOperation {
    /// Wrap a buffer. The buffer is re-anchored at the origin.
    pub fn new(buffer: MemoryBuffer) -> TilecompResult<Self> {
        if buffer.rect().is_empty() {
            return Err(TilecompError::validation("image operation needs a non-empty buffer"));
        }
        let rect = buffer.rect();
        let pixels = if rect.xmin == 0 && rect.ymin == 0 {
            buffer
        } else {
            let data_type = buffer.data_type();
            MemoryBuffer::from_data(
                data_type,
                Rect::from_size(rect.width(), rect.height()),
                buffer.data().to_vec(),
            )?
        };
        Ok(Self {
            pixels: Arc::new(pixels),
        })
    }

    /// Convert an 8-bit RGBA image (straight alpha) into a colour source.
    pub fn from_rgba8(img: &image::RgbaImage) -> TilecompResult<Self> {
        let (w, h) = img.dimensions();
        let data = img.as_raw().iter().map(|&c| f32::from(c) / 255.0).collect();
        Self::new(MemoryBuffer::from_data(DataType::Color, Rect::from_size(w, h), data)?)
    }

    /// Decode an image file through the `image` crate.
    pub fn load(path: &Path) -> TilecompResult<Self> {
        let img = image::open(path).map_err(|e| {
            TilecompError::validation(format!("decode image '{}': {e}", path.display()))
        })?;
        Self::from_rgba8(&img.to_rgba8())
    }

    /// Image size.
    pub fn size(&self) -> Resolution {
        Resolution::new(self.pixels.width(), self.pixels.height())
    }
}

impl Operation for ImageOperation {
    fn name(&self) -> &str {
        "Image"
    }

    fn inputs(&self) -> InputSockets {
        InputSockets::new()
    }

    fn output_type(&self) -> DataType {
        self.pixels.data_type()
    }

    fn determine_resolution(&self, _main_input: Option<Resolution>, _preferred: Resolution) -> Resolution {
        self.size()
    }

    fn execute_pixel(
        &self,
        out: &mut Pixel,
        x: f32,
        y: f32,
        sampler: PixelSampler,
        _inputs: &PixelInputs<'_>,
        _tile: Option<&TileData>,
    ) {
        *out = self
            .pixels
            .read_sampled(x, y, sampler, EdgeMode::Zero, EdgeMode::Zero);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/operation/image_input.rs"]
mod tests;
