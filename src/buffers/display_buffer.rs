use crate::foundation::core::PixelRect;
use crate::foundation::error::{EmberError, EmberResult, try_alloc_zeroed};

/// Pixel storage of a display buffer.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayPixels {
    /// 8-bit RGBA.
    Byte(Vec<[u8; 4]>),
    /// Half-float RGBA stored as raw bits.
    Half(Vec<[u16; 4]>),
}

/// Film-conversion target covering `rect` in image coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayBuffer {
    rect: PixelRect,
    pixels: DisplayPixels,
}

impl DisplayBuffer {
    /// Zeroed 8-bit buffer.
    pub fn new_byte(rect: PixelRect) -> EmberResult<Self> {
        Self::check(rect)?;
        Ok(Self {
            rect,
            pixels: DisplayPixels::Byte(try_alloc_zeroed(rect.area(), "byte display buffer")?),
        })
    }

    /// Zeroed half-float buffer.
    pub fn new_half(rect: PixelRect) -> EmberResult<Self> {
        Self::check(rect)?;
        Ok(Self {
            rect,
            pixels: DisplayPixels::Half(try_alloc_zeroed(rect.area(), "half display buffer")?),
        })
    }

    fn check(rect: PixelRect) -> EmberResult<()> {
        if rect.is_empty() {
            return Err(EmberError::validation("display buffer rect must not be empty"));
        }
        Ok(())
    }

    /// Covered rectangle.
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Pixel storage.
    pub fn pixels(&self) -> &DisplayPixels {
        &self.pixels
    }

    /// Store a converted run of 8-bit pixels starting at `(x, y)`.
    pub(crate) fn write_byte_row(&mut self, x: i32, y: i32, row: &[[u8; 4]]) -> EmberResult<()> {
        let span = self.row_span(x, y, row.len())?;
        match &mut self.pixels {
            DisplayPixels::Byte(px) => {
                px[span].copy_from_slice(row);
                Ok(())
            }
            DisplayPixels::Half(_) => Err(EmberError::render(
                "byte conversion into a half display buffer",
            )),
        }
    }

    /// Store a converted run of half pixels starting at `(x, y)`.
    pub(crate) fn write_half_row(&mut self, x: i32, y: i32, row: &[[u16; 4]]) -> EmberResult<()> {
        let span = self.row_span(x, y, row.len())?;
        match &mut self.pixels {
            DisplayPixels::Half(px) => {
                px[span].copy_from_slice(row);
                Ok(())
            }
            DisplayPixels::Byte(_) => Err(EmberError::render(
                "half conversion into a byte display buffer",
            )),
        }
    }

    fn row_span(&self, x: i32, y: i32, len: usize) -> EmberResult<std::ops::Range<usize>> {
        let fits = i64::from(x) + len as i64 <= i64::from(self.rect.x1);
        match self.index_of(x, y) {
            Some(start) if fits => Ok(start..start + len),
            _ => Err(EmberError::render(format!(
                "display row of {len} pixels at ({x}, {y}) is outside {:?}",
                self.rect
            ))),
        }
    }

    /// Row-major index of image pixel `(x, y)`.
    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if !self.rect.contains(x, y) {
            return None;
        }
        let w = self.rect.width() as usize;
        Some((y - self.rect.y0) as usize * w + (x - self.rect.x0) as usize)
    }

    /// 8-bit pixel at `(x, y)`, `None` for half buffers or outside pixels.
    pub fn byte_at(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let index = self.index_of(x, y)?;
        match &self.pixels {
            DisplayPixels::Byte(px) => px.get(index).copied(),
            DisplayPixels::Half(_) => None,
        }
    }

    /// Half pixel at `(x, y)`, `None` for byte buffers or outside pixels.
    pub fn half_at(&self, x: i32, y: i32) -> Option<[u16; 4]> {
        let index = self.index_of(x, y)?;
        match &self.pixels {
            DisplayPixels::Half(px) => px.get(index).copied(),
            DisplayPixels::Byte(_) => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/buffers/display_buffer.rs"]
mod tests;
