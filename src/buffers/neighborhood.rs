use crate::buffers::render_buffer::{RenderBuffer, pixel_index};
use crate::foundation::core::PixelRect;

/// One tile of a denoise neighborhood: its buffer and placement.
#[derive(Clone, Copy, Debug)]
pub struct NeighborSlot<'a> {
    /// Buffer holding the tile's pixels.
    pub buffer: &'a RenderBuffer,
    /// Pixel index of image position `(0, 0)` in `buffer`.
    pub offset: i64,
    /// Row stride in pixels.
    pub stride: i64,
}

/// Read-only 3×3 arrangement of tiles around a denoise tile (slot 4 is the center).
///
/// Tile column `i` spans `[tile_x[i], tile_x[i + 1])`, rows likewise. Missing neighbors and
/// pixels outside every tile read as `None`, which kernels treat as zeros.
#[derive(Clone, Copy, Debug)]
pub struct TileNeighborhood<'a> {
    slots: [Option<NeighborSlot<'a>>; 9],
    tile_x: [i32; 4],
    tile_y: [i32; 4],
    pass_denoising: usize,
}

impl<'a> TileNeighborhood<'a> {
    /// Assemble a neighborhood from its slots and column/row boundaries.
    pub fn new(
        slots: [Option<NeighborSlot<'a>>; 9],
        tile_x: [i32; 4],
        tile_y: [i32; 4],
        pass_denoising: usize,
    ) -> Self {
        Self {
            slots,
            tile_x,
            tile_y,
            pass_denoising,
        }
    }

    /// Neighborhood made of a single tile covering `rect`.
    pub fn single(slot: NeighborSlot<'a>, rect: PixelRect, pass_denoising: usize) -> Self {
        let mut slots = [None; 9];
        slots[4] = Some(slot);
        Self {
            slots,
            tile_x: [rect.x0, rect.x0, rect.x1, rect.x1],
            tile_y: [rect.y0, rect.y0, rect.y1, rect.y1],
            pass_denoising,
        }
    }

    /// Union of the tile extents.
    pub fn extent(&self) -> PixelRect {
        PixelRect::new(self.tile_x[0], self.tile_y[0], self.tile_x[3], self.tile_y[3])
    }

    /// Denoising block of pixel `(x, y)` in `frame`.
    #[inline]
    pub fn denoising(&self, x: i32, y: i32, frame: usize) -> Option<&'a [f32]> {
        if !self.extent().contains(x, y) {
            return None;
        }
        let column = boundary_index(&self.tile_x, x);
        let row = boundary_index(&self.tile_y, y);
        let slot = self.slots[row * 3 + column]?;
        let index = pixel_index(slot.offset, slot.stride, x, y)?;
        slot.buffer.pixel(index, frame)?.get(self.pass_denoising..)
    }
}

#[inline]
fn boundary_index(bounds: &[i32; 4], v: i32) -> usize {
    if v < bounds[1] {
        0
    } else if v < bounds[2] {
        1
    } else {
        2
    }
}

#[cfg(test)]
#[path = "../../tests/unit/buffers/neighborhood.rs"]
mod tests;
