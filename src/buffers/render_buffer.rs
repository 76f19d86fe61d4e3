use std::sync::{Arc, RwLock};

use crate::buffers::film::FilmParams;
use crate::foundation::error::{EmberError, EmberResult, checked_len, try_alloc_zeroed};

/// Geometry and pass layout of a render buffer.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BufferParams {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Number of temporal frames stored back to back.
    pub frames: usize,
    /// Margin, in pixels, rendered around the useful area for denoising only.
    pub overscan: i32,
    /// Per-pixel pass layout.
    pub film: FilmParams,
}

impl BufferParams {
    /// Single-frame buffer without overscan.
    pub fn new(width: usize, height: usize, film: FilmParams) -> Self {
        Self {
            width,
            height,
            frames: 1,
            overscan: 0,
            film,
        }
    }
}

/// Per-pixel accumulation storage plus one RNG state word per pixel.
///
/// Pixel `i` of frame `f` starts at `i * pass_stride + f * frame_stride`.
#[derive(Debug)]
pub struct RenderBuffer {
    params: BufferParams,
    frame_stride: usize,
    data: Vec<f32>,
    rng_state: Vec<u32>,
}

/// Render buffers are shared between the tiles that write them and the denoise tiles reading
/// their neighborhood.
pub type SharedRenderBuffer = Arc<RwLock<RenderBuffer>>;

impl RenderBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(params: BufferParams) -> EmberResult<Self> {
        params.film.validate()?;
        if params.width == 0 || params.height == 0 || params.frames == 0 {
            return Err(EmberError::validation(
                "render buffer width, height and frames must be >= 1",
            ));
        }
        if params.overscan < 0 {
            return Err(EmberError::validation("render buffer overscan must be >= 0"));
        }

        let pixels = checked_len(&[params.width, params.height], "render buffer")?;
        let frame_stride = checked_len(&[pixels, params.film.pass_stride], "render buffer")?;
        let len = checked_len(&[frame_stride, params.frames], "render buffer")?;
        let data = try_alloc_zeroed(len, "render buffer passes")?;
        let rng_state = try_alloc_zeroed(pixels, "render buffer rng state")?;
        Ok(Self {
            params,
            frame_stride,
            data,
            rng_state,
        })
    }

    /// Wrap the buffer for sharing between tiles.
    pub fn into_shared(self) -> SharedRenderBuffer {
        Arc::new(RwLock::new(self))
    }

    /// Geometry and layout.
    pub fn params(&self) -> &BufferParams {
        &self.params
    }

    /// Pixels per frame.
    pub fn num_pixels(&self) -> usize {
        self.params.width * self.params.height
    }

    /// Floats between two consecutive frames.
    pub fn frame_stride(&self) -> usize {
        self.frame_stride
    }

    /// All passes of one pixel, or `None` when out of range.
    pub fn pixel(&self, index: usize, frame: usize) -> Option<&[f32]> {
        let start = self.pixel_start(index, frame)?;
        self.data.get(start..start + self.params.film.pass_stride)
    }

    /// Mutable passes of one pixel, or `None` when out of range.
    pub fn pixel_mut(&mut self, index: usize, frame: usize) -> Option<&mut [f32]> {
        let start = self.pixel_start(index, frame)?;
        let end = start + self.params.film.pass_stride;
        self.data.get_mut(start..end)
    }

    /// Frame-0 passes and RNG state of one pixel, borrowed together for path tracing.
    pub fn pixel_and_rng_mut(&mut self, index: usize) -> Option<(&mut [f32], &mut u32)> {
        let start = self.pixel_start(index, 0)?;
        let end = start + self.params.film.pass_stride;
        let passes = self.data.get_mut(start..end)?;
        let rng = self.rng_state.get_mut(index)?;
        Some((passes, rng))
    }

    /// Raw pass data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Raw mutable pass data.
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Per-pixel RNG state.
    pub fn rng_state(&self) -> &[u32] {
        &self.rng_state
    }

    /// Derive every pixel's RNG state from `seed`.
    pub fn seed_rng(&mut self, seed: u32) {
        for (i, state) in self.rng_state.iter_mut().enumerate() {
            *state = hash_u32(seed ^ hash_u32(i as u32));
        }
    }

    /// Zero every pass and keep the RNG state.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    fn pixel_start(&self, index: usize, frame: usize) -> Option<usize> {
        if index >= self.num_pixels() || frame >= self.params.frames {
            return None;
        }
        Some(index * self.params.film.pass_stride + frame * self.frame_stride)
    }
}

/// Pixel index of `(x, y)` for a tile placed at `offset` with row `stride`.
pub fn pixel_index(offset: i64, stride: i64, x: i32, y: i32) -> Option<usize> {
    let index = offset
        .checked_add(i64::from(x))?
        .checked_add(i64::from(y).checked_mul(stride)?)?;
    usize::try_from(index).ok()
}

fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

#[cfg(test)]
#[path = "../../tests/unit/buffers/render_buffer.rs"]
mod tests;
