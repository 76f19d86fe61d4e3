//! Scratch buffer of the denoiser's prefiltered features.

use crate::foundation::core::{PixelRect, align_up};
use crate::foundation::error::{EmberError, EmberResult, checked_len, try_alloc_zeroed};

/// Index of a pass inside a [`FilterBuffer`].
///
/// Every feature pass is followed by its variance pass. The shadow step of the prefilter uses
/// passes 0 to 5 as scratch before the features are written, and the feature step uses the color
/// pass as scratch before the color copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterPass(u8);

#[allow(missing_docs)]
impl FilterPass {
    pub const NORMAL_X: FilterPass = FilterPass(0);
    pub const NORMAL_Y: FilterPass = FilterPass(2);
    pub const NORMAL_Z: FilterPass = FilterPass(4);
    pub const DEPTH: FilterPass = FilterPass(6);
    pub const SHADOW: FilterPass = FilterPass(8);
    pub const ALBEDO_R: FilterPass = FilterPass(10);
    pub const ALBEDO_G: FilterPass = FilterPass(12);
    pub const ALBEDO_B: FilterPass = FilterPass(14);
    pub const COLOR_R: FilterPass = FilterPass(16);
    pub const COLOR_G: FilterPass = FilterPass(18);
    pub const COLOR_B: FilterPass = FilterPass(20);
    pub const COLOR_SECOND_R: FilterPass = FilterPass(22);
    pub const COLOR_SECOND_G: FilterPass = FilterPass(24);
    pub const COLOR_SECOND_B: FilterPass = FilterPass(26);

    pub const SHADOW_SAMPLE_VARIANCE: FilterPass = FilterPass(0);
    pub const SHADOW_SAMPLE_VARIANCE_VARIANCE: FilterPass = FilterPass(1);
    pub const SHADOW_BUFFER_VARIANCE: FilterPass = FilterPass(2);
    pub const SHADOW_CLEAN_VARIANCE: FilterPass = FilterPass(3);
    pub const SHADOW_HALF_A: FilterPass = FilterPass(4);
    pub const SHADOW_HALF_B: FilterPass = FilterPass(5);
    pub const FEATURE_SCRATCH: FilterPass = FilterPass(16);

    /// Variance pass that follows this feature pass.
    pub const fn variance(self) -> FilterPass {
        FilterPass(self.0 + 1)
    }

    /// Numeric pass index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Number of passes of a filter buffer.
    pub const fn count(cross_denoise: bool) -> usize {
        if cross_denoise { 28 } else { 22 }
    }
}

/// Read-only view of frame 0 of a filter buffer, used by the regression kernels.
#[derive(Clone, Copy, Debug)]
pub struct FilterBufferView<'a> {
    data: &'a [f32],
    pass_stride: usize,
    width: usize,
}

impl<'a> FilterBufferView<'a> {
    /// Value of `pass` at local pixel index `index` (`y * width + x`).
    #[inline(always)]
    pub fn value(&self, pass: FilterPass, index: usize) -> f32 {
        self.data[pass.index() * self.pass_stride + index]
    }

    /// Value addressed by a raw pass index.
    #[inline(always)]
    pub fn raw(&self, pass: usize, index: usize) -> f32 {
        self.data[pass * self.pass_stride + index]
    }

    /// Padded row stride.
    pub fn width(&self) -> usize {
        self.width
    }

    /// All frames of all passes.
    pub fn data(&self) -> &'a [f32] {
        self.data
    }

    /// Floats per pass.
    pub fn pass_stride(&self) -> usize {
        self.pass_stride
    }
}

/// Prefiltered feature passes for one denoise invocation.
///
/// Pass `p`, frame `f`, local pixel `(x, y)` lives at
/// `p * pass_stride + f * width * height + y * width + x` with `width` padded to a multiple of 4.
#[derive(Debug)]
pub struct FilterBuffer {
    rect: PixelRect,
    width: usize,
    height: usize,
    frames: usize,
    pass_stride: usize,
    num_passes: usize,
    data: Vec<f32>,
}

impl FilterBuffer {
    /// Allocate a zeroed buffer covering `rect`.
    pub fn new(rect: PixelRect, frames: usize, cross_denoise: bool) -> EmberResult<Self> {
        if rect.is_empty() || frames == 0 {
            return Err(EmberError::validation(
                "filter buffer needs a non-empty rect and at least one frame",
            ));
        }
        let width = align_up(rect.width() as usize, 4);
        let height = rect.height() as usize;
        let num_passes = FilterPass::count(cross_denoise);
        let pass_stride = checked_len(&[width, height, frames], "filter buffer")?;
        let len = checked_len(&[pass_stride, num_passes], "filter buffer")?;
        let data = try_alloc_zeroed(len, "filter buffer")?;
        Ok(Self {
            rect,
            width,
            height,
            frames,
            pass_stride,
            num_passes,
            data,
        })
    }

    /// Image-space rectangle covered by local pixel `(0, 0)..(w, h)`.
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Padded row stride.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Temporal frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Floats per pass.
    pub fn pass_stride(&self) -> usize {
        self.pass_stride
    }

    /// Number of passes (22 or 28).
    pub fn num_passes(&self) -> usize {
        self.num_passes
    }

    /// Floats per frame inside one pass.
    pub fn frame_len(&self) -> usize {
        self.width * self.height
    }

    /// Frame-0 view for the regression.
    pub fn view(&self) -> FilterBufferView<'_> {
        FilterBufferView {
            data: &self.data,
            pass_stride: self.pass_stride,
            width: self.width,
        }
    }

    /// One frame of one pass.
    pub fn pass(&self, pass: FilterPass, frame: usize) -> Option<&[f32]> {
        if pass.index() >= self.num_passes || frame >= self.frames {
            return None;
        }
        let start = pass.index() * self.pass_stride + frame * self.frame_len();
        self.data.get(start..start + self.frame_len())
    }

    /// Borrow `W` passes mutably and `R` other passes shared, all restricted to `frame`.
    ///
    /// Fails when a pass is out of range or requested twice for writing, or when a pass is both
    /// written and read.
    pub fn split_frame<const W: usize, const R: usize>(
        &mut self,
        frame: usize,
        writes: [FilterPass; W],
        reads: [FilterPass; R],
    ) -> EmberResult<([&mut [f32]; W], [&[f32]; R])> {
        if frame >= self.frames {
            return Err(EmberError::render(format!(
                "filter buffer frame {frame} out of range ({} frames)",
                self.frames
            )));
        }
        let frame_len = self.frame_len();
        let base = frame * frame_len;
        let mut slots: Vec<Option<&mut [f32]>> = self
            .data
            .chunks_exact_mut(self.pass_stride)
            .map(|pass| Some(&mut pass[base..base + frame_len]))
            .collect();

        let mut written = Vec::with_capacity(W);
        for pass in writes {
            let slot = slots
                .get_mut(pass.index())
                .and_then(Option::take)
                .ok_or_else(|| unavailable(pass))?;
            written.push(slot);
        }

        let shared: Vec<Option<&[f32]>> = slots
            .into_iter()
            .map(|slot| slot.map(|pass| &*pass))
            .collect();
        let mut read = Vec::with_capacity(R);
        for pass in reads {
            let slot = shared
                .get(pass.index())
                .copied()
                .flatten()
                .ok_or_else(|| unavailable(pass))?;
            read.push(slot);
        }

        let written: [&mut [f32]; W] = written
            .try_into()
            .map_err(|_| EmberError::render("filter pass write arity mismatch"))?;
        let read: [&[f32]; R] = read
            .try_into()
            .map_err(|_| EmberError::render("filter pass read arity mismatch"))?;
        Ok((written, read))
    }
}

fn unavailable(pass: FilterPass) -> EmberError {
    EmberError::render(format!(
        "filter pass {} is out of range or already borrowed for writing",
        pass.index()
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/buffers/filter_buffer.rs"]
mod tests;
