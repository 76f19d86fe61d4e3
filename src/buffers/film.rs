//! Per-pixel pass layout of render buffers.

use crate::foundation::error::{EmberError, EmberResult};

/// Offsets inside the denoising block of a render-buffer pixel.
///
/// Each feature is stored as a running sum over samples followed by its sum of squares, so the
/// prefilter can recover both the mean and the variance of the mean.
#[derive(Clone, Copy, Debug)]
pub struct DenoisingLayout;

impl DenoisingLayout {
    /// Normal x, y, z sums.
    pub const NORMAL: usize = 0;
    /// Normal sums of squares.
    pub const NORMAL_SQUARED: usize = 3;
    /// Albedo r, g, b sums.
    pub const ALBEDO: usize = 6;
    /// Albedo sums of squares.
    pub const ALBEDO_SQUARED: usize = 9;
    /// Depth sum.
    pub const DEPTH: usize = 12;
    /// Depth sum of squares.
    pub const DEPTH_SQUARED: usize = 13;
    /// Shadow half A: unoccluded weight, visibility sum, visibility sum of squares.
    pub const SHADOW_A: usize = 14;
    /// Shadow half B, same triple as [`Self::SHADOW_A`].
    pub const SHADOW_B: usize = 17;
    /// Color r, g, b sums.
    pub const COLOR: usize = 20;
    /// Color sums of squares.
    pub const COLOR_SQUARED: usize = 23;
    /// Second color estimator (cross-denoise only).
    pub const COLOR_SECOND: usize = 26;
    /// Second color estimator sums of squares (cross-denoise only).
    pub const COLOR_SECOND_SQUARED: usize = 29;

    /// Number of floats in the block.
    pub const fn size(cross_denoise: bool) -> usize {
        if cross_denoise { 32 } else { 26 }
    }
}

/// Number of floats of the combined RGBA pass at the start of every pixel.
pub const COMBINED_PASS_SIZE: usize = 4;

/// Pass layout shared by every render buffer of a session and by the kernels writing them.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FilmParams {
    /// Floats per pixel.
    pub pass_stride: usize,
    /// Offset of the denoising block.
    pub pass_denoising: usize,
    /// Offset of the not-denoised color pass (3 floats) added back after reconstruction.
    pub pass_no_denoising: Option<usize>,
    /// Whether the denoising block carries a second, independent color estimator.
    pub cross_denoise: bool,
}

impl FilmParams {
    /// Combined RGBA followed directly by the denoising block.
    pub fn standard(cross_denoise: bool) -> Self {
        Self {
            pass_stride: COMBINED_PASS_SIZE + DenoisingLayout::size(cross_denoise),
            pass_denoising: COMBINED_PASS_SIZE,
            pass_no_denoising: None,
            cross_denoise,
        }
    }

    /// Append a not-denoised color pass to the layout.
    pub fn with_no_denoising(mut self) -> Self {
        self.pass_no_denoising = Some(self.pass_stride);
        self.pass_stride += 3;
        self
    }

    /// Check that the combined pass, the denoising block and the optional extra pass fit in the
    /// pixel without overlapping.
    pub fn validate(&self) -> EmberResult<()> {
        let block = DenoisingLayout::size(self.cross_denoise);
        if self.pass_denoising < COMBINED_PASS_SIZE {
            return Err(EmberError::validation(
                "film pass_denoising overlaps the combined pass",
            ));
        }
        let block_end = self.pass_denoising + block;
        if block_end > self.pass_stride {
            return Err(EmberError::validation(format!(
                "film denoising block [{}, {block_end}) exceeds pass_stride {}",
                self.pass_denoising, self.pass_stride
            )));
        }
        if let Some(extra) = self.pass_no_denoising {
            let overlaps_block = extra < block_end && self.pass_denoising < extra + 3;
            if extra < COMBINED_PASS_SIZE || overlaps_block || extra + 3 > self.pass_stride {
                return Err(EmberError::validation(format!(
                    "film pass_no_denoising at {extra} overlaps another pass or the pixel end"
                )));
            }
        }
        Ok(())
    }
}

/// Features of one path-traced sample, as accumulated into the denoising block.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DenoisingSample {
    /// Radiance of the sample.
    pub color: [f32; 3],
    /// Independent second radiance estimate, accumulated only in cross-denoise layouts.
    pub color_second: [f32; 3],
    /// Shading normal at the first hit.
    pub normal: [f32; 3],
    /// Albedo at the first hit.
    pub albedo: [f32; 3],
    /// Camera distance of the first hit.
    pub depth: f32,
    /// Light visibility in `[0, 1]`.
    pub visibility: f32,
}

impl FilmParams {
    /// Add one sample to the combined pass and the denoising block of `passes`.
    ///
    /// Even samples feed shadow half A and odd samples half B.
    pub fn accumulate_sample(&self, passes: &mut [f32], sample: u32, s: &DenoisingSample) {
        for c in 0..3 {
            passes[c] += s.color[c];
        }
        passes[3] += 1.0;

        let block = &mut passes[self.pass_denoising..];
        let mut put = |mean: usize, square: usize, value: f32| {
            block[mean] += value;
            block[square] += value * value;
        };
        for c in 0..3 {
            put(DenoisingLayout::NORMAL + c, DenoisingLayout::NORMAL_SQUARED + c, s.normal[c]);
            put(DenoisingLayout::ALBEDO + c, DenoisingLayout::ALBEDO_SQUARED + c, s.albedo[c]);
            put(DenoisingLayout::COLOR + c, DenoisingLayout::COLOR_SQUARED + c, s.color[c]);
            if self.cross_denoise {
                put(
                    DenoisingLayout::COLOR_SECOND + c,
                    DenoisingLayout::COLOR_SECOND_SQUARED + c,
                    s.color_second[c],
                );
            }
        }
        put(DenoisingLayout::DEPTH, DenoisingLayout::DEPTH_SQUARED, s.depth);

        let half = if sample % 2 == 0 {
            DenoisingLayout::SHADOW_A
        } else {
            DenoisingLayout::SHADOW_B
        };
        block[half] += 1.0;
        block[half + 1] += s.visibility;
        block[half + 2] += s.visibility * s.visibility;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/buffers/film.rs"]
mod tests;
