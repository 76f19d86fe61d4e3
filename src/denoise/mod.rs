//! Two-phase denoiser: feature prefiltering followed by patch-weighted local regression.

pub mod nlm;
pub mod params;
pub(crate) mod prefilter;
pub(crate) mod regression;

use crate::buffers::film::FilmParams;
use crate::buffers::filter_buffer::{FilterBuffer, FilterPass};
use crate::buffers::neighborhood::TileNeighborhood;
use crate::buffers::render_buffer::{RenderBuffer, pixel_index};
use crate::denoise::params::{DenoiseParams, RegressionGuide};
use crate::denoise::regression::{WeightGuide, pixels, reconstruct};
use crate::dispatch::tiers::FilterKernels;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{EmberError, EmberResult};
use crate::foundation::math::Float3;
use crate::kernel::filter::LocalGrid;

/// Render buffer placement receiving the reconstruction.
#[derive(Debug)]
pub struct DenoiseTarget<'a> {
    /// Buffer of the tile being denoised.
    pub buffer: &'a mut RenderBuffer,
    /// Pixel index of image position `(0, 0)`.
    pub offset: i64,
    /// Row stride in pixels.
    pub stride: i64,
}

/// Outcome of one reconstruction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DenoiseStats {
    /// Pixels written.
    pub pixels: usize,
    /// Pixels that kept the prefiltered color because the regression was degenerate.
    pub fallbacks: usize,
}

/// Denoiser bound to a kernel family, its settings and the render-buffer layout.
#[derive(Clone, Copy, Debug)]
pub struct DenoiseEngine<'a> {
    kernels: &'a FilterKernels,
    params: &'a DenoiseParams,
    film: &'a FilmParams,
}

impl<'a> DenoiseEngine<'a> {
    /// Create an engine.
    pub fn new(
        kernels: &'a FilterKernels,
        params: &'a DenoiseParams,
        film: &'a FilmParams,
    ) -> Self {
        Self {
            kernels,
            params,
            film,
        }
    }

    /// Prefilter the features of `rect` from `view` into a fresh filter buffer.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(rect = ?rect, sample = sample, frames = frames)
    )]
    pub fn fill_buffer(
        &self,
        sample: u32,
        rect: PixelRect,
        view: &TileNeighborhood<'_>,
        frames: usize,
    ) -> EmberResult<FilterBuffer> {
        prefilter::fill_filter_buffer(
            self.kernels,
            &self.params.prefilter,
            self.film.cross_denoise,
            sample,
            rect,
            view,
            frames,
        )
    }

    /// Reconstruct every pixel of `filter_area` and write `color × sample` (plus the
    /// not-denoised pass) into the combined pass of `target`.
    #[tracing::instrument(
        level = "debug",
        skip_all,
        fields(filter_area = ?filter_area, sample = sample)
    )]
    pub fn run(
        &self,
        sample: u32,
        buffer: &FilterBuffer,
        filter_area: PixelRect,
        target: DenoiseTarget<'_>,
    ) -> EmberResult<DenoiseStats> {
        let cross = self.film.cross_denoise;
        let guide_for = |other_color: FilterPass| match self.params.guide {
            RegressionGuide::Shadow => WeightGuide::Shadow,
            RegressionGuide::Color => WeightGuide::Color(other_color),
        };

        let primary_guide = guide_for(if cross {
            FilterPass::COLOR_SECOND_R
        } else {
            FilterPass::COLOR_R
        });
        let primary = reconstruct(
            self.kernels,
            self.params,
            buffer,
            filter_area,
            FilterPass::COLOR_R,
            primary_guide,
        )?;
        let secondary = if cross {
            Some(reconstruct(
                self.kernels,
                self.params,
                buffer,
                filter_area,
                FilterPass::COLOR_SECOND_R,
                guide_for(FilterPass::COLOR_R),
            )?)
        } else {
            None
        };

        let view = buffer.view();
        let grid = LocalGrid {
            rect: buffer.rect(),
            stride: buffer.width(),
        };
        let prefiltered = |first: FilterPass, index: usize| {
            Float3::new(
                view.raw(first.index(), index),
                view.raw(first.index() + 2, index),
                view.raw(first.index() + 4, index),
            )
        };

        let mut stats = DenoiseStats::default();
        for (i, (x, y)) in pixels(filter_area).enumerate() {
            let local = grid.index(x, y);
            let (solved, fallback) = match &secondary {
                Some(second) => (
                    primary[i].zip(second[i]).map(|(a, b)| (a + b) * 0.5),
                    (prefiltered(FilterPass::COLOR_R, local)
                        + prefiltered(FilterPass::COLOR_SECOND_R, local))
                        * 0.5,
                ),
                None => (primary[i], prefiltered(FilterPass::COLOR_R, local)),
            };
            let color = solved.unwrap_or_else(|| {
                stats.fallbacks += 1;
                fallback
            });
            let color = Float3::new(color.x.max(0.0), color.y.max(0.0), color.z.max(0.0))
                * sample as f32;

            let missing =
                || EmberError::render(format!("denoise target has no pixel at ({x}, {y})"));
            let index = pixel_index(target.offset, target.stride, x, y).ok_or_else(missing)?;
            let pixel = target.buffer.pixel_mut(index, 0).ok_or_else(missing)?;
            let mut out = color;
            if let Some(extra) = self.film.pass_no_denoising {
                out += Float3::new(pixel[extra], pixel[extra + 1], pixel[extra + 2]);
            }
            pixel[0] = out.x;
            pixel[1] = out.y;
            pixel[2] = out.z;
            stats.pixels += 1;
        }

        if stats.fallbacks > 0 {
            tracing::warn!(
                fallbacks = stats.fallbacks,
                pixels = stats.pixels,
                "regression was degenerate, kept prefiltered color"
            );
        }
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/denoise/engine.rs"]
mod tests;
