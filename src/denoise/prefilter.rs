//! Feature prefilter: fills a [`FilterBuffer`] from a tile neighborhood.

use crate::buffers::film::DenoisingLayout;
use crate::buffers::filter_buffer::{FilterBuffer, FilterPass};
use crate::buffers::neighborhood::TileNeighborhood;
use crate::denoise::nlm::{NlmInputs, NlmParams, NlmScratch, non_local_means};
use crate::denoise::params::PrefilterTuning;
use crate::dispatch::tiers::FilterKernels;
use crate::foundation::core::PixelRect;
use crate::foundation::error::EmberResult;
use crate::kernel::filter::{FeatureRequest, HalvesOut, LocalGrid, ShadowPasses};

/// Render-buffer mean/variance offsets and the filter pass each prefiltered feature lands in.
const FEATURES: [(usize, usize, FilterPass); 7] = [
    (DenoisingLayout::NORMAL, DenoisingLayout::NORMAL_SQUARED, FilterPass::NORMAL_X),
    (DenoisingLayout::NORMAL + 1, DenoisingLayout::NORMAL_SQUARED + 1, FilterPass::NORMAL_Y),
    (DenoisingLayout::NORMAL + 2, DenoisingLayout::NORMAL_SQUARED + 2, FilterPass::NORMAL_Z),
    (DenoisingLayout::ALBEDO, DenoisingLayout::ALBEDO_SQUARED, FilterPass::ALBEDO_R),
    (DenoisingLayout::ALBEDO + 1, DenoisingLayout::ALBEDO_SQUARED + 1, FilterPass::ALBEDO_G),
    (DenoisingLayout::ALBEDO + 2, DenoisingLayout::ALBEDO_SQUARED + 2, FilterPass::ALBEDO_B),
    (DenoisingLayout::DEPTH, DenoisingLayout::DEPTH_SQUARED, FilterPass::DEPTH),
];

/// Color channels copied without filtering.
const COLORS: [(usize, usize, FilterPass); 6] = [
    (DenoisingLayout::COLOR, DenoisingLayout::COLOR_SQUARED, FilterPass::COLOR_R),
    (DenoisingLayout::COLOR + 1, DenoisingLayout::COLOR_SQUARED + 1, FilterPass::COLOR_G),
    (DenoisingLayout::COLOR + 2, DenoisingLayout::COLOR_SQUARED + 2, FilterPass::COLOR_B),
    (
        DenoisingLayout::COLOR_SECOND,
        DenoisingLayout::COLOR_SECOND_SQUARED,
        FilterPass::COLOR_SECOND_R,
    ),
    (
        DenoisingLayout::COLOR_SECOND + 1,
        DenoisingLayout::COLOR_SECOND_SQUARED + 1,
        FilterPass::COLOR_SECOND_G,
    ),
    (
        DenoisingLayout::COLOR_SECOND + 2,
        DenoisingLayout::COLOR_SECOND_SQUARED + 2,
        FilterPass::COLOR_SECOND_B,
    ),
];

struct Prefilter<'a> {
    kernels: &'a FilterKernels,
    grid: LocalGrid,
    size: (i32, i32, usize),
    scratch: NlmScratch,
}

impl Prefilter<'_> {
    fn for_each_pixel(&self, mut f: impl FnMut(i32, i32)) {
        let rect = self.grid.rect;
        for y in rect.y0..rect.y1 {
            for x in rect.x0..rect.x1 {
                f(x, y);
            }
        }
    }

    fn nlm(
        &mut self,
        buffer: &mut FilterBuffer,
        frame: usize,
        out: FilterPass,
        [image, guide, variance]: [FilterPass; 3],
        params: NlmParams,
    ) -> EmberResult<()> {
        // `image` and `guide` may be the same pass.
        let ([dst], [image, guide, variance]) =
            buffer.split_frame(frame, [out], [image, guide, variance])?;
        non_local_means(
            self.kernels,
            self.size,
            NlmInputs {
                image,
                guide,
                variance,
            },
            dst,
            &mut self.scratch,
            params,
        )
    }

    fn shadow(
        &mut self,
        buffer: &mut FilterBuffer,
        view: &TileNeighborhood<'_>,
        frame: usize,
        tuning: &PrefilterTuning,
    ) -> EmberResult<()> {
        {
            let ([a, b, sample_variance, sample_variance_variance, buffer_variance], []) = buffer
                .split_frame(
                    frame,
                    [
                        FilterPass::SHADOW_HALF_A,
                        FilterPass::SHADOW_HALF_B,
                        FilterPass::SHADOW_SAMPLE_VARIANCE,
                        FilterPass::SHADOW_SAMPLE_VARIANCE_VARIANCE,
                        FilterPass::SHADOW_BUFFER_VARIANCE,
                    ],
                    [],
                )?;
            let mut out = ShadowPasses {
                unfiltered_a: a,
                unfiltered_b: b,
                sample_variance,
                sample_variance_variance,
                buffer_variance,
            };
            let divide_shadow = self.kernels.divide_shadow.get();
            let grid = self.grid;
            self.for_each_pixel(|x, y| divide_shadow(view, frame, x, y, &mut out, grid));
        }

        // Smooth the buffer variance, guided by the sample variance.
        self.nlm(
            buffer,
            frame,
            FilterPass::SHADOW_CLEAN_VARIANCE,
            [
                FilterPass::SHADOW_BUFFER_VARIANCE,
                FilterPass::SHADOW_SAMPLE_VARIANCE,
                FilterPass::SHADOW_SAMPLE_VARIANCE_VARIANCE,
            ],
            tuning.buffer_variance,
        )?;

        // Filter each half guided by the other.
        self.nlm(
            buffer,
            frame,
            FilterPass::SHADOW_SAMPLE_VARIANCE,
            [
                FilterPass::SHADOW_HALF_A,
                FilterPass::SHADOW_HALF_B,
                FilterPass::SHADOW_CLEAN_VARIANCE,
            ],
            tuning.shadow_first,
        )?;
        self.nlm(
            buffer,
            frame,
            FilterPass::SHADOW_BUFFER_VARIANCE,
            [
                FilterPass::SHADOW_HALF_B,
                FilterPass::SHADOW_HALF_A,
                FilterPass::SHADOW_CLEAN_VARIANCE,
            ],
            tuning.shadow_first,
        )?;

        // Residual variance of the filtered halves.
        {
            let ([residual], [a, b]) = buffer.split_frame(
                frame,
                [FilterPass::SHADOW_SAMPLE_VARIANCE_VARIANCE],
                [FilterPass::SHADOW_SAMPLE_VARIANCE, FilterPass::SHADOW_BUFFER_VARIANCE],
            )?;
            let combine_halves = self.kernels.combine_halves.get();
            let (grid, radius) = (self.grid, tuning.combine_radius);
            self.for_each_pixel(|x, y| {
                let out = HalvesOut {
                    mean: None,
                    variance: Some(&mut *residual),
                };
                combine_halves(x, y, out, a, b, grid, radius);
            });
        }

        self.nlm(
            buffer,
            frame,
            FilterPass::SHADOW_HALF_A,
            [
                FilterPass::SHADOW_SAMPLE_VARIANCE,
                FilterPass::SHADOW_BUFFER_VARIANCE,
                FilterPass::SHADOW_SAMPLE_VARIANCE_VARIANCE,
            ],
            tuning.shadow_second,
        )?;
        self.nlm(
            buffer,
            frame,
            FilterPass::SHADOW_HALF_B,
            [
                FilterPass::SHADOW_BUFFER_VARIANCE,
                FilterPass::SHADOW_SAMPLE_VARIANCE,
                FilterPass::SHADOW_SAMPLE_VARIANCE_VARIANCE,
            ],
            tuning.shadow_second,
        )?;

        let ([shadow, shadow_variance], [a, b]) = buffer.split_frame(
            frame,
            [FilterPass::SHADOW, FilterPass::SHADOW.variance()],
            [FilterPass::SHADOW_HALF_A, FilterPass::SHADOW_HALF_B],
        )?;
        let combine_halves = self.kernels.combine_halves.get();
        let grid = self.grid;
        self.for_each_pixel(|x, y| {
            let out = HalvesOut {
                mean: Some(&mut *shadow),
                variance: Some(&mut *shadow_variance),
            };
            combine_halves(x, y, out, a, b, grid, 0);
        });
        Ok(())
    }

    fn read_feature(
        &self,
        buffer: &mut FilterBuffer,
        view: &TileNeighborhood<'_>,
        request: FeatureRequest,
        mean: FilterPass,
        variance: FilterPass,
    ) -> EmberResult<()> {
        let ([mean, variance], []) = buffer.split_frame(request.frame, [mean, variance], [])?;
        let get_feature = self.kernels.get_feature.get();
        let grid = self.grid;
        self.for_each_pixel(|x, y| {
            get_feature(view, request, x, y, &mut *mean, &mut *variance, grid);
        });
        Ok(())
    }
}

/// Fill a filter buffer covering `rect` with prefiltered features, shadow and unfiltered color.
pub(crate) fn fill_filter_buffer(
    kernels: &FilterKernels,
    tuning: &PrefilterTuning,
    cross_denoise: bool,
    sample: u32,
    rect: PixelRect,
    view: &TileNeighborhood<'_>,
    frames: usize,
) -> EmberResult<FilterBuffer> {
    let mut buffer = FilterBuffer::new(rect, frames, cross_denoise)?;
    let stride = buffer.width();
    let mut prefilter = Prefilter {
        kernels,
        grid: LocalGrid { rect, stride },
        size: (rect.width(), rect.height(), stride),
        scratch: NlmScratch::new(buffer.frame_len())?,
    };

    for frame in 0..frames {
        prefilter.shadow(&mut buffer, view, frame, tuning)?;

        for (mean_offset, variance_offset, to) in FEATURES {
            let request = FeatureRequest {
                sample,
                mean_offset,
                variance_offset,
                frame,
            };
            // The feature guides itself; its variance goes straight to the destination.
            prefilter.read_feature(
                &mut buffer,
                view,
                request,
                FilterPass::FEATURE_SCRATCH,
                to.variance(),
            )?;
            prefilter.nlm(
                &mut buffer,
                frame,
                to,
                [FilterPass::FEATURE_SCRATCH, FilterPass::FEATURE_SCRATCH, to.variance()],
                tuning.features,
            )?;
        }

        let channels = if cross_denoise { 6 } else { 3 };
        for (mean_offset, variance_offset, to) in COLORS.into_iter().take(channels) {
            let request = FeatureRequest {
                sample,
                mean_offset,
                variance_offset,
                frame,
            };
            prefilter.read_feature(&mut buffer, view, request, to, to.variance())?;
        }
    }
    Ok(buffer)
}

#[cfg(test)]
#[path = "../../tests/unit/denoise/prefilter.rs"]
mod tests;
