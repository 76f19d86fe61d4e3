//! Patch-weighted local linear regression over the prefiltered features.

use crate::buffers::filter_buffer::{FilterBuffer, FilterPass};
use crate::denoise::params::DenoiseParams;
use crate::dispatch::tiers::FilterKernels;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{EmberError, EmberResult, checked_len, try_alloc_zeroed};
use crate::foundation::math::Float3;
use crate::kernel::filter::{
    FilterStorage, GramianTarget, LocalGrid, NlmWindow, TransformParams, XTWX_STRIDE,
};

/// Passes driving the regression's patch weights.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WeightGuide {
    /// Single-channel shadow feature.
    Shadow,
    /// Three color channels starting at the given pass.
    Color(FilterPass),
}

/// Image pixels of `rect` in row-major order.
pub(crate) fn pixels(rect: PixelRect) -> impl Iterator<Item = (i32, i32)> {
    (rect.y0..rect.y1).flat_map(move |y| (rect.x0..rect.x1).map(move |x| (x, y)))
}

/// Regress the color starting at `color_pass` for every pixel of `filter_area`.
///
/// Entries are `None` where the normal equations could not be solved.
pub(crate) fn reconstruct(
    kernels: &FilterKernels,
    params: &DenoiseParams,
    buffer: &FilterBuffer,
    filter_area: PixelRect,
    color_pass: FilterPass,
    guide: WeightGuide,
) -> EmberResult<Vec<Option<Float3>>> {
    const S: usize = XTWX_STRIDE;
    let rect = buffer.rect();
    if filter_area.is_empty() || !rect.contains_rect(filter_area) {
        return Err(EmberError::render(format!(
            "filter area {filter_area:?} is empty or outside the filter buffer {rect:?}"
        )));
    }
    if color_pass.index() + 5 >= buffer.num_passes() {
        return Err(EmberError::render(format!(
            "color pass {} is not present in the filter buffer",
            color_pass.index()
        )));
    }

    let view = buffer.view();
    let stride = buffer.width();
    let grid = LocalGrid { rect, stride };
    let n = filter_area.area();

    let mut storage: Vec<FilterStorage> = try_alloc_zeroed(n, "filter storage")?;
    let construct_transform = kernels.construct_transform.get();
    let transform = TransformParams {
        half_window: params.half_window,
        filter_strength: params.filter_strength,
    };
    for (slot, (x, y)) in storage.iter_mut().zip(pixels(filter_area)) {
        construct_transform(view, grid, x, y, transform, slot);
    }

    let mut xtwx: Vec<f32> = try_alloc_zeroed(checked_len(&[n, S, S], "xtwx")?, "xtwx")?;
    let mut xtwy: Vec<Float3> = try_alloc_zeroed(checked_len(&[n, S], "xtwy")?, "xtwy")?;
    let mut difference: Vec<f32> = try_alloc_zeroed(buffer.frame_len(), "regression difference")?;
    let mut blurred: Vec<f32> = try_alloc_zeroed(buffer.frame_len(), "regression blurred weights")?;

    let ps = buffer.pass_stride();
    let data = view.data();
    let (weight, variance, channel_offset) = match guide {
        WeightGuide::Shadow => (
            &data[FilterPass::SHADOW.index() * ps..],
            &data[FilterPass::SHADOW.variance().index() * ps..],
            0,
        ),
        WeightGuide::Color(pass) => (
            &data[pass.index() * ps..],
            &data[pass.variance().index() * ps..],
            2 * ps,
        ),
    };

    let local_filter = filter_area.relative_to(rect);
    let target = GramianTarget {
        storage: &storage,
        filter_rect: local_filter,
        color_pass,
        min_weight: params.min_weight,
    };
    let hw = params.half_window;
    let (width, height) = (rect.width(), rect.height());
    for dy in -hw..=hw {
        for dx in -hw..=hw {
            let window = NlmWindow::for_offset(dx, dy, width, height, stride, params.patch_radius);
            if window.rect.intersect(local_filter).is_empty() {
                continue;
            }
            (kernels.nlm_calc_difference.get())(
                window,
                weight,
                variance,
                &mut difference,
                channel_offset,
                1.0,
                params.weighting_adjust,
            );
            (kernels.nlm_blur.get())(window, &difference, &mut blurred);
            (kernels.nlm_calc_weight.get())(window, &blurred, &mut difference);
            (kernels.nlm_blur.get())(window, &difference, &mut blurred);
            (kernels.nlm_construct_gramian.get())(
                window,
                &blurred,
                view,
                &target,
                &mut xtwx,
                &mut xtwy,
            );
        }
    }

    let finalize = kernels.finalize.get();
    Ok(storage
        .iter()
        .zip(xtwx.chunks_exact(S * S).zip(xtwy.chunks_exact(S)))
        .map(|(slot, (lhs, rhs))| finalize(slot, lhs, rhs, params.regularization))
        .collect())
}

#[cfg(test)]
#[path = "../../tests/unit/denoise/regression.rs"]
mod tests;
