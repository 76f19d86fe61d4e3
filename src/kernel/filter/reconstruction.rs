use crate::buffers::filter_buffer::{FilterBufferView, FilterPass};
use crate::foundation::core::PixelRect;
use crate::foundation::math::{Float3, add_gramian_lower, add_weighted_rows, solve_normal_equations};
use crate::kernel::filter::NlmWindow;
use crate::kernel::filter::transform::{
    DENOISE_FEATURES, FilterStorage, XTWX_STRIDE, pixel_features,
};

/// Where [`nlm_construct_gramian`] scatters its contributions.
#[derive(Clone, Copy, Debug)]
pub struct GramianTarget<'a> {
    /// One basis per output pixel, row-major over `filter_rect`.
    pub storage: &'a [FilterStorage],
    /// Output pixels, in the filter buffer's local coordinates.
    pub filter_rect: PixelRect,
    /// First of the three color passes regressed against (r, g, b are two passes apart).
    pub color_pass: FilterPass,
    /// Neighbors whose patch weight is below this are skipped.
    pub min_weight: f32,
}

/// Add the contribution of offset `(dx, dy)` to every output pixel's normal equations.
///
/// `difference` holds the vertically blurred weight field; the horizontal blur happens here.
#[inline(always)]
pub fn nlm_construct_gramian(
    window: NlmWindow,
    difference: &[f32],
    buffer: FilterBufferView<'_>,
    target: &GramianTarget<'_>,
    xtwx: &mut [f32],
    xtwy: &mut [Float3],
) {
    const S: usize = XTWX_STRIDE;
    let rect = window.rect;
    let f = window.patch_radius;
    let fr = target.filter_rect;
    let filter_w = fr.width() as usize;
    let area = rect.intersect(fr);
    let color = target.color_pass.index();
    let shift = window.dy as isize * window.stride as isize + window.dx as isize;

    for y in area.y0..area.y1 {
        let row = y as usize * window.stride;
        let diff_row = &difference[row..row + window.stride];
        for x in area.x0..area.x1 {
            let low = rect.x0.max(x - f);
            let high = rect.x1.min(x + f + 1);
            let sum: f32 = diff_row[low as usize..high as usize].iter().sum();
            let weight = sum / (high - low) as f32;
            if !(weight >= target.min_weight) {
                continue;
            }

            let si = (y - fr.y0) as usize * filter_w + (x - fr.x0) as usize;
            let storage = &target.storage[si];
            let q = ((row + x as usize) as isize + shift) as usize;
            let fp = storage.features;
            let fq = pixel_features(
                &buffer,
                q,
                fp[0] + window.dx as f32,
                fp[1] + window.dy as f32,
            );

            let mut design = [0.0f32; S];
            design[0] = 1.0;
            for (k, d) in design[1..=storage.rank].iter_mut().enumerate() {
                let t = &storage.transform[k * DENOISE_FEATURES..(k + 1) * DENOISE_FEATURES];
                *d = t
                    .iter()
                    .zip(fq.iter().zip(&fp))
                    .map(|(t, (q, p))| t * (q - p))
                    .sum();
            }

            let c = Float3::new(
                buffer.raw(color, q),
                buffer.raw(color + 2, q),
                buffer.raw(color + 4, q),
            );
            let n = storage.rank + 1;
            add_gramian_lower(&mut xtwx[si * S * S..(si + 1) * S * S], n, S, &design, weight);
            add_weighted_rows(&mut xtwy[si * S..(si + 1) * S], n, &design, c * weight);
        }
    }
}

/// Solve one pixel's regularized normal equations; the constant coefficient is the color.
#[inline(always)]
pub fn finalize(
    storage: &FilterStorage,
    xtwx: &[f32],
    xtwy: &[Float3],
    regularization: f32,
) -> Option<Float3> {
    solve_normal_equations::<XTWX_STRIDE>(xtwx, xtwy, storage.rank + 1, XTWX_STRIDE, regularization)
        .map(|beta| beta[0])
}
