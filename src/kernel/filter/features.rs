//! Per-pixel kernels that turn render-buffer sums into prefilter inputs.

use smallvec::SmallVec;

use crate::buffers::film::DenoisingLayout;
use crate::buffers::neighborhood::TileNeighborhood;
use crate::kernel::filter::LocalGrid;

/// Outputs of [`divide_shadow`], one frame of each pass.
#[derive(Debug)]
pub struct ShadowPasses<'a> {
    /// Mean visibility of half A.
    pub unfiltered_a: &'a mut [f32],
    /// Mean visibility of half B.
    pub unfiltered_b: &'a mut [f32],
    /// Average of the two per-half variances of the mean.
    pub sample_variance: &'a mut [f32],
    /// Spread of the per-half variances.
    pub sample_variance_variance: &'a mut [f32],
    /// Variance estimated from the difference of the half means.
    pub buffer_variance: &'a mut [f32],
}

/// Which render-buffer sums [`get_feature`] reads.
#[derive(Clone, Copy, Debug)]
pub struct FeatureRequest {
    /// Samples accumulated so far.
    pub sample: u32,
    /// Offset of the feature sum inside the denoising block.
    pub mean_offset: usize,
    /// Offset of the feature sum of squares inside the denoising block.
    pub variance_offset: usize,
    /// Temporal frame.
    pub frame: usize,
}

/// Outputs of [`combine_halves`]; either may be skipped.
#[derive(Debug)]
pub struct HalvesOut<'a> {
    /// Average of both halves.
    pub mean: Option<&'a mut [f32]>,
    /// Residual variance.
    pub variance: Option<&'a mut [f32]>,
}

/// Mean and variance of the mean of one shadow half stored as (weight, sum, sum of squares).
#[inline(always)]
fn shadow_half(block: &[f32]) -> (f32, f32) {
    let n = block[0];
    if n <= 0.0 {
        return (0.0, 0.0);
    }
    let mean = block[1] / n;
    let sample_variance = ((block[2] - mean * block[1]) / (n - 1.0).max(1.0)).max(0.0);
    (mean, sample_variance / n.max(1.0))
}

/// Split the shadow feature of pixel `(x, y)` into its two half estimators and their variances.
#[inline(always)]
pub fn divide_shadow(
    view: &TileNeighborhood<'_>,
    frame: usize,
    x: i32,
    y: i32,
    out: &mut ShadowPasses<'_>,
    grid: LocalGrid,
) {
    let ((mean_a, var_a), (mean_b, var_b)) = match view.denoising(x, y, frame) {
        Some(block) => (
            shadow_half(&block[DenoisingLayout::SHADOW_A..]),
            shadow_half(&block[DenoisingLayout::SHADOW_B..]),
        ),
        None => ((0.0, 0.0), (0.0, 0.0)),
    };
    let idx = grid.index(x, y);
    out.unfiltered_a[idx] = mean_a;
    out.unfiltered_b[idx] = mean_b;

    let sample_variance = 0.5 * (var_a + var_b);
    let spread = var_a - var_b;
    out.sample_variance[idx] = sample_variance;
    out.sample_variance_variance[idx] = 0.25 * spread * spread;

    let diff = mean_a - mean_b;
    out.buffer_variance[idx] = 0.5 * diff * diff;
}

/// Mean of a feature and the variance of that mean at pixel `(x, y)`.
#[inline(always)]
pub fn get_feature(
    view: &TileNeighborhood<'_>,
    request: FeatureRequest,
    x: i32,
    y: i32,
    mean: &mut [f32],
    variance: &mut [f32],
    grid: LocalGrid,
) {
    let (sum, sum_sq) = view
        .denoising(x, y, request.frame)
        .map(|block| (block[request.mean_offset], block[request.variance_offset]))
        .unwrap_or((0.0, 0.0));
    let samples = (request.sample as f32).max(1.0);
    let m = sum / samples;
    let v = (sum_sq - m * sum) / (samples * (samples - 1.0).max(1.0));

    let idx = grid.index(x, y);
    mean[idx] = m;
    variance[idx] = v.max(0.0);
}

/// Recombine two filtered halves at `(x, y)`.
///
/// With `radius > 0` the variance is the 7/8 quantile of `¼(a−b)²` over the
/// `(2·radius+1)²` neighborhood; with `radius == 0` it is the pixel's own value.
#[inline(always)]
pub fn combine_halves(
    x: i32,
    y: i32,
    out: HalvesOut<'_>,
    a: &[f32],
    b: &[f32],
    grid: LocalGrid,
    radius: i32,
) {
    let idx = grid.index(x, y);
    if let Some(mean) = out.mean {
        mean[idx] = 0.5 * (a[idx] + b[idx]);
    }
    let Some(variance) = out.variance else {
        return;
    };

    if radius <= 0 {
        let d = a[idx] - b[idx];
        variance[idx] = 0.25 * d * d;
        return;
    }

    let window = grid.rect.intersect(crate::foundation::core::PixelRect::new(
        x - radius,
        y - radius,
        x + radius + 1,
        y + radius + 1,
    ));
    let mut values: SmallVec<[f32; 25]> = SmallVec::new();
    for py in window.y0..window.y1 {
        for px in window.x0..window.x1 {
            let i = grid.index(px, py);
            let d = a[i] - b[i];
            values.push(0.25 * d * d);
        }
    }
    values.sort_unstable_by(f32::total_cmp);
    let pick = (values.len() * 7 / 8).min(values.len().saturating_sub(1));
    variance[idx] = values.get(pick).copied().unwrap_or(0.0);
}
