use crate::buffers::filter_buffer::{FilterBufferView, FilterPass};
use crate::foundation::math::symmetric_eigen;
use crate::kernel::filter::LocalGrid;

/// Features per pixel: position x/y, normal xyz, depth, shadow, albedo rgb.
pub const DENOISE_FEATURES: usize = 10;

/// Row stride of the per-pixel normal-equation accumulators (constant term + features).
pub const XTWX_STRIDE: usize = DENOISE_FEATURES + 1;

/// Per-output-pixel regression basis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterStorage {
    /// Row-major `rank × DENOISE_FEATURES` projection with the feature scaling baked in.
    pub transform: [f32; DENOISE_FEATURES * DENOISE_FEATURES],
    /// Retained dimensions.
    pub rank: usize,
    /// The pixel's own feature vector.
    pub features: [f32; DENOISE_FEATURES],
}

impl Default for FilterStorage {
    fn default() -> Self {
        Self {
            transform: [0.0; DENOISE_FEATURES * DENOISE_FEATURES],
            rank: 0,
            features: [0.0; DENOISE_FEATURES],
        }
    }
}

/// Window and energy threshold of [`construct_transform`].
#[derive(Clone, Copy, Debug)]
pub struct TransformParams {
    /// Half size of the square window.
    pub half_window: i32,
    /// Fraction of the feature energy that may be discarded, in `[0, 1]`.
    pub filter_strength: f32,
}

/// Feature vector of local pixel `index`, positioned at image coordinates `(x, y)`.
#[inline(always)]
pub fn pixel_features(
    buffer: &FilterBufferView<'_>,
    index: usize,
    x: f32,
    y: f32,
) -> [f32; DENOISE_FEATURES] {
    [
        x,
        y,
        buffer.value(FilterPass::NORMAL_X, index),
        buffer.value(FilterPass::NORMAL_Y, index),
        buffer.value(FilterPass::NORMAL_Z, index),
        buffer.value(FilterPass::DEPTH, index),
        buffer.value(FilterPass::SHADOW, index),
        buffer.value(FilterPass::ALBEDO_R, index),
        buffer.value(FilterPass::ALBEDO_G, index),
        buffer.value(FilterPass::ALBEDO_B, index),
    ]
}

/// Build the decorrelated, rank-reduced feature basis for image pixel `(x, y)`.
#[inline(always)]
pub fn construct_transform(
    buffer: FilterBufferView<'_>,
    grid: LocalGrid,
    x: i32,
    y: i32,
    params: TransformParams,
    storage: &mut FilterStorage,
) {
    const F: usize = DENOISE_FEATURES;
    let rect = grid.rect;
    let hw = params.half_window;
    let (low_x, high_x) = (rect.x0.max(x - hw), rect.x1.min(x + hw + 1));
    let (low_y, high_y) = (rect.y0.max(y - hw), rect.y1.min(y + hw + 1));
    let features_at = |px: i32, py: i32| {
        pixel_features(&buffer, grid.index(px, py), px as f32, py as f32)
    };

    let mut mean = [0.0f64; F];
    let mut count = 0.0f64;
    for py in low_y..high_y {
        for px in low_x..high_x {
            for (m, v) in mean.iter_mut().zip(features_at(px, py)) {
                *m += f64::from(v);
            }
            count += 1.0;
        }
    }
    for m in &mut mean {
        *m /= count.max(1.0);
    }

    let mut scale = [0.0f64; F];
    for py in low_y..high_y {
        for px in low_x..high_x {
            for ((s, m), v) in scale.iter_mut().zip(&mean).zip(features_at(px, py)) {
                *s = s.max((f64::from(v) - m).abs());
            }
        }
    }
    for s in &mut scale {
        *s = 1.0 / s.max(0.01);
    }

    let mut gram = [[0.0f64; F]; F];
    for py in low_y..high_y {
        for px in low_x..high_x {
            let f = features_at(px, py);
            let mut scaled = [0.0f64; F];
            for i in 0..F {
                scaled[i] = (f64::from(f[i]) - mean[i]) * scale[i];
            }
            for i in 0..F {
                for j in 0..F {
                    gram[i][j] += scaled[i] * scaled[j];
                }
            }
        }
    }

    let (values, vectors) = symmetric_eigen(&gram);
    let total: f64 = values.iter().map(|v| v.max(0.0)).sum();
    let threshold = f64::from(1.0 - params.filter_strength.clamp(0.0, 1.0)) * total;
    let empty = 1e-6 * total;

    storage.rank = 0;
    let mut retained = 0.0f64;
    for (i, (&value, vector)) in values.iter().zip(&vectors).enumerate() {
        if !(value > empty) || (i >= 2 && retained >= threshold) {
            break;
        }
        retained += value;
        let row = &mut storage.transform[storage.rank * F..(storage.rank + 1) * F];
        for ((t, v), s) in row.iter_mut().zip(vector).zip(&scale) {
            *t = (v * s) as f32;
        }
        storage.rank += 1;
    }
    storage.features = features_at(x, y);
}
