//! Denoising filter kernels.
//!
//! Each kernel is a plain function of its arguments that writes only into the outputs it is
//! handed. The bodies are `#[inline(always)]` so the per-tier wrappers in
//! [`crate::dispatch::tiers`] compile them once per instruction set.

mod features;
mod nlm;
mod reconstruction;
mod transform;

pub use features::{
    FeatureRequest, HalvesOut, ShadowPasses, combine_halves, divide_shadow, get_feature,
};
pub use nlm::{nlm_blur, nlm_calc_difference, nlm_calc_weight, nlm_normalize, nlm_update_output};
pub use reconstruction::{GramianTarget, finalize, nlm_construct_gramian};
pub use transform::{
    DENOISE_FEATURES, FilterStorage, TransformParams, XTWX_STRIDE, construct_transform,
    pixel_features,
};

use crate::buffers::filter_buffer::FilterBufferView;
use crate::buffers::neighborhood::TileNeighborhood;
use crate::foundation::core::PixelRect;
use crate::foundation::math::Float3;

/// Image-space rectangle of a filter buffer together with its padded row stride.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalGrid {
    /// Image-space rectangle mapped to local pixel `(0, 0)`.
    pub rect: PixelRect,
    /// Padded row stride.
    pub stride: usize,
}

impl LocalGrid {
    /// Local index of image pixel `(x, y)`.
    #[inline(always)]
    pub fn index(self, x: i32, y: i32) -> usize {
        (y - self.rect.y0) as usize * self.stride + (x - self.rect.x0) as usize
    }
}

/// One neighborhood offset of an NLM sweep, in local coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NlmWindow {
    /// Horizontal offset of the compared neighbor.
    pub dx: i32,
    /// Vertical offset of the compared neighbor.
    pub dy: i32,
    /// Pixels whose shifted neighbor stays inside the buffer.
    pub rect: PixelRect,
    /// Padded row stride.
    pub stride: usize,
    /// Patch radius `f` of the box blurs.
    pub patch_radius: i32,
}

impl NlmWindow {
    /// Window for offset `(dx, dy)` over a `width × height` local area.
    pub fn for_offset(
        dx: i32,
        dy: i32,
        width: i32,
        height: i32,
        stride: usize,
        patch_radius: i32,
    ) -> Self {
        Self {
            dx,
            dy,
            rect: PixelRect::new(
                (-dx).max(0),
                (-dy).max(0),
                width - dx.max(0),
                height - dy.max(0),
            ),
            stride,
            patch_radius,
        }
    }
}

#[allow(missing_docs)]
pub type DivideShadowFn =
    fn(&TileNeighborhood<'_>, usize, i32, i32, &mut ShadowPasses<'_>, LocalGrid);
#[allow(missing_docs)]
pub type GetFeatureFn =
    fn(&TileNeighborhood<'_>, FeatureRequest, i32, i32, &mut [f32], &mut [f32], LocalGrid);
#[allow(missing_docs)]
pub type CombineHalvesFn = fn(i32, i32, HalvesOut<'_>, &[f32], &[f32], LocalGrid, i32);
#[allow(missing_docs)]
pub type ConstructTransformFn =
    fn(FilterBufferView<'_>, LocalGrid, i32, i32, TransformParams, &mut FilterStorage);
#[allow(missing_docs)]
pub type NlmCalcDifferenceFn = fn(NlmWindow, &[f32], &[f32], &mut [f32], usize, f32, f32);
#[allow(missing_docs)]
pub type NlmBlurFn = fn(NlmWindow, &[f32], &mut [f32]);
#[allow(missing_docs)]
pub type NlmCalcWeightFn = fn(NlmWindow, &[f32], &mut [f32]);
#[allow(missing_docs)]
pub type NlmUpdateOutputFn = fn(NlmWindow, &[f32], &[f32], &mut [f32], &mut [f32]);
#[allow(missing_docs)]
pub type NlmNormalizeFn = fn(&mut [f32], &[f32], &[f32], NlmWindow);
#[allow(missing_docs)]
pub type NlmConstructGramianFn =
    fn(NlmWindow, &[f32], FilterBufferView<'_>, &GramianTarget<'_>, &mut [f32], &mut [Float3]);
#[allow(missing_docs)]
pub type FinalizeFn = fn(&FilterStorage, &[f32], &[Float3], f32) -> Option<Float3>;

#[cfg(test)]
#[path = "../../../tests/unit/kernel/filter.rs"]
mod tests;
