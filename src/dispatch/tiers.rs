//! Filter kernels compiled once per instruction-set tier.
//!
//! Every tier module holds a `#[target_feature]` copy of each kernel body plus a safe entry point.
//! Entry points are only bound by [`FilterKernels::with_capabilities`] when the tier is supported
//! by the running CPU.
#![allow(unsafe_code)]

use crate::dispatch::cpu::{CpuCapabilities, CpuTier};
use crate::dispatch::table::{KernelFunction, TierCandidates};
use crate::kernel::filter::{
    self as body, CombineHalvesFn, ConstructTransformFn, DivideShadowFn, FinalizeFn, GetFeatureFn,
    NlmBlurFn, NlmCalcDifferenceFn, NlmCalcWeightFn, NlmConstructGramianFn, NlmNormalizeFn,
    NlmUpdateOutputFn,
};

#[allow(unused_macros)]
macro_rules! tier_entry_points {
    ($features:literal; $(fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;)*) => {
        $(
            pub(crate) mod $name {
                #[allow(unused_imports)]
                use super::*;

                #[target_feature(enable = $features)]
                fn specialized($($arg: $ty),*) $(-> $ret)? {
                    crate::kernel::filter::$name($($arg),*)
                }

                pub(crate) fn entry($($arg: $ty),*) $(-> $ret)? {
                    // SAFETY: entry points are bound only after the tier's features were detected.
                    unsafe { specialized($($arg),*) }
                }
            }
        )*
    };
}

#[allow(unused_macros)]
macro_rules! define_tier {
    ($tier:ident, $features:literal) => {
        pub(crate) mod $tier {
            use crate::buffers::filter_buffer::FilterBufferView;
            use crate::buffers::neighborhood::TileNeighborhood;
            use crate::foundation::math::Float3;
            use crate::kernel::filter::{
                FeatureRequest, FilterStorage, GramianTarget, HalvesOut, LocalGrid, NlmWindow,
                ShadowPasses, TransformParams,
            };

            tier_entry_points! { $features;
                fn divide_shadow(
                    view: &TileNeighborhood<'_>,
                    frame: usize,
                    x: i32,
                    y: i32,
                    out: &mut ShadowPasses<'_>,
                    grid: LocalGrid,
                );
                fn get_feature(
                    view: &TileNeighborhood<'_>,
                    request: FeatureRequest,
                    x: i32,
                    y: i32,
                    mean: &mut [f32],
                    variance: &mut [f32],
                    grid: LocalGrid,
                );
                fn combine_halves(
                    x: i32,
                    y: i32,
                    out: HalvesOut<'_>,
                    a: &[f32],
                    b: &[f32],
                    grid: LocalGrid,
                    radius: i32,
                );
                fn construct_transform(
                    buffer: FilterBufferView<'_>,
                    grid: LocalGrid,
                    x: i32,
                    y: i32,
                    params: TransformParams,
                    storage: &mut FilterStorage,
                );
                fn nlm_calc_difference(
                    window: NlmWindow,
                    weight: &[f32],
                    variance: &[f32],
                    difference: &mut [f32],
                    channel_offset: usize,
                    a: f32,
                    k_2: f32,
                );
                fn nlm_blur(window: NlmWindow, src: &[f32], out: &mut [f32]);
                fn nlm_calc_weight(window: NlmWindow, src: &[f32], out: &mut [f32]);
                fn nlm_update_output(
                    window: NlmWindow,
                    difference: &[f32],
                    image: &[f32],
                    out: &mut [f32],
                    accum: &mut [f32],
                );
                fn nlm_normalize(out: &mut [f32], accum: &[f32], image: &[f32], window: NlmWindow);
                fn nlm_construct_gramian(
                    window: NlmWindow,
                    difference: &[f32],
                    buffer: FilterBufferView<'_>,
                    target: &GramianTarget<'_>,
                    xtwx: &mut [f32],
                    xtwy: &mut [Float3],
                );
                fn finalize(
                    storage: &FilterStorage,
                    xtwx: &[f32],
                    xtwy: &[Float3],
                    regularization: f32,
                ) -> Option<Float3>;
            }
        }
    };
}

#[cfg(all(target_arch = "x86_64", feature = "kernel-sse2"))]
define_tier!(sse2, "sse2");
#[cfg(all(target_arch = "x86_64", feature = "kernel-sse3"))]
define_tier!(sse3, "sse2,sse3");
#[cfg(all(target_arch = "x86_64", feature = "kernel-sse41"))]
define_tier!(sse41, "sse2,sse3,ssse3,sse4.1");
#[cfg(all(target_arch = "x86_64", feature = "kernel-avx"))]
define_tier!(avx, "sse2,sse3,ssse3,sse4.1,avx");
#[cfg(all(target_arch = "x86_64", feature = "kernel-avx2"))]
define_tier!(avx2, "sse2,sse3,ssse3,sse4.1,avx,avx2,fma");

macro_rules! candidates {
    ($name:ident: $fn_ty:ty) => {{
        #[allow(unused_mut)]
        let mut candidates = TierCandidates::<$fn_ty>::baseline(body::$name);
        #[cfg(all(target_arch = "x86_64", feature = "kernel-sse2"))]
        {
            candidates = candidates.with(CpuTier::Sse2, sse2::$name::entry);
        }
        #[cfg(all(target_arch = "x86_64", feature = "kernel-sse3"))]
        {
            candidates = candidates.with(CpuTier::Sse3, sse3::$name::entry);
        }
        #[cfg(all(target_arch = "x86_64", feature = "kernel-sse41"))]
        {
            candidates = candidates.with(CpuTier::Sse41, sse41::$name::entry);
        }
        #[cfg(all(target_arch = "x86_64", feature = "kernel-avx"))]
        {
            candidates = candidates.with(CpuTier::Avx, avx::$name::entry);
        }
        #[cfg(all(target_arch = "x86_64", feature = "kernel-avx2"))]
        {
            candidates = candidates.with(CpuTier::Avx2, avx2::$name::entry);
        }
        candidates
    }};
}

/// The denoising filter family, each kernel bound to its best available tier.
#[derive(Clone, Copy, Debug)]
#[allow(missing_docs)]
pub struct FilterKernels {
    pub divide_shadow: KernelFunction<DivideShadowFn>,
    pub get_feature: KernelFunction<GetFeatureFn>,
    pub combine_halves: KernelFunction<CombineHalvesFn>,
    pub construct_transform: KernelFunction<ConstructTransformFn>,
    pub nlm_calc_difference: KernelFunction<NlmCalcDifferenceFn>,
    pub nlm_blur: KernelFunction<NlmBlurFn>,
    pub nlm_calc_weight: KernelFunction<NlmCalcWeightFn>,
    pub nlm_update_output: KernelFunction<NlmUpdateOutputFn>,
    pub nlm_normalize: KernelFunction<NlmNormalizeFn>,
    pub nlm_construct_gramian: KernelFunction<NlmConstructGramianFn>,
    pub finalize: KernelFunction<FinalizeFn>,
}

impl FilterKernels {
    /// Bind every kernel against the detected CPU.
    pub fn new() -> Self {
        Self::with_capabilities(CpuCapabilities::detect())
    }

    /// Bind every kernel against `capabilities`.
    pub fn with_capabilities(capabilities: CpuCapabilities) -> Self {
        Self {
            divide_shadow: KernelFunction::with_capabilities(
                candidates!(divide_shadow: DivideShadowFn),
                capabilities,
            ),
            get_feature: KernelFunction::with_capabilities(
                candidates!(get_feature: GetFeatureFn),
                capabilities,
            ),
            combine_halves: KernelFunction::with_capabilities(
                candidates!(combine_halves: CombineHalvesFn),
                capabilities,
            ),
            construct_transform: KernelFunction::with_capabilities(
                candidates!(construct_transform: ConstructTransformFn),
                capabilities,
            ),
            nlm_calc_difference: KernelFunction::with_capabilities(
                candidates!(nlm_calc_difference: NlmCalcDifferenceFn),
                capabilities,
            ),
            nlm_blur: KernelFunction::with_capabilities(
                candidates!(nlm_blur: NlmBlurFn),
                capabilities,
            ),
            nlm_calc_weight: KernelFunction::with_capabilities(
                candidates!(nlm_calc_weight: NlmCalcWeightFn),
                capabilities,
            ),
            nlm_update_output: KernelFunction::with_capabilities(
                candidates!(nlm_update_output: NlmUpdateOutputFn),
                capabilities,
            ),
            nlm_normalize: KernelFunction::with_capabilities(
                candidates!(nlm_normalize: NlmNormalizeFn),
                capabilities,
            ),
            nlm_construct_gramian: KernelFunction::with_capabilities(
                candidates!(nlm_construct_gramian: NlmConstructGramianFn),
                capabilities,
            ),
            finalize: KernelFunction::with_capabilities(
                candidates!(finalize: FinalizeFn),
                capabilities,
            ),
        }
    }

    /// Tier shared by the family.
    pub fn tier(&self) -> CpuTier {
        self.nlm_calc_difference.tier()
    }
}

impl Default for FilterKernels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/dispatch/tiers.rs"]
mod tests;
