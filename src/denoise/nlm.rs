use crate::dispatch::tiers::FilterKernels;
use crate::foundation::error::{EmberError, EmberResult, try_alloc_zeroed};
use crate::kernel::filter::NlmWindow;

/// Settings of one non-local-means sweep.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NlmParams {
    /// Search radius `r`: offsets span `[-r, r]²`.
    pub radius: i32,
    /// Patch radius `f` of the box blurs.
    pub patch_radius: i32,
    /// Strength `a`; `a·k2` is added to the difference denominator.
    pub strength: f32,
    /// Noise floor `k2`.
    pub noise_floor: f32,
}

impl NlmParams {
    /// Settings from `(r, f, a, k2)`.
    pub const fn new(radius: i32, patch_radius: i32, strength: f32, noise_floor: f32) -> Self {
        Self {
            radius,
            patch_radius,
            strength,
            noise_floor,
        }
    }

    pub(crate) fn validate(&self, what: &str) -> EmberResult<()> {
        if self.radius < 0 || self.patch_radius < 0 {
            return Err(EmberError::validation(format!(
                "{what}: radius and patch_radius must be >= 0"
            )));
        }
        if !self.strength.is_finite() || !self.noise_floor.is_finite() || self.noise_floor < 0.0 {
            return Err(EmberError::validation(format!(
                "{what}: strength must be finite and noise_floor finite and >= 0"
            )));
        }
        Ok(())
    }
}

/// Reusable temporaries of [`non_local_means`].
#[derive(Debug)]
pub struct NlmScratch {
    difference: Vec<f32>,
    blurred: Vec<f32>,
    accum: Vec<f32>,
}

impl NlmScratch {
    /// Temporaries for passes of `len` floats.
    pub fn new(len: usize) -> EmberResult<Self> {
        Ok(Self {
            difference: try_alloc_zeroed(len, "nlm difference")?,
            blurred: try_alloc_zeroed(len, "nlm blurred difference")?,
            accum: try_alloc_zeroed(len, "nlm weight accumulator")?,
        })
    }

    /// Pass length the scratch was sized for.
    pub fn len(&self) -> usize {
        self.accum.len()
    }

    /// Return `true` for zero-sized scratch.
    pub fn is_empty(&self) -> bool {
        self.accum.is_empty()
    }

    /// Weight accumulated per pixel by the last sweep.
    pub fn accumulated_weight(&self) -> &[f32] {
        &self.accum
    }
}

/// Inputs of one sweep, all laid out as `height` rows of `stride` floats.
#[derive(Clone, Copy, Debug)]
pub struct NlmInputs<'a> {
    /// Signal being reconstructed.
    pub image: &'a [f32],
    /// Signal whose patches decide the weights.
    pub guide: &'a [f32],
    /// Per-pixel variance of the guide.
    pub variance: &'a [f32],
}

/// Reconstruct `image` over a `width × height` area as the patch-similarity-weighted average of
/// its `(2r+1)²` neighborhood.
pub fn non_local_means(
    kernels: &FilterKernels,
    (width, height, stride): (i32, i32, usize),
    inputs: NlmInputs<'_>,
    out: &mut [f32],
    scratch: &mut NlmScratch,
    params: NlmParams,
) -> EmberResult<()> {
    let len = stride * height.max(0) as usize;
    if width < 0 || width as usize > stride {
        return Err(EmberError::render(format!(
            "nlm width {width} does not fit stride {stride}"
        )));
    }
    if [inputs.image.len(), inputs.guide.len(), inputs.variance.len(), out.len()]
        .into_iter()
        .any(|l| l < len)
        || scratch.len() < len
    {
        return Err(EmberError::render(format!(
            "nlm passes must hold at least {len} floats"
        )));
    }

    let out = &mut out[..len];
    let accum = &mut scratch.accum[..len];
    let difference = &mut scratch.difference[..len];
    let blurred = &mut scratch.blurred[..len];
    out.fill(0.0);
    accum.fill(0.0);

    let (r, f) = (params.radius, params.patch_radius);
    for dy in -r..=r {
        for dx in -r..=r {
            let window = NlmWindow::for_offset(dx, dy, width, height, stride, f);
            if window.rect.is_empty() {
                continue;
            }
            (kernels.nlm_calc_difference.get())(
                window,
                inputs.guide,
                inputs.variance,
                difference,
                0,
                params.strength,
                params.noise_floor,
            );
            (kernels.nlm_blur.get())(window, difference, blurred);
            (kernels.nlm_calc_weight.get())(window, blurred, difference);
            (kernels.nlm_blur.get())(window, difference, blurred);
            (kernels.nlm_update_output.get())(window, blurred, inputs.image, out, accum);
        }
    }

    let full = NlmWindow::for_offset(0, 0, width, height, stride, f);
    (kernels.nlm_normalize.get())(out, accum, inputs.image, full);
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/denoise/nlm.rs"]
mod tests;
