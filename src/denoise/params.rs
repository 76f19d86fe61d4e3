use crate::denoise::nlm::NlmParams;
use crate::foundation::error::{EmberError, EmberResult};

/// Feature driving the patch weights of the regression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionGuide {
    /// Prefiltered shadow feature (passes 8/9).
    #[default]
    Shadow,
    /// The three prefiltered color passes.
    Color,
}

/// NLM settings of the prefilter steps.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PrefilterTuning {
    /// Smoothing of the shadow buffer variance.
    pub buffer_variance: NlmParams,
    /// First filtering of the shadow halves.
    pub shadow_first: NlmParams,
    /// Second filtering of the shadow halves.
    pub shadow_second: NlmParams,
    /// Smoothing of normal, albedo and depth.
    pub features: NlmParams,
    /// Neighborhood radius of the residual-variance quantile.
    pub combine_radius: i32,
}

impl Default for PrefilterTuning {
    fn default() -> Self {
        Self {
            buffer_variance: NlmParams::new(6, 3, 4.0, 1.0),
            shadow_first: NlmParams::new(5, 3, 1.0, 0.25),
            shadow_second: NlmParams::new(4, 2, 1.0, 0.5),
            features: NlmParams::new(2, 2, 1.0, 0.25),
            combine_radius: 2,
        }
    }
}

/// Denoiser settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DenoiseParams {
    /// Half size of the regression window; pixels reach `half_window` into neighbor tiles.
    pub half_window: i32,
    /// Fraction of the feature energy the rank reduction may discard, in `[0, 1]`.
    pub filter_strength: f32,
    /// Noise floor `k2` of the regression's patch weights.
    pub weighting_adjust: f32,
    /// Patch radius of the regression's patch weights.
    pub patch_radius: i32,
    /// Ridge term added to the normal equations' diagonal.
    pub regularization: f32,
    /// Neighbors weighted below this are left out of the regression.
    pub min_weight: f32,
    /// Feature driving the regression's patch weights.
    pub guide: RegressionGuide,
    /// Prefilter NLM settings.
    pub prefilter: PrefilterTuning,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self {
            half_window: 8,
            filter_strength: 0.5,
            weighting_adjust: 1.0,
            patch_radius: 4,
            regularization: 1e-4,
            min_weight: 1e-3,
            guide: RegressionGuide::Shadow,
            prefilter: PrefilterTuning::default(),
        }
    }
}

impl DenoiseParams {
    /// Reject out-of-range settings.
    pub fn validate(&self) -> EmberResult<()> {
        if self.half_window < 1 {
            return Err(EmberError::validation("denoise half_window must be >= 1"));
        }
        if self.patch_radius < 0 {
            return Err(EmberError::validation("denoise patch_radius must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.filter_strength) {
            return Err(EmberError::validation(
                "denoise filter_strength must be in [0, 1]",
            ));
        }
        for (name, value) in [
            ("weighting_adjust", self.weighting_adjust),
            ("regularization", self.regularization),
            ("min_weight", self.min_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EmberError::validation(format!(
                    "denoise {name} must be finite and >= 0"
                )));
            }
        }
        let tuning = &self.prefilter;
        tuning.buffer_variance.validate("prefilter.buffer_variance")?;
        tuning.shadow_first.validate("prefilter.shadow_first")?;
        tuning.shadow_second.validate("prefilter.shadow_second")?;
        tuning.features.validate("prefilter.features")?;
        if tuning.combine_radius < 0 {
            return Err(EmberError::validation(
                "prefilter.combine_radius must be >= 0",
            ));
        }
        Ok(())
    }
}
