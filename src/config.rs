//! Device configuration loaded from JSON with environment overrides.

use std::path::Path;

use crate::denoise::params::DenoiseParams;
use crate::dispatch::cpu::CpuTier;
use crate::foundation::env::{env_var_positive_usize, env_var_string, env_var_truthy};
use crate::foundation::error::{EmberError, EmberResult};

/// Worker thread count override.
pub const ENV_THREADS: &str = "EMBER_THREADS";
/// Highest kernel tier override (`baseline`, `sse2`, `sse3`, `sse41`, `avx`, `avx2`).
pub const ENV_MAX_KERNEL_TIER: &str = "EMBER_MAX_KERNEL_TIER";
/// When truthy, bind the portable kernels only.
pub const ENV_DISABLE_OPTIMIZED_KERNELS: &str = "EMBER_DISABLE_OPTIMIZED_KERNELS";

/// Settings of a [`crate::CpuDevice`].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Worker threads, one per logical core when unset.
    pub threads: Option<usize>,
    /// Highest kernel tier to bind; the detected tier when unset. Can only lower it.
    pub max_kernel_tier: Option<CpuTier>,
    /// Denoiser settings.
    pub denoise: DenoiseParams,
}

impl DeviceConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> EmberResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EmberError::config(format!("invalid device config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> EmberResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EmberError::config(format!("failed to read device config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Apply `EMBER_THREADS`, `EMBER_MAX_KERNEL_TIER` and `EMBER_DISABLE_OPTIMIZED_KERNELS`.
    pub fn with_env_overrides(mut self) -> EmberResult<Self> {
        if let Some(threads) = env_var_positive_usize(ENV_THREADS) {
            self.threads = Some(threads);
        }
        if let Some(raw) = env_var_string(ENV_MAX_KERNEL_TIER) {
            let tier = CpuTier::parse(&raw).ok_or_else(|| {
                EmberError::config(format!("{ENV_MAX_KERNEL_TIER}: unknown kernel tier '{raw}'"))
            })?;
            self.max_kernel_tier = Some(tier);
        }
        if env_var_truthy(ENV_DISABLE_OPTIMIZED_KERNELS) {
            self.max_kernel_tier = Some(CpuTier::Baseline);
        }
        Ok(self)
    }

    /// Check value ranges.
    pub fn validate(&self) -> EmberResult<()> {
        if self.threads == Some(0) {
            return Err(EmberError::config("device 'threads' must be >= 1 when set"));
        }
        self.denoise
            .validate()
            .map_err(|e| EmberError::config(format!("denoise: {e}")))
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
