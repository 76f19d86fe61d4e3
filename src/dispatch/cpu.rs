use std::sync::OnceLock;

/// Instruction-set tiers a kernel can be compiled for, lowest to highest.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CpuTier {
    /// Portable code, always available.
    Baseline,
    /// SSE2.
    Sse2,
    /// SSE3.
    Sse3,
    /// SSE4.1.
    Sse41,
    /// AVX.
    Avx,
    /// AVX2 with FMA.
    Avx2,
}

impl CpuTier {
    /// Every tier from highest to lowest, the probing order.
    pub const DESCENDING: [CpuTier; 6] = [
        CpuTier::Avx2,
        CpuTier::Avx,
        CpuTier::Sse41,
        CpuTier::Sse3,
        CpuTier::Sse2,
        CpuTier::Baseline,
    ];

    /// Name used in the tier notice.
    pub fn name(self) -> &'static str {
        match self {
            CpuTier::Baseline => "default",
            CpuTier::Sse2 => "SSE2",
            CpuTier::Sse3 => "SSE3",
            CpuTier::Sse41 => "SSE4.1",
            CpuTier::Avx => "AVX",
            CpuTier::Avx2 => "AVX2",
        }
    }

    /// Parse a tier from its serde or display name, case-insensitively.
    pub fn parse(raw: &str) -> Option<CpuTier> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "baseline" | "default" | "none" => Some(CpuTier::Baseline),
            "sse2" => Some(CpuTier::Sse2),
            "sse3" => Some(CpuTier::Sse3),
            "sse41" | "sse4.1" => Some(CpuTier::Sse41),
            "avx" => Some(CpuTier::Avx),
            "avx2" => Some(CpuTier::Avx2),
            _ => None,
        }
    }
}

impl std::fmt::Display for CpuTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Instruction-set support of the running CPU.
///
/// Values are either the detected set or a restriction of it, so a tier reported as supported is
/// always executable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuCapabilities {
    sse2: bool,
    sse3: bool,
    sse41: bool,
    avx: bool,
    avx2: bool,
}

impl CpuCapabilities {
    /// Probe the CPU once per process.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<CpuCapabilities> = OnceLock::new();
        *DETECTED.get_or_init(probe)
    }

    /// Drop every tier above `max`.
    pub fn restricted_to(self, max: CpuTier) -> Self {
        Self {
            sse2: self.sse2 && max >= CpuTier::Sse2,
            sse3: self.sse3 && max >= CpuTier::Sse3,
            sse41: self.sse41 && max >= CpuTier::Sse41,
            avx: self.avx && max >= CpuTier::Avx,
            avx2: self.avx2 && max >= CpuTier::Avx2,
        }
    }

    /// Return `true` when code compiled for `tier` may run.
    pub fn supports(self, tier: CpuTier) -> bool {
        match tier {
            CpuTier::Baseline => true,
            CpuTier::Sse2 => self.sse2,
            CpuTier::Sse3 => self.sse3,
            CpuTier::Sse41 => self.sse41,
            CpuTier::Avx => self.avx,
            CpuTier::Avx2 => self.avx2,
        }
    }

    /// Highest supported tier.
    pub fn highest(self) -> CpuTier {
        CpuTier::DESCENDING
            .into_iter()
            .find(|tier| self.supports(*tier))
            .unwrap_or(CpuTier::Baseline)
    }

    /// Capability set claiming every tier up to `max`, for dispatch tests with fake kernels.
    #[cfg(test)]
    pub(crate) fn simulated(max: CpuTier) -> Self {
        Self {
            sse2: max >= CpuTier::Sse2,
            sse3: max >= CpuTier::Sse3,
            sse41: max >= CpuTier::Sse41,
            avx: max >= CpuTier::Avx,
            avx2: max >= CpuTier::Avx2,
        }
    }
}

#[cfg(target_arch = "x86_64")]
fn probe() -> CpuCapabilities {
    let sse2 = std::arch::is_x86_feature_detected!("sse2");
    let sse3 = sse2 && std::arch::is_x86_feature_detected!("sse3");
    let sse41 = sse3
        && std::arch::is_x86_feature_detected!("ssse3")
        && std::arch::is_x86_feature_detected!("sse4.1");
    let avx = sse41 && std::arch::is_x86_feature_detected!("avx");
    let avx2 = avx
        && std::arch::is_x86_feature_detected!("avx2")
        && std::arch::is_x86_feature_detected!("fma");
    CpuCapabilities {
        sse2,
        sse3,
        sse41,
        avx,
        avx2,
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn probe() -> CpuCapabilities {
    CpuCapabilities {
        sse2: false,
        sse3: false,
        sse41: false,
        avx: false,
        avx2: false,
    }
}
