use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::dispatch::cpu::{CpuCapabilities, CpuTier};

/// Implementations of one logical kernel, one per compiled-in tier.
///
/// A missing tier means the kernel was not compiled for it.
#[derive(Clone, Copy, Debug)]
pub struct TierCandidates<F> {
    /// Portable implementation, always present.
    pub baseline: F,
    /// SSE2 build.
    pub sse2: Option<F>,
    /// SSE3 build.
    pub sse3: Option<F>,
    /// SSE4.1 build.
    pub sse41: Option<F>,
    /// AVX build.
    pub avx: Option<F>,
    /// AVX2 build.
    pub avx2: Option<F>,
}

impl<F> TierCandidates<F> {
    /// Candidates with only the portable implementation.
    pub fn baseline(kernel: F) -> Self {
        Self {
            baseline: kernel,
            sse2: None,
            sse3: None,
            sse41: None,
            avx: None,
            avx2: None,
        }
    }

    /// Register the implementation compiled for `tier`.
    pub fn with(mut self, tier: CpuTier, kernel: F) -> Self {
        match tier {
            CpuTier::Baseline => self.baseline = kernel,
            CpuTier::Sse2 => self.sse2 = Some(kernel),
            CpuTier::Sse3 => self.sse3 = Some(kernel),
            CpuTier::Sse41 => self.sse41 = Some(kernel),
            CpuTier::Avx => self.avx = Some(kernel),
            CpuTier::Avx2 => self.avx2 = Some(kernel),
        }
        self
    }

    fn get(&self, tier: CpuTier) -> Option<&F> {
        match tier {
            CpuTier::Baseline => Some(&self.baseline),
            CpuTier::Sse2 => self.sse2.as_ref(),
            CpuTier::Sse3 => self.sse3.as_ref(),
            CpuTier::Sse41 => self.sse41.as_ref(),
            CpuTier::Avx => self.avx.as_ref(),
            CpuTier::Avx2 => self.avx2.as_ref(),
        }
    }
}

/// A kernel bound to the best tier available at construction. Immutable afterwards.
#[derive(Clone, Copy, Debug)]
pub struct KernelFunction<F> {
    kernel: F,
    tier: CpuTier,
}

impl<F: Copy> KernelFunction<F> {
    /// Bind against the detected CPU.
    pub fn new(candidates: TierCandidates<F>) -> Self {
        Self::with_capabilities(candidates, CpuCapabilities::detect())
    }

    /// Bind against `capabilities`, the detected set or a restriction of it.
    pub fn with_capabilities(candidates: TierCandidates<F>, capabilities: CpuCapabilities) -> Self {
        let (tier, kernel) = CpuTier::DESCENDING
            .into_iter()
            .filter(|tier| capabilities.supports(*tier))
            .find_map(|tier| candidates.get(tier).map(|kernel| (tier, *kernel)))
            .unwrap_or((CpuTier::Baseline, candidates.baseline));
        announce_tier(tier);
        Self { kernel, tier }
    }

    /// The bound implementation.
    #[inline(always)]
    pub fn get(&self) -> F {
        self.kernel
    }

    /// Tier of the bound implementation.
    pub fn tier(&self) -> CpuTier {
        self.tier
    }
}

static TIER_NOTICE: Once = Once::new();
static TIER_NOTICES: AtomicUsize = AtomicUsize::new(0);

fn announce_tier(tier: CpuTier) {
    TIER_NOTICE.call_once(|| {
        TIER_NOTICES.fetch_add(1, Ordering::Relaxed);
        tracing::info!(tier = %tier, "will be using {tier} kernels");
    });
}

/// Number of tier notices emitted by this process.
#[cfg(test)]
pub(crate) fn tier_notice_count() -> usize {
    TIER_NOTICES.load(Ordering::Relaxed)
}

#[cfg(test)]
#[path = "../../tests/unit/dispatch/table.rs"]
mod tests;
