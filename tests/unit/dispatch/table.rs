use super::*;

fn tier_id(tier: CpuTier) -> fn() -> CpuTier {
    match tier {
        CpuTier::Baseline => || CpuTier::Baseline,
        CpuTier::Sse2 => || CpuTier::Sse2,
        CpuTier::Sse3 => || CpuTier::Sse3,
        CpuTier::Sse41 => || CpuTier::Sse41,
        CpuTier::Avx => || CpuTier::Avx,
        CpuTier::Avx2 => || CpuTier::Avx2,
    }
}

fn all_candidates() -> TierCandidates<fn() -> CpuTier> {
    CpuTier::DESCENDING
        .into_iter()
        .fold(TierCandidates::baseline(tier_id(CpuTier::Baseline)), |c, tier| {
            c.with(tier, tier_id(tier))
        })
}

#[test]
fn binds_highest_supported_and_compiled_tier() {
    for max in CpuTier::DESCENDING {
        let bound =
            KernelFunction::with_capabilities(all_candidates(), CpuCapabilities::simulated(max));
        assert_eq!(bound.tier(), max);
        assert_eq!((bound.get())(), max);
    }
}

#[test]
fn skips_tiers_that_were_not_compiled() {
    let candidates = TierCandidates::baseline(tier_id(CpuTier::Baseline))
        .with(CpuTier::Sse3, tier_id(CpuTier::Sse3));
    let bound =
        KernelFunction::with_capabilities(candidates, CpuCapabilities::simulated(CpuTier::Avx2));
    assert_eq!(bound.tier(), CpuTier::Sse3);
    assert_eq!((bound.get())(), CpuTier::Sse3);

    let bound =
        KernelFunction::with_capabilities(candidates, CpuCapabilities::simulated(CpuTier::Sse2));
    assert_eq!(bound.tier(), CpuTier::Baseline);
}

#[test]
fn binding_is_deterministic() {
    let caps = CpuCapabilities::simulated(CpuTier::Sse41);
    let first = KernelFunction::with_capabilities(all_candidates(), caps);
    for _ in 0..8 {
        let again = KernelFunction::with_capabilities(all_candidates(), caps);
        assert_eq!(again.tier(), first.tier());
    }
}

#[test]
fn tier_notice_is_emitted_once_per_process() {
    for _ in 0..5 {
        let _ = KernelFunction::new(all_candidates());
        let _ = KernelFunction::with_capabilities(
            all_candidates(),
            CpuCapabilities::simulated(CpuTier::Sse2),
        );
    }
    assert_eq!(tier_notice_count(), 1);
}

#[test]
fn restriction_never_widens_detected_set() {
    let detected = CpuCapabilities::detect();
    for max in CpuTier::DESCENDING {
        let restricted = detected.restricted_to(max);
        assert!(restricted.highest() <= max);
        assert!(restricted.highest() <= detected.highest());
        for tier in CpuTier::DESCENDING {
            if restricted.supports(tier) {
                assert!(detected.supports(tier));
            }
        }
    }
    assert_eq!(detected.restricted_to(CpuTier::Baseline).highest(), CpuTier::Baseline);
}

#[test]
fn tier_names_round_trip_through_parse() {
    for tier in CpuTier::DESCENDING {
        assert_eq!(CpuTier::parse(tier.name()), Some(tier));
    }
    assert_eq!(CpuTier::parse(" AVX2 "), Some(CpuTier::Avx2));
    assert_eq!(CpuTier::parse("neon"), None);
    assert_eq!(CpuTier::Sse41.to_string(), "SSE4.1");
}
