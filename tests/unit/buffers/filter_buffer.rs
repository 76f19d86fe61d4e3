use super::*;

#[test]
fn pass_counts_and_padding() {
    let standard = FilterBuffer::new(PixelRect::new(0, 0, 5, 3), 1, false).unwrap();
    assert_eq!(standard.num_passes(), 22);
    assert_eq!(standard.width(), 8);
    assert_eq!(standard.pass_stride(), 8 * 3);

    let cross = FilterBuffer::new(PixelRect::new(10, 10, 18, 12), 2, true).unwrap();
    assert_eq!(cross.num_passes(), 28);
    assert_eq!(cross.width(), 8);
    assert_eq!(cross.pass_stride(), 8 * 2 * 2);
    assert_eq!(cross.rect(), PixelRect::new(10, 10, 18, 12));
}

#[test]
fn named_passes_keep_numeric_layout() {
    assert_eq!(FilterPass::NORMAL_X.index(), 0);
    assert_eq!(FilterPass::DEPTH.variance().index(), 7);
    assert_eq!(FilterPass::SHADOW.index(), 8);
    assert_eq!(FilterPass::ALBEDO_B.variance().index(), 15);
    assert_eq!(FilterPass::COLOR_R.index(), 16);
    assert_eq!(FilterPass::COLOR_SECOND_B.variance().index(), 27);
    assert_eq!(FilterPass::SHADOW_HALF_B.index(), 5);
    assert_eq!(FilterPass::FEATURE_SCRATCH, FilterPass::COLOR_R);
}

#[test]
fn split_frame_hands_out_disjoint_passes() {
    let mut buffer = FilterBuffer::new(PixelRect::new(0, 0, 4, 2), 2, false).unwrap();
    {
        let ([a, b], [c]) = buffer
            .split_frame(1, [FilterPass::DEPTH, FilterPass::SHADOW], [FilterPass::COLOR_R])
            .unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(c.len(), 8);
        a.fill(1.0);
        b.fill(2.0);
    }
    assert_eq!(buffer.pass(FilterPass::DEPTH, 1).unwrap(), &[1.0; 8]);
    assert_eq!(buffer.pass(FilterPass::DEPTH, 0).unwrap(), &[0.0; 8]);
    assert_eq!(buffer.pass(FilterPass::SHADOW, 1).unwrap(), &[2.0; 8]);
}

#[test]
fn split_frame_rejects_aliasing_and_out_of_range() {
    let mut buffer = FilterBuffer::new(PixelRect::new(0, 0, 4, 4), 1, false).unwrap();
    assert!(buffer
        .split_frame(0, [FilterPass::DEPTH, FilterPass::DEPTH], [])
        .is_err());
    assert!(buffer
        .split_frame(0, [FilterPass::DEPTH], [FilterPass::DEPTH])
        .is_err());
    assert!(buffer
        .split_frame(0, [FilterPass::COLOR_SECOND_R], [])
        .is_err());
    assert!(buffer.split_frame::<1, 0>(1, [FilterPass::DEPTH], []).is_err());
}
