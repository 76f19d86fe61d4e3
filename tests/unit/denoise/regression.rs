use super::*;
use crate::foundation::core::PixelRect;

#[test]
fn pixels_iterate_row_major() {
    let order: Vec<_> = pixels(PixelRect::new(1, 2, 3, 4)).collect();
    assert_eq!(order, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
    assert_eq!(pixels(PixelRect::new(0, 0, 0, 5)).count(), 0);
}

#[test]
fn missing_color_pass_is_rejected() {
    let kernels = FilterKernels::new();
    let params = DenoiseParams::default();
    let buffer = FilterBuffer::new(PixelRect::new(0, 0, 4, 4), 1, false).unwrap();
    let area = PixelRect::new(0, 0, 4, 4);
    let err = reconstruct(
        &kernels,
        &params,
        &buffer,
        area,
        FilterPass::COLOR_SECOND_R,
        WeightGuide::Shadow,
    );
    assert!(err.is_err());
}

#[test]
fn constant_color_regresses_exactly_on_zeroed_features() {
    let kernels = FilterKernels::new();
    let params = DenoiseParams::default();
    let rect = PixelRect::new(3, 3, 9, 8);
    let mut buffer = FilterBuffer::new(rect, 1, false).unwrap();
    for (pass, value) in [
        (FilterPass::COLOR_R, 0.25),
        (FilterPass::COLOR_G, 0.5),
        (FilterPass::COLOR_B, 0.75),
    ] {
        let ([dst], []) = buffer.split_frame(0, [pass], []).unwrap();
        dst.fill(value);
    }

    let area = PixelRect::new(4, 4, 8, 7);
    let colors = reconstruct(
        &kernels,
        &params,
        &buffer,
        area,
        FilterPass::COLOR_R,
        WeightGuide::Shadow,
    )
    .unwrap();
    assert_eq!(colors.len(), area.area());
    for color in colors {
        let c = color.unwrap();
        assert!((c.x - 0.25).abs() < 1e-4);
        assert!((c.y - 0.5).abs() < 1e-4);
        assert!((c.z - 0.75).abs() < 1e-4);
    }
}
