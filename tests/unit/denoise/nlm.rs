use super::*;

fn run(
    image: &[f32],
    guide: &[f32],
    variance: &[f32],
    (w, h): (i32, i32),
    params: NlmParams,
) -> (Vec<f32>, Vec<f32>) {
    let stride = w as usize;
    let len = stride * h as usize;
    let kernels = FilterKernels::new();
    let mut out = vec![0.0; len];
    let mut scratch = NlmScratch::new(len).unwrap();
    non_local_means(
        &kernels,
        (w, h, stride),
        NlmInputs {
            image,
            guide,
            variance,
        },
        &mut out,
        &mut scratch,
        params,
    )
    .unwrap();
    (out, scratch.accumulated_weight().to_vec())
}

#[test]
fn constant_image_is_reproduced() {
    let image = vec![0.5f32; 64];
    let variance = vec![0.0f32; 64];
    let (out, accum) = run(&image, &image, &variance, (8, 8), NlmParams::new(2, 1, 1.0, 0.25));
    for (i, v) in out.iter().enumerate() {
        assert!((v - 0.5).abs() <= 1e-6, "pixel {i}: {v}");
    }
    assert!(accum.iter().all(|a| *a >= 0.999));
}

#[test]
fn influence_ends_at_search_plus_two_patch_radii() {
    let (w, h) = (10i32, 10i32);
    let base: Vec<f32> = (0..100).map(|i| ((i * 7) % 13) as f32 * 0.05).collect();
    let variance = vec![0.01f32; 100];
    let params = NlmParams::new(2, 1, 1.0, 0.25);
    let (before, _) = run(&base, &base, &variance, (w, h), params);
    let at = |x: usize, y: usize| y * w as usize + x;
    let center = at(4, 4);

    // (9, 4) is Chebyshev distance 5 from (4, 4), one past r + 2f.
    let mut outside = base.clone();
    outside[at(9, 4)] = 25.0;
    let (after, _) = run(&outside, &outside, &variance, (w, h), params);
    assert_eq!(before[center], after[center]);
    assert_ne!(before[at(9, 4)], after[at(9, 4)]);

    // (8, 4) is distance 4 and still reaches the center through the patch blurs.
    let mut inside = base.clone();
    inside[at(8, 4)] = 25.0;
    let (after, _) = run(&inside, &inside, &variance, (w, h), params);
    assert_ne!(before[center], after[center]);
}

#[test]
fn zero_variance_neighbors_blend_through_the_noise_floor() {
    let image = [0.0f32, 0.1, 0.0, 0.1];
    let variance = [0.0f32; 4];
    let (out, accum) = run(&image, &image, &variance, (4, 1), NlmParams::new(1, 0, 1.0, 0.25));

    // Δ² / (a·k2) = 0.01 / 0.25 for every horizontal neighbor.
    let w = (-0.04f32).exp();
    assert!((accum[0] - (1.0 + w)).abs() < 1e-5, "{accum:?}");
    assert!((accum[1] - (1.0 + 2.0 * w)).abs() < 1e-5, "{accum:?}");
    assert!((out[0] - w * 0.1 / (1.0 + w)).abs() < 1e-6, "{out:?}");
    assert!((out[1] - 0.1 / (1.0 + 2.0 * w)).abs() < 1e-6, "{out:?}");
    assert!((out[3] - 0.1 / (1.0 + w)).abs() < 1e-6, "{out:?}");
}

#[test]
fn negative_offsets_on_the_first_row_stay_in_bounds() {
    let (w, h) = (5i32, 3i32);
    let image: Vec<f32> = (0..15).map(|i| i as f32 * 0.1).collect();
    let variance = vec![0.05f32; 15];
    let (out, accum) = run(&image, &image, &variance, (w, h), NlmParams::new(2, 1, 1.0, 0.5));
    assert!(out.iter().all(|v| v.is_finite()));
    assert!(accum.iter().all(|a| *a >= 1.0 - 1e-5));
}

#[test]
fn unusable_weights_pass_the_input_through() {
    let kernels = FilterKernels::new();
    let image = [0.25f32, 0.5, 0.75, 1.0, 1.25];
    let accum = [0.0f32, f32::NAN, f32::INFINITY, 1e-12, 2.0];
    let mut out = [1.0f32, 1.0, 1.0, 1.0, 3.0];
    let window = NlmWindow::for_offset(0, 0, 5, 1, 5, 0);
    (kernels.nlm_normalize.get())(&mut out, &accum, &image, window);

    assert_eq!(out[..4], image[..4]);
    assert_eq!(out[4], 1.5);
    assert!(out.iter().all(|v| !v.is_nan()));
}

#[test]
fn outlier_neighbors_get_little_weight() {
    let (w, h) = (9i32, 9i32);
    let mut image = vec![1.0f32; 81];
    image[4 * 9 + 6] = 100.0;
    let variance = vec![1e-4f32; 81];
    let (out, _) = run(&image, &image, &variance, (w, h), NlmParams::new(3, 1, 1.0, 0.25));
    assert!((out[4 * 9 + 4] - 1.0).abs() < 1e-3);
}

#[test]
fn short_passes_are_rejected() {
    let kernels = FilterKernels::new();
    let data = vec![0.0f32; 8];
    let mut out = vec![0.0f32; 16];
    let mut scratch = NlmScratch::new(16).unwrap();
    let err = non_local_means(
        &kernels,
        (4, 4, 4),
        NlmInputs {
            image: &data,
            guide: &data,
            variance: &data,
        },
        &mut out,
        &mut scratch,
        NlmParams::new(1, 1, 1.0, 1.0),
    );
    assert!(err.is_err());
}

#[test]
fn invalid_params_are_reported() {
    assert!(NlmParams::new(-1, 1, 1.0, 1.0).validate("x").is_err());
    assert!(NlmParams::new(1, 1, f32::NAN, 1.0).validate("x").is_err());
    assert!(NlmParams::new(1, 1, 1.0, 0.0).validate("x").is_ok());
}
