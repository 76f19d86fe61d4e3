use super::*;
use crate::buffers::film::{DenoisingLayout, FilmParams};
use crate::buffers::filter_buffer::{FilterBuffer, FilterPass};
use crate::buffers::neighborhood::NeighborSlot;
use crate::buffers::render_buffer::{BufferParams, RenderBuffer};

fn single_pixel(values: &[(usize, f32)]) -> RenderBuffer {
    let film = FilmParams::standard(false);
    let mut buffer = RenderBuffer::new(BufferParams::new(1, 1, film.clone())).unwrap();
    let block = &mut buffer.pixel_mut(0, 0).unwrap()[film.pass_denoising..];
    for &(offset, value) in values {
        block[offset] = value;
    }
    buffer
}

fn view(buffer: &RenderBuffer) -> TileNeighborhood<'_> {
    TileNeighborhood::single(
        NeighborSlot {
            buffer,
            offset: 0,
            stride: 1,
        },
        PixelRect::new(0, 0, 1, 1),
        4,
    )
}

const GRID: LocalGrid = LocalGrid {
    rect: PixelRect::new(0, 0, 1, 1),
    stride: 4,
};

#[test]
fn get_feature_returns_mean_and_variance_of_mean() {
    // Samples 1, 2, 3, 6: mean 3, sample variance 14/3, variance of the mean 7/6.
    let buffer = single_pixel(&[
        (DenoisingLayout::DEPTH, 12.0),
        (DenoisingLayout::DEPTH_SQUARED, 50.0),
    ]);
    let (mut mean, mut variance) = ([0.0f32; 4], [0.0f32; 4]);
    let request = FeatureRequest {
        sample: 4,
        mean_offset: DenoisingLayout::DEPTH,
        variance_offset: DenoisingLayout::DEPTH_SQUARED,
        frame: 0,
    };
    get_feature(&view(&buffer), request, 0, 0, &mut mean, &mut variance, GRID);
    assert!((mean[0] - 3.0).abs() < 1e-6);
    assert!((variance[0] - 7.0 / 6.0).abs() < 1e-5);
}

#[test]
fn divide_shadow_splits_halves() {
    let a = DenoisingLayout::SHADOW_A;
    let b = DenoisingLayout::SHADOW_B;
    // Half A: visibilities 1, 0 (mean 0.5, sample variance 0.5); half B: 1, 1.
    let buffer = single_pixel(&[
        (a, 2.0),
        (a + 1, 1.0),
        (a + 2, 1.0),
        (b, 2.0),
        (b + 1, 2.0),
        (b + 2, 2.0),
    ]);
    let mut passes = [[0.0f32; 4]; 5];
    let [ua, ub, sv, svv, bv] = &mut passes;
    let mut out = ShadowPasses {
        unfiltered_a: ua,
        unfiltered_b: ub,
        sample_variance: sv,
        sample_variance_variance: svv,
        buffer_variance: bv,
    };
    divide_shadow(&view(&buffer), 0, 0, 0, &mut out, GRID);
    assert_eq!(passes[0][0], 0.5);
    assert_eq!(passes[1][0], 1.0);
    // Variance of the mean of half A is 0.25, of half B 0.
    assert!((passes[2][0] - 0.125).abs() < 1e-6);
    assert!((passes[3][0] - 0.25 * 0.0625).abs() < 1e-6);
    assert!((passes[4][0] - 0.125).abs() < 1e-6);
}

#[test]
fn missing_pixels_read_as_zero() {
    let buffer = single_pixel(&[(DenoisingLayout::DEPTH, 5.0)]);
    let grid = LocalGrid {
        rect: PixelRect::new(1, 0, 2, 1),
        stride: 4,
    };
    let (mut mean, mut variance) = ([9.0f32; 4], [9.0f32; 4]);
    let request = FeatureRequest {
        sample: 1,
        mean_offset: DenoisingLayout::DEPTH,
        variance_offset: DenoisingLayout::DEPTH_SQUARED,
        frame: 0,
    };
    get_feature(&view(&buffer), request, 1, 0, &mut mean, &mut variance, grid);
    assert_eq!((mean[0], variance[0]), (0.0, 0.0));
}

#[test]
fn combine_halves_uses_upper_quantile() {
    let grid = LocalGrid {
        rect: PixelRect::new(0, 0, 5, 5),
        stride: 8,
    };
    let a = [0.0f32; 40];
    let mut b = [0.0f32; 40];
    // One large disagreement among 25 neighbors stays below the 7/8 quantile.
    b[2 * 8 + 2] = 4.0;
    let mut variance = [0.0f32; 40];
    let mut mean = [0.0f32; 40];
    let out = HalvesOut {
        mean: Some(&mut mean),
        variance: Some(&mut variance),
    };
    combine_halves(2, 2, out, &a, &b, grid, 2);
    assert_eq!(mean[2 * 8 + 2], 2.0);
    assert_eq!(variance[2 * 8 + 2], 0.0);

    let out = HalvesOut {
        mean: None,
        variance: Some(&mut variance),
    };
    combine_halves(2, 2, out, &a, &b, grid, 0);
    assert_eq!(variance[2 * 8 + 2], 4.0);
}

#[test]
fn transform_keeps_position_axes_on_flat_features() {
    let rect = PixelRect::new(0, 0, 7, 7);
    let buffer = FilterBuffer::new(rect, 1, false).unwrap();
    let grid = LocalGrid {
        rect,
        stride: buffer.width(),
    };
    let mut storage = FilterStorage::default();
    let params = TransformParams {
        half_window: 3,
        filter_strength: 0.0,
    };
    construct_transform(buffer.view(), grid, 3, 3, params, &mut storage);
    assert_eq!(storage.rank, 2);
    assert_eq!(storage.features[0], 3.0);
    assert_eq!(storage.features[1], 3.0);
    // Only the position columns carry weight.
    for row in 0..2 {
        let t = &storage.transform[row * DENOISE_FEATURES..(row + 1) * DENOISE_FEATURES];
        assert!(t[2..].iter().all(|v| *v == 0.0));
        assert!(t[0].abs() + t[1].abs() > 0.0);
    }
}

#[test]
fn transform_rank_grows_with_informative_features() {
    let rect = PixelRect::new(0, 0, 9, 9);
    let mut buffer = FilterBuffer::new(rect, 1, false).unwrap();
    let width = buffer.width();
    {
        let ([depth, albedo], []) = buffer
            .split_frame(0, [FilterPass::DEPTH, FilterPass::ALBEDO_R], [])
            .unwrap();
        for y in 0..9 {
            for x in 0..9 {
                depth[y * width + x] = ((x * 3 + y * 7) % 5) as f32;
                albedo[y * width + x] = ((x * x + y) % 3) as f32 * 0.5;
            }
        }
    }
    let grid = LocalGrid { rect, stride: width };
    let mut full = FilterStorage::default();
    let mut reduced = FilterStorage::default();
    let strict = TransformParams {
        half_window: 4,
        filter_strength: 0.0,
    };
    let loose = TransformParams {
        half_window: 4,
        filter_strength: 0.9,
    };
    construct_transform(buffer.view(), grid, 4, 4, strict, &mut full);
    construct_transform(buffer.view(), grid, 4, 4, loose, &mut reduced);
    assert_eq!(full.rank, 4);
    assert!(reduced.rank >= 2 && reduced.rank < full.rank);
}

#[test]
fn finalize_solves_and_rejects_singular_systems() {
    let storage = FilterStorage::default();
    let mut xtwx = [0.0f32; XTWX_STRIDE * XTWX_STRIDE];
    let mut xtwy = [Float3::ZERO; XTWX_STRIDE];
    assert!(finalize(&storage, &xtwx, &xtwy, 0.0).is_none());

    xtwx[0] = 4.0;
    xtwy[0] = Float3::new(2.0, 1.0, 0.5);
    let color = finalize(&storage, &xtwx, &xtwy, 0.0).unwrap();
    assert_eq!(color, Float3::new(0.5, 0.25, 0.125));
}

#[test]
fn nlm_window_covers_valid_shifts_only() {
    let window = NlmWindow::for_offset(-2, 3, 10, 6, 12, 1);
    assert_eq!(window.rect, PixelRect::new(2, 0, 10, 3));
    assert!(NlmWindow::for_offset(0, 7, 10, 6, 12, 1).rect.is_empty());
}
