use super::*;
use crate::buffers::film::FilmParams;
use crate::buffers::neighborhood::NeighborSlot;
use crate::buffers::render_buffer::{BufferParams, RenderBuffer};

const SAMPLES: u32 = 8;

fn buffer_with(film: FilmParams, shadow_a: [f32; 3], shadow_b: [f32; 3]) -> RenderBuffer {
    let mut buffer = RenderBuffer::new(BufferParams::new(6, 6, film.clone())).unwrap();
    let n = SAMPLES as f32;
    for i in 0..36 {
        let block = &mut buffer.pixel_mut(i, 0).unwrap()[film.pass_denoising..];
        block[DenoisingLayout::NORMAL + 2] = n;
        block[DenoisingLayout::NORMAL_SQUARED + 2] = n;
        block[DenoisingLayout::DEPTH] = 2.0 * n;
        block[DenoisingLayout::DEPTH_SQUARED] = 4.0 * n;
        block[DenoisingLayout::ALBEDO] = 0.5 * n;
        block[DenoisingLayout::ALBEDO_SQUARED] = 0.25 * n;
        block[DenoisingLayout::COLOR + 1] = 0.75 * n;
        block[DenoisingLayout::COLOR_SQUARED + 1] = 0.5625 * n;
        block[DenoisingLayout::SHADOW_A..DenoisingLayout::SHADOW_A + 3].copy_from_slice(&shadow_a);
        block[DenoisingLayout::SHADOW_B..DenoisingLayout::SHADOW_B + 3].copy_from_slice(&shadow_b);
        if film.cross_denoise {
            block[DenoisingLayout::COLOR_SECOND] = 0.125 * n;
        }
    }
    buffer
}

fn prefilter(buffer: &RenderBuffer, rect: PixelRect) -> FilterBuffer {
    let film = buffer.params().film.clone();
    let view = TileNeighborhood::single(
        NeighborSlot {
            buffer,
            offset: 0,
            stride: 6,
        },
        PixelRect::new(0, 0, 6, 6),
        film.pass_denoising,
    );
    fill_filter_buffer(
        &FilterKernels::new(),
        &PrefilterTuning::default(),
        film.cross_denoise,
        SAMPLES,
        rect,
        &view,
        1,
    )
    .unwrap()
}

fn assert_pass(buffer: &FilterBuffer, pass: FilterPass, want: f32) {
    let rect = buffer.rect();
    let data = buffer.pass(pass, 0).unwrap();
    for y in 0..rect.height() as usize {
        for x in 0..rect.width() as usize {
            let got = data[y * buffer.width() + x];
            assert!((got - want).abs() < 1e-5, "pass {}: {got} vs {want}", pass.index());
        }
    }
}

#[test]
fn noise_free_features_are_preserved() {
    let half = [4.0, 3.0, 2.25];
    let buffer = buffer_with(FilmParams::standard(false), half, half);
    let filtered = prefilter(&buffer, PixelRect::new(0, 0, 6, 6));
    assert_eq!(filtered.num_passes(), 22);
    assert_pass(&filtered, FilterPass::NORMAL_X, 0.0);
    assert_pass(&filtered, FilterPass::NORMAL_Z, 1.0);
    assert_pass(&filtered, FilterPass::NORMAL_Z.variance(), 0.0);
    assert_pass(&filtered, FilterPass::DEPTH, 2.0);
    assert_pass(&filtered, FilterPass::ALBEDO_R, 0.5);
    assert_pass(&filtered, FilterPass::SHADOW, 0.75);
    assert_pass(&filtered, FilterPass::SHADOW.variance(), 0.0);
    assert_pass(&filtered, FilterPass::COLOR_G, 0.75);
    assert_pass(&filtered, FilterPass::COLOR_G.variance(), 0.0);
}

#[test]
fn disagreeing_halves_produce_shadow_variance() {
    // Half A sees full visibility, half B none.
    let buffer = buffer_with(FilmParams::standard(false), [4.0, 4.0, 4.0], [4.0, 0.0, 0.0]);
    let filtered = prefilter(&buffer, PixelRect::new(0, 0, 6, 6));
    assert_pass(&filtered, FilterPass::SHADOW, 0.5);
    assert_pass(&filtered, FilterPass::SHADOW.variance(), 0.25);
}

#[test]
fn cross_mode_copies_the_second_estimator() {
    let half = [4.0, 2.0, 1.0];
    let buffer = buffer_with(FilmParams::standard(true), half, half);
    let filtered = prefilter(&buffer, PixelRect::new(1, 1, 6, 5));
    assert_eq!(filtered.num_passes(), 28);
    assert_eq!(filtered.width(), 8);
    assert_pass(&filtered, FilterPass::COLOR_SECOND_R, 0.125);
    assert_pass(&filtered, FilterPass::COLOR_R, 0.0);
}

#[test]
fn pixels_outside_the_neighborhood_read_as_zero() {
    let half = [4.0, 3.0, 2.25];
    let buffer = buffer_with(FilmParams::standard(false), half, half);
    let filtered = prefilter(&buffer, PixelRect::new(4, 0, 8, 2));
    let depth = filtered.pass(FilterPass::DEPTH, 0).unwrap();
    // Local columns 0-1 are image columns 4-5 (inside); 2-3 are outside.
    assert!((depth[0] - 2.0).abs() < 0.5);
    assert!(depth[3] < depth[0]);
}
