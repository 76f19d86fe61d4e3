use super::*;
use crate::buffers::film::{DenoisingLayout, FilmParams};

#[test]
fn standard_layouts_have_expected_pass_stride() {
    assert_eq!(FilmParams::standard(false).pass_stride, 4 + 26);
    assert_eq!(FilmParams::standard(true).pass_stride, 4 + 32);
    assert_eq!(DenoisingLayout::size(false), DenoisingLayout::COLOR_SECOND);
    let extra = FilmParams::standard(false).with_no_denoising();
    assert_eq!(extra.pass_no_denoising, Some(30));
    assert_eq!(extra.pass_stride, 33);
    extra.validate().unwrap();
}

#[test]
fn overlapping_layouts_are_rejected() {
    let mut film = FilmParams::standard(false);
    film.pass_denoising = 2;
    assert!(film.validate().is_err());

    let mut film = FilmParams::standard(true);
    film.pass_stride = 30;
    assert!(film.validate().is_err());

    let mut film = FilmParams::standard(false);
    film.pass_no_denoising = Some(10);
    film.pass_stride += 3;
    assert!(film.validate().is_err());
}

#[test]
fn pixels_are_addressed_by_index_and_frame() {
    let mut params = BufferParams::new(3, 2, FilmParams::standard(false));
    params.frames = 2;
    let mut buffer = RenderBuffer::new(params).unwrap();
    assert_eq!(buffer.num_pixels(), 6);
    assert_eq!(buffer.frame_stride(), 6 * 30);

    buffer.pixel_mut(5, 1).unwrap()[0] = 7.0;
    assert_eq!(buffer.data()[5 * 30 + 6 * 30], 7.0);
    assert!(buffer.pixel(6, 0).is_none());
    assert!(buffer.pixel(0, 2).is_none());

    let (passes, rng) = buffer.pixel_and_rng_mut(1).unwrap();
    passes[1] = 1.5;
    *rng = 9;
    assert_eq!(buffer.pixel(1, 0).unwrap()[1], 1.5);
    assert_eq!(buffer.rng_state()[1], 9);
}

#[test]
fn seeding_gives_distinct_states() {
    let mut buffer =
        RenderBuffer::new(BufferParams::new(4, 4, FilmParams::standard(false))).unwrap();
    buffer.seed_rng(1);
    let states = buffer.rng_state().to_vec();
    let mut unique = states.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), states.len());
}

#[test]
fn oversized_buffers_report_allocation_errors() {
    let params = BufferParams::new(usize::MAX / 2, 4, FilmParams::standard(false));
    let err = RenderBuffer::new(params).unwrap_err();
    assert!(matches!(err, EmberError::Allocation(_)));
    assert!(RenderBuffer::new(BufferParams::new(0, 4, FilmParams::standard(false))).is_err());
}

#[test]
fn pixel_index_rejects_negative_positions() {
    assert_eq!(pixel_index(0, 10, 3, 2), Some(23));
    assert_eq!(pixel_index(-5, 10, 4, 0), None);
    assert_eq!(pixel_index(-5, 10, 5, 0), Some(0));
}
