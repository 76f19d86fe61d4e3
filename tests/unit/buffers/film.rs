use super::*;

#[test]
fn standard_layouts_have_the_documented_sizes() {
    assert_eq!(DenoisingLayout::size(false), 26);
    assert_eq!(DenoisingLayout::size(true), 32);
    assert_eq!(FilmParams::standard(false).pass_stride, 30);
    assert_eq!(FilmParams::standard(true).pass_stride, 36);
    let extra = FilmParams::standard(false).with_no_denoising();
    assert_eq!(extra.pass_no_denoising, Some(30));
    assert_eq!(extra.pass_stride, 33);
    assert!(extra.validate().is_ok());
}

#[test]
fn overlapping_passes_are_rejected() {
    let mut film = FilmParams::standard(false);
    film.pass_denoising = 2;
    assert!(film.validate().is_err());

    let mut film = FilmParams::standard(false);
    film.pass_stride = 20;
    assert!(film.validate().is_err());

    let mut film = FilmParams::standard(false).with_no_denoising();
    film.pass_no_denoising = Some(10);
    assert!(film.validate().is_err());
}

#[test]
fn samples_alternate_between_shadow_halves() {
    let film = FilmParams::standard(true);
    let mut passes = vec![0.0f32; film.pass_stride];
    let s = DenoisingSample {
        color: [1.0, 2.0, 3.0],
        color_second: [0.5; 3],
        normal: [0.0, 0.0, 1.0],
        albedo: [0.5; 3],
        depth: 2.0,
        visibility: 0.5,
    };
    for sample in 0..3 {
        film.accumulate_sample(&mut passes, sample, &s);
    }

    assert_eq!(&passes[..4], &[3.0, 6.0, 9.0, 3.0]);
    let block = &passes[film.pass_denoising..];
    assert_eq!(block[DenoisingLayout::NORMAL + 2], 3.0);
    assert_eq!(block[DenoisingLayout::DEPTH_SQUARED], 12.0);
    assert_eq!(block[DenoisingLayout::COLOR_SQUARED + 1], 12.0);
    assert_eq!(block[DenoisingLayout::COLOR_SECOND], 1.5);
    assert_eq!(block[DenoisingLayout::SHADOW_A], 2.0);
    assert_eq!(block[DenoisingLayout::SHADOW_B], 1.0);
    assert_eq!(block[DenoisingLayout::SHADOW_B + 1], 0.5);
    assert_eq!(block[DenoisingLayout::SHADOW_B + 2], 0.25);
}
