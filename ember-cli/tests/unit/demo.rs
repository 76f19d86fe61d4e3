use super::*;

use ember::{DenoiseParams, FilmParams};

#[test]
fn half_output_rounds_to_nearest_binary16() {
    let globals = KernelGlobals::new(FilmParams::standard(false), DenoiseParams::default());
    let mut out = [0u16; 4];
    // 1 + 0.75 ulp rounds up to 0x3c01; truncation would give 0x3c00.
    let passes = [2.0 * 1.000_732_421_875, 1.0, 131_072.0, 0.0];
    convert_to_half(&globals, &mut out, &passes, 0.5);
    assert_eq!(out, [0x3c01, 0x3800, 0x7c00, 0x3c00]);
}
