//! Synthetic scene and kernels used by `ember render`.
//!
//! A checkerboard floor lit by an area light, with a disc casting a soft shadow. Every sample
//! draws a random light point, so the shadow edge and the radiance are noisy until many samples
//! are accumulated.

use half::f16;

use ember::{
    DenoisingSample, ExternalKernels, KernelGlobals, ShaderEval, ThreadContext, TierCandidates,
};

/// Image size the demo kernels map pixels against.
#[derive(Clone, Copy, Debug)]
pub struct DemoScene {
    pub width: i32,
    pub height: i32,
}

/// Kernels of the demo scene. They have a single portable implementation.
pub fn kernels() -> ExternalKernels {
    ExternalKernels {
        path_trace: TierCandidates::baseline(path_trace),
        convert_to_byte: TierCandidates::baseline(convert_to_byte),
        convert_to_half_float: TierCandidates::baseline(convert_to_half),
        shader: TierCandidates::baseline(background_shader),
    }
}

fn next_random(state: &mut u32) -> f32 {
    if *state == 0 {
        *state = 0x9e37_79b9;
    }
    *state ^= *state << 13;
    *state ^= *state >> 17;
    *state ^= *state << 5;
    (*state >> 8) as f32 / (1u32 << 24) as f32
}

fn albedo(u: f32, v: f32) -> [f32; 3] {
    let checker = ((u * 8.0).floor() + (v * 6.0).floor()) as i32 % 2 == 0;
    if checker {
        [0.85, 0.8, 0.7]
    } else {
        [0.25, 0.35, 0.6]
    }
}

/// Fraction of the light hidden by the occluder, for one light sample.
fn visibility(u: f32, v: f32, light: (f32, f32)) -> f32 {
    let (cx, cy) = (0.5 + 0.15 * (light.0 - 0.5), 0.5 + 0.15 * (light.1 - 0.5));
    let (dx, dy) = (u - cx, v - cy);
    if dx * dx + dy * dy < 0.18 * 0.18 { 0.0 } else { 1.0 }
}

fn path_trace(
    ctx: &mut ThreadContext<'_>,
    passes: &mut [f32],
    rng: &mut u32,
    sample: u32,
    x: i32,
    y: i32,
) {
    let globals = ctx.globals();
    let Some(scene) = globals.scene::<DemoScene>() else {
        return;
    };
    let u = (x as f32 + next_random(rng)) / scene.width.max(1) as f32;
    let v = (y as f32 + next_random(rng)) / scene.height.max(1) as f32;
    let light = (next_random(rng), next_random(rng));
    let visible = visibility(u, v, light);
    let albedo = albedo(u, v);

    let energy = 2.0 * next_random(rng);
    let radiance = (0.15 + 0.85 * visible) * energy;
    let second = (0.15 + 0.85 * visibility(u, v, (next_random(rng), next_random(rng))))
        * 2.0
        * next_random(rng);

    globals.film.accumulate_sample(
        passes,
        sample,
        &DenoisingSample {
            color: albedo.map(|a| a * radiance),
            color_second: albedo.map(|a| a * second),
            normal: [0.0, 0.0, 1.0],
            albedo,
            depth: 1.0 + v,
            visibility: visible,
        },
    );
}

fn encode_srgb(linear: f32) -> u8 {
    let c = linear.clamp(0.0, 1.0);
    let s = if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (s * 255.0 + 0.5) as u8
}

fn convert_to_byte(_: &KernelGlobals, out: &mut [u8; 4], passes: &[f32], scale: f32) {
    for c in 0..3 {
        out[c] = encode_srgb(passes[c] * scale);
    }
    out[3] = 255;
}

fn convert_to_half(_: &KernelGlobals, out: &mut [u16; 4], passes: &[f32], scale: f32) {
    for c in 0..3 {
        out[c] = f16::from_f32(passes[c] * scale).to_bits();
    }
    out[3] = f16::ONE.to_bits();
}

/// Lit floor color at input `[x, y, _, _]`, without the occluder.
fn background_shader(
    ctx: &mut ThreadContext<'_>,
    input: &[u32; 4],
    out: &mut [f32; 4],
    _eval: ShaderEval,
    _index: usize,
    _sample: u32,
) {
    let Some(scene) = ctx.globals().scene::<DemoScene>() else {
        return;
    };
    let albedo = albedo(
        input[0] as f32 / scene.width.max(1) as f32,
        input[1] as f32 / scene.height.max(1) as f32,
    );
    for c in 0..3 {
        out[c] += albedo[c];
    }
    out[3] += 1.0;
}

#[cfg(test)]
#[path = "../tests/unit/demo.rs"]
mod tests;
