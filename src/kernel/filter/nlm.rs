//! Non-local-means kernels over local, row-major passes with a padded stride.
//!
//! All kernels operate on the pixels of `window.rect` only; for every pixel `p` in that rect the
//! shifted neighbor `p + (dx, dy)` lies inside the buffer.

use crate::kernel::filter::NlmWindow;

/// Lower bound of the difference denominator when the noise floor and both variances vanish.
const MIN_DENOMINATOR: f32 = 1e-8;

#[inline(always)]
fn shifted(index: usize, window: &NlmWindow) -> usize {
    (index as isize + window.dy as isize * window.stride as isize + window.dx as isize) as usize
}

/// Normalized squared difference `Δ² / (a·k2 + v_p + v_q)` between `p` and `p + (dx, dy)`.
///
/// With `channel_offset > 0` three channels spaced by `channel_offset` are averaged.
#[inline(always)]
pub fn nlm_calc_difference(
    window: NlmWindow,
    weight: &[f32],
    variance: &[f32],
    difference: &mut [f32],
    channel_offset: usize,
    a: f32,
    k_2: f32,
) {
    let rect = window.rect;
    let channels = if channel_offset > 0 { 3 } else { 1 };
    let width = (rect.x1 - rect.x0) as usize;
    let floor = a * k_2;
    for y in rect.y0..rect.y1 {
        let p0 = y as usize * window.stride + rect.x0 as usize;
        // The rect only holds pixels whose shifted neighbor is inside the buffer.
        let q0 = shifted(p0, &window);
        let out = &mut difference[p0..p0 + width];
        out.fill(0.0);
        for c in 0..channels {
            let o = c * channel_offset;
            let wp = &weight[o + p0..o + p0 + width];
            let wq = &weight[o + q0..o + q0 + width];
            let vp = &variance[o + p0..o + p0 + width];
            let vq = &variance[o + q0..o + q0 + width];
            for (d, ((&p, &q), (&pv, &qv))) in
                out.iter_mut().zip(wp.iter().zip(wq).zip(vp.iter().zip(vq)))
            {
                let cdiff = p - q;
                *d += cdiff * cdiff / (floor + pv + qv).max(MIN_DENOMINATOR);
            }
        }
        if channels > 1 {
            let inv = 1.0 / channels as f32;
            for d in out.iter_mut() {
                *d *= inv;
            }
        }
    }
}

/// Vertical box blur over `2f+1` rows, clipped to the rect.
#[inline(always)]
pub fn nlm_blur(window: NlmWindow, src: &[f32], out: &mut [f32]) {
    let rect = window.rect;
    let f = window.patch_radius;
    let (x0, x1) = (rect.x0 as usize, rect.x1 as usize);
    for y in rect.y0..rect.y1 {
        let low = rect.y0.max(y - f);
        let high = rect.y1.min(y + f + 1);
        let row = y as usize * window.stride;
        let dst = &mut out[row + x0..row + x1];
        dst.fill(0.0);
        for sy in low..high {
            let srow = sy as usize * window.stride;
            for (d, &s) in dst.iter_mut().zip(&src[srow + x0..srow + x1]) {
                *d += s;
            }
        }
        let norm = 1.0 / (high - low) as f32;
        for d in dst.iter_mut() {
            *d *= norm;
        }
    }
}

#[inline(always)]
fn horizontal_mean(row: &[f32], rect_x0: i32, rect_x1: i32, x: i32, f: i32) -> f32 {
    let low = rect_x0.max(x - f);
    let high = rect_x1.min(x + f + 1);
    let sum: f32 = row[low as usize..high as usize].iter().sum();
    sum / (high - low) as f32
}

/// Horizontal box blur over `2f+1` columns followed by `exp(−max(d, 0))`.
#[inline(always)]
pub fn nlm_calc_weight(window: NlmWindow, src: &[f32], out: &mut [f32]) {
    let rect = window.rect;
    for y in rect.y0..rect.y1 {
        let row = y as usize * window.stride;
        let src_row = &src[row..row + window.stride];
        for x in rect.x0..rect.x1 {
            let d = horizontal_mean(src_row, rect.x0, rect.x1, x, window.patch_radius);
            out[row + x as usize] = (-d.max(0.0)).exp();
        }
    }
}

/// Horizontal box blur of the weight field fused with the weighted accumulation of `image(q)`.
#[inline(always)]
pub fn nlm_update_output(
    window: NlmWindow,
    difference: &[f32],
    image: &[f32],
    out: &mut [f32],
    accum: &mut [f32],
) {
    let rect = window.rect;
    for y in rect.y0..rect.y1 {
        let row = y as usize * window.stride;
        let diff_row = &difference[row..row + window.stride];
        for x in rect.x0..rect.x1 {
            let weight = horizontal_mean(diff_row, rect.x0, rect.x1, x, window.patch_radius);
            let p = row + x as usize;
            accum[p] += weight;
            out[p] += weight * image[shifted(p, &window)];
        }
    }
}

/// Divide by the accumulated weight; pixels without a usable weight keep the unfiltered input.
#[inline(always)]
pub fn nlm_normalize(out: &mut [f32], accum: &[f32], image: &[f32], window: NlmWindow) {
    let rect = window.rect;
    for y in rect.y0..rect.y1 {
        let row = y as usize * window.stride;
        for x in rect.x0..rect.x1 {
            let p = row + x as usize;
            let weight = accum[p];
            out[p] = if weight.is_finite() && weight > 1e-8 {
                out[p] / weight
            } else {
                image[p]
            };
        }
    }
}
