use std::ops::{Add, AddAssign, Mul, Sub};

/// Three-channel value used for colors in the regression accumulators.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Float3 {
    /// First channel.
    pub x: f32,
    /// Second channel.
    pub y: f32,
    /// Third channel.
    pub z: f32,
}

impl Float3 {
    /// All channels zero.
    pub const ZERO: Float3 = Float3::splat(0.0);

    /// Create a value from its channels.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Same value in every channel.
    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v, z: v }
    }

    /// Mean of the three channels.
    pub fn average(self) -> f32 {
        (self.x + self.y + self.z) * (1.0 / 3.0)
    }

    /// Return `true` when no channel is NaN or infinite.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Float3 {
    type Output = Float3;

    fn add(self, rhs: Float3) -> Float3 {
        Float3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Float3 {
    fn add_assign(&mut self, rhs: Float3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Float3 {
    type Output = Float3;

    fn sub(self, rhs: Float3) -> Float3 {
        Float3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Float3 {
    type Output = Float3;

    fn mul(self, rhs: f32) -> Float3 {
        Float3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Add `weight * rowᵀ·row` to the lower triangle of the `n×n` matrix stored with row `stride`.
#[inline(always)]
pub(crate) fn add_gramian_lower(
    matrix: &mut [f32],
    n: usize,
    stride: usize,
    row: &[f32],
    weight: f32,
) {
    for i in 0..n {
        let wi = weight * row[i];
        let dst = &mut matrix[i * stride..i * stride + i + 1];
        for (j, d) in dst.iter_mut().enumerate() {
            *d += wi * row[j];
        }
    }
}

/// Add `weight * row[i] * value` to each of the first `n` entries of `vector`.
#[inline(always)]
pub(crate) fn add_weighted_rows(vector: &mut [Float3], n: usize, row: &[f32], value: Float3) {
    for (v, &r) in vector[..n].iter_mut().zip(row) {
        *v += value * r;
    }
}

/// Solve `(A + λI)·β = b` for a symmetric positive (semi-)definite system whose lower triangle
/// is stored in `lower` with row `stride`, and three right-hand sides in `rhs`.
///
/// Returns `None` when a Cholesky pivot is not strictly positive or the solution is not finite.
/// Only the first `n <= N` unknowns are used.
pub(crate) fn solve_normal_equations<const N: usize>(
    lower: &[f32],
    rhs: &[Float3],
    n: usize,
    stride: usize,
    regularization: f32,
) -> Option<[Float3; N]> {
    debug_assert!(n <= N);
    let mut l = [[0.0f64; N]; N];
    for i in 0..n {
        for j in 0..=i {
            l[i][j] = f64::from(lower[i * stride + j]);
        }
        l[i][i] += f64::from(regularization);
    }

    // In-place Cholesky: A = L·Lᵀ.
    for j in 0..n {
        let mut d = l[j][j];
        for k in 0..j {
            d -= l[j][k] * l[j][k];
        }
        if !(d > 1e-12) {
            return None;
        }
        let d = d.sqrt();
        l[j][j] = d;
        for i in j + 1..n {
            let mut s = l[i][j];
            for k in 0..j {
                s -= l[i][k] * l[j][k];
            }
            l[i][j] = s / d;
        }
    }

    let mut y = [[0.0f64; 3]; N];
    for i in 0..n {
        let b = rhs[i];
        let mut acc = [f64::from(b.x), f64::from(b.y), f64::from(b.z)];
        for k in 0..i {
            for c in 0..3 {
                acc[c] -= l[i][k] * y[k][c];
            }
        }
        for c in 0..3 {
            y[i][c] = acc[c] / l[i][i];
        }
    }
    for i in (0..n).rev() {
        let mut acc = y[i];
        for k in i + 1..n {
            for c in 0..3 {
                acc[c] -= l[k][i] * y[k][c];
            }
        }
        for c in 0..3 {
            y[i][c] = acc[c] / l[i][i];
        }
    }

    let mut out = [Float3::ZERO; N];
    for i in 0..n {
        let v = Float3::new(y[i][0] as f32, y[i][1] as f32, y[i][2] as f32);
        if !v.is_finite() {
            return None;
        }
        out[i] = v;
    }
    Some(out)
}

const JACOBI_MAX_SWEEPS: usize = 12;

/// Eigendecomposition of a symmetric `N×N` matrix by cyclic Jacobi rotations.
///
/// Returns eigenvalues in descending order and the matching unit eigenvectors as rows.
pub(crate) fn symmetric_eigen<const N: usize>(m: &[[f64; N]; N]) -> ([f64; N], [[f64; N]; N]) {
    let mut a = *m;
    let mut v = [[0.0f64; N]; N];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _ in 0..JACOBI_MAX_SWEEPS {
        let mut off = 0.0f64;
        let mut diag = 0.0f64;
        for i in 0..N {
            diag += a[i][i] * a[i][i];
            for j in i + 1..N {
                off += a[i][j] * a[i][j];
            }
        }
        if off <= 1e-24 * diag.max(1e-300) {
            break;
        }

        for p in 0..N {
            for q in p + 1..N {
                let apq = a[p][q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..N {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for k in 0..N {
                    let (vpk, vqk) = (v[p][k], v[q][k]);
                    v[p][k] = c * vpk - s * vqk;
                    v[q][k] = s * vpk + c * vqk;
                }
            }
        }
    }

    let mut order = [0usize; N];
    for (i, o) in order.iter_mut().enumerate() {
        *o = i;
    }
    order.sort_by(|&i, &j| a[j][j].total_cmp(&a[i][i]));

    let mut values = [0.0f64; N];
    let mut vectors = [[0.0f64; N]; N];
    for (dst, &src) in order.iter().enumerate() {
        values[dst] = a[src][src];
        vectors[dst] = v[src];
    }
    (values, vectors)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
