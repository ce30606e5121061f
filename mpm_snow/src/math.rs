//! Dense 3x3 linear algebra kernels used by the constitutive model: polar
//! decomposition, SVD, the Frobenius double contraction, and the cofactor matrix.
//!
//! These are deliberately hand-rolled rather than pulled from a general-purpose
//! linear algebra crate: every particle, every tick, needs exactly one 3x3 SVD and
//! a handful of 3x3 products, and a Jacobi-style solver tuned to that size avoids
//! both an extra dependency and the overhead of a general `n x n` codepath.

use glam::{DMat3, DVec3};

/// Double (Frobenius) contraction: `sum_ij a_ij b_ij`.
pub fn double_contract(a: DMat3, b: DMat3) -> f64 {
    a.x_axis.dot(b.x_axis) + a.y_axis.dot(b.y_axis) + a.z_axis.dot(b.z_axis)
}

/// Cofactor matrix `cof(f) = det(f) * f^-T`, computed directly from 2x2 minors so
/// it stays well-defined even as `det(f) -> 0` (unlike `det(f) * f.inverse().transpose()`,
/// which divides by zero internally).
pub fn cofactor(f: DMat3) -> DMat3 {
    let m = f.to_cols_array_2d(); // m[col][row]
    let at = |r: usize, c: usize| m[c][r];
    let minor = |r0: usize, r1: usize, c0: usize, c1: usize| {
        at(r0, c0) * at(r1, c1) - at(r0, c1) * at(r1, c0)
    };
    // cof(f)_{ij} = (-1)^{i+j} * minor deleting row i, col j
    let c00 = minor(1, 2, 1, 2);
    let c01 = -minor(1, 2, 0, 2);
    let c02 = minor(1, 2, 0, 1);
    let c10 = -minor(0, 2, 1, 2);
    let c11 = minor(0, 2, 0, 2);
    let c12 = -minor(0, 2, 0, 1);
    let c20 = minor(0, 1, 1, 2);
    let c21 = -minor(0, 1, 0, 2);
    let c22 = minor(0, 1, 0, 1);
    DMat3::from_cols(
        DVec3::new(c00, c10, c20),
        DVec3::new(c01, c11, c21),
        DVec3::new(c02, c12, c22),
    )
}

/// Directional derivative of [`cofactor`] at `f` in direction `df`, obtained by
/// applying the product rule to each 2x2 minor rather than differentiating
/// `det(f) * f^-T` (which is singular at the same `det(f) -> 0` points `cofactor`
/// itself avoids).
pub fn cofactor_differential(f: DMat3, df: DMat3) -> DMat3 {
    let m = f.to_cols_array_2d();
    let dm = df.to_cols_array_2d();
    let at = |mat: &[[f64; 3]; 3], r: usize, c: usize| mat[c][r];
    let minor_d = |r0: usize, r1: usize, c0: usize, c1: usize| {
        at(&dm, r0, c0) * at(&m, r1, c1) + at(&m, r0, c0) * at(&dm, r1, c1)
            - at(&dm, r0, c1) * at(&m, r1, c0)
            - at(&m, r0, c1) * at(&dm, r1, c0)
    };
    let c00 = minor_d(1, 2, 1, 2);
    let c01 = -minor_d(1, 2, 0, 2);
    let c02 = minor_d(1, 2, 0, 1);
    let c10 = -minor_d(0, 2, 1, 2);
    let c11 = minor_d(0, 2, 0, 2);
    let c12 = -minor_d(0, 2, 0, 1);
    let c20 = minor_d(0, 1, 1, 2);
    let c21 = -minor_d(0, 1, 0, 2);
    let c22 = minor_d(0, 1, 0, 1);
    DMat3::from_cols(
        DVec3::new(c00, c10, c20),
        DVec3::new(c01, c11, c21),
        DVec3::new(c02, c12, c22),
    )
}

/// Polar decomposition `m = r * s`, `r` orthogonal, `s` symmetric
/// positive-semidefinite, via Higham's scaled Newton iteration on `r`.
///
/// Falls back to `(identity, m)` if `m` is (near-)singular, since a rotation
/// cannot be extracted from a degenerate deformation gradient; callers are
/// expected to have already rejected `det(f) <= 0` particles (see
/// [`crate::error::NumericalError`]).
pub fn polar_decompose(m: DMat3) -> (DMat3, DMat3) {
    let det = m.determinant();
    if det.abs() < 1e-12 {
        return (DMat3::IDENTITY, m);
    }

    let mut r = m;
    for _ in 0..16 {
        let r_inv_t = match invert(r) {
            Some(inv) => inv.transpose(),
            None => break,
        };
        let next = 0.5 * (r + r_inv_t);
        let delta = (next - r).to_cols_array().iter().map(|x| x.abs()).fold(0.0, f64::max);
        r = next;
        if delta < 1e-13 {
            break;
        }
    }

    // r may have drifted from exact orthogonality after a handful of Newton
    // steps; one more averaging step does not hurt and s = r^T m is then
    // symmetrized to cancel residual rounding error.
    let s_raw = r.transpose() * m;
    let s = 0.5 * (s_raw + s_raw.transpose());
    (r, s)
}

fn invert(m: DMat3) -> Option<DMat3> {
    let det = m.determinant();
    if det.abs() < 1e-15 {
        None
    } else {
        Some(m.inverse())
    }
}

/// Full singular value decomposition `m = u * diag(sigma) * v^T`.
///
/// Computed by polar-decomposing `m = r * s`, then diagonalizing the symmetric
/// `s = v * diag(sigma) * v^T` with a cyclic Jacobi eigensolver, giving `u = r *
/// v`. `sigma`'s components are not sorted; callers that need a canonical order
/// (descending magnitude, say) should sort and permute `u`/`v` together.
pub fn svd(m: DMat3) -> (DMat3, DVec3, DMat3) {
    let (r, s) = polar_decompose(m);
    let (v, sigma) = jacobi_eigen_symmetric(s);
    let u = r * v;
    (u, sigma, v)
}

/// Cyclic Jacobi eigenvalue algorithm for a symmetric 3x3 matrix: returns
/// `(eigenvectors, eigenvalues)` such that `a = eigenvectors * diag(eigenvalues)
/// * eigenvectors^T`.
fn jacobi_eigen_symmetric(a0: DMat3) -> (DMat3, DVec3) {
    let mut a = a0.to_cols_array_2d(); // a[col][row], symmetric so indexing order doesn't matter
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]; // v[col][row]

    for _ in 0..50 {
        let (p, q, max_val) = largest_off_diagonal(&a);
        if max_val < 1e-14 {
            break;
        }
        let app = a[p][p];
        let aqq = a[q][q];
        let apq = a[p][q];
        let theta = 0.5 * (aqq - app).atan2(2.0 * apq);
        let (c, s) = (theta.cos(), theta.sin());

        for k in 0..3 {
            let akp = a[p][k];
            let akq = a[q][k];
            a[p][k] = c * akp - s * akq;
            a[q][k] = s * akp + c * akq;
        }
        for k in 0..3 {
            let apk = a[k][p];
            let aqk = a[k][q];
            a[k][p] = c * apk - s * aqk;
            a[k][q] = s * apk + c * aqk;
        }
        for k in 0..3 {
            let vkp = v[p][k];
            let vkq = v[q][k];
            v[p][k] = c * vkp - s * vkq;
            v[q][k] = s * vkp + c * vkq;
        }
    }

    let eigenvalues = DVec3::new(a[0][0], a[1][1], a[2][2]);
    let eigenvectors = DMat3::from_cols(
        DVec3::new(v[0][0], v[0][1], v[0][2]),
        DVec3::new(v[1][0], v[1][1], v[1][2]),
        DVec3::new(v[2][0], v[2][1], v[2][2]),
    );
    (eigenvectors, eigenvalues)
}

fn largest_off_diagonal(a: &[[f64; 3]; 3]) -> (usize, usize, f64) {
    let candidates = [(0, 1), (0, 2), (1, 2)];
    let mut best = (0, 1, a[1][0].abs());
    for &(p, q) in &candidates[1..] {
        let val = a[q][p].abs();
        if val > best.2 {
            best = (p, q, val);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq_mat(a: DMat3, b: DMat3, tol: f64) -> bool {
        a.to_cols_array()
            .iter()
            .zip(b.to_cols_array().iter())
            .all(|(x, y)| (x - y).abs() < tol)
    }

    #[test]
    fn polar_decompose_round_trip() {
        let m = DMat3::from_cols(
            DVec3::new(1.2, 0.3, -0.1),
            DVec3::new(0.1, 0.9, 0.2),
            DVec3::new(-0.2, 0.05, 1.1),
        );
        let (r, s) = polar_decompose(m);
        assert!(approx_eq_mat(r * s, m, 1e-9));
        assert!(approx_eq_mat(r.transpose() * r, DMat3::IDENTITY, 1e-9));
        assert!(approx_eq_mat(s, s.transpose(), 1e-9));
    }

    #[test]
    fn svd_reconstructs_matrix() {
        let m = DMat3::from_cols(
            DVec3::new(1.0, 0.2, 0.0),
            DVec3::new(0.1, 0.8, -0.1),
            DVec3::new(0.0, 0.1, 1.3),
        );
        let (u, sigma, v) = svd(m);
        let reconstructed = u * DMat3::from_diagonal(sigma) * v.transpose();
        assert!(approx_eq_mat(reconstructed, m, 1e-8));
        assert!(approx_eq_mat(u.transpose() * u, DMat3::IDENTITY, 1e-8));
        assert!(approx_eq_mat(v.transpose() * v, DMat3::IDENTITY, 1e-8));
    }

    #[test]
    fn svd_identity_is_trivial() {
        let (u, sigma, v) = svd(DMat3::IDENTITY);
        assert!(approx_eq_mat(u, DMat3::IDENTITY, 1e-9));
        assert!(approx_eq_mat(v, DMat3::IDENTITY, 1e-9));
        assert!((sigma - DVec3::ONE).length() < 1e-9);
    }

    #[test]
    fn cofactor_matches_det_times_inverse_transpose() {
        let f = DMat3::from_cols(
            DVec3::new(2.0, 0.0, 0.1),
            DVec3::new(0.0, 1.5, 0.0),
            DVec3::new(0.2, 0.0, 1.1),
        );
        let expected = f.determinant() * f.inverse().transpose();
        assert!(approx_eq_mat(cofactor(f), expected, 1e-9));
    }

    #[test]
    fn cofactor_differential_matches_finite_difference() {
        let f = DMat3::from_cols(
            DVec3::new(1.3, 0.1, 0.0),
            DVec3::new(0.0, 0.9, 0.2),
            DVec3::new(0.1, 0.0, 1.2),
        );
        let df = DMat3::from_cols(
            DVec3::new(0.02, -0.01, 0.0),
            DVec3::new(0.01, 0.03, -0.02),
            DVec3::new(0.0, 0.01, 0.02),
        );
        let eps = 1e-6;
        let numeric = (cofactor(f + eps * df) - cofactor(f - eps * df)) * (1.0 / (2.0 * eps));
        let analytic = cofactor_differential(f, df);
        assert!(approx_eq_mat(numeric, analytic, 1e-4));
    }

    #[test]
    fn double_contract_matches_definition() {
        let a = DMat3::from_cols(DVec3::new(1.0, 2.0, 3.0), DVec3::new(4.0, 5.0, 6.0), DVec3::new(7.0, 8.0, 9.0));
        let b = DMat3::IDENTITY;
        assert!((double_contract(a, b) - (1.0 + 5.0 + 9.0)).abs() < 1e-12);
    }
}
