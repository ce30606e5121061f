//! Cubic B-spline interpolation kernel shared by every particle/grid transfer.
//!
//! Each particle couples to at most a 4x4x4 neighborhood of grid nodes. The 1-D
//! weight and its derivative are evaluated once per axis per particle and combined
//! into the separable 3-D weight and weight gradient.

use glam::DVec3;

/// 1-D cubic B-spline, `N(x)`, zero outside `|x| < 2`.
pub fn cubic_bspline(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 1.0 {
        0.5 * ax * ax * ax - ax * ax + 2.0 / 3.0
    } else if ax < 2.0 {
        let t = 2.0 - ax;
        t * t * t / 6.0
    } else {
        0.0
    }
}

/// Derivative of [`cubic_bspline`] with respect to `x`.
pub fn cubic_bspline_grad(x: f64) -> f64 {
    let ax = x.abs();
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    if ax < 1.0 {
        sign * (1.5 * ax * ax - 2.0 * ax)
    } else if ax < 2.0 {
        let t = 2.0 - ax;
        sign * (-0.5 * t * t)
    } else {
        0.0
    }
}

/// The smallest grid-node index whose basis function can overlap a particle at
/// `d = p / h` along one axis, i.e. `floor(d) - 1`.
pub fn stencil_start(d: f64) -> i64 {
    d.floor() as i64 - 1
}

/// 3-D weight `w(g, p) = N(dx) N(dy) N(dz)` where `d = (p - g) / h`.
pub fn weight(delta: DVec3) -> f64 {
    cubic_bspline(delta.x) * cubic_bspline(delta.y) * cubic_bspline(delta.z)
}

/// 3-D weight gradient `(1/h) (N'(dx)N(dy)N(dz), N(dx)N'(dy)N(dz), N(dx)N(dy)N'(dz))`.
pub fn weight_gradient(delta: DVec3, inv_h: f64) -> DVec3 {
    let (nx, ny, nz) = (
        cubic_bspline(delta.x),
        cubic_bspline(delta.y),
        cubic_bspline(delta.z),
    );
    let (dnx, dny, dnz) = (
        cubic_bspline_grad(delta.x),
        cubic_bspline_grad(delta.y),
        cubic_bspline_grad(delta.z),
    );
    inv_h * DVec3::new(dnx * ny * nz, nx * dny * nz, nx * ny * dnz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bspline_is_zero_outside_support() {
        assert_eq!(cubic_bspline(2.0), 0.0);
        assert_eq!(cubic_bspline(-3.0), 0.0);
    }

    #[test]
    fn bspline_peaks_at_origin() {
        assert!(cubic_bspline(0.0) > cubic_bspline(0.5));
        assert!(cubic_bspline(0.5) > cubic_bspline(1.0));
    }

    #[test]
    fn bspline_is_continuous_at_piece_boundary() {
        let eps = 1e-6;
        assert!((cubic_bspline(1.0 - eps) - cubic_bspline(1.0 + eps)).abs() < 1e-4);
        assert!((cubic_bspline(2.0 - eps) - cubic_bspline(2.0 + eps)).abs() < 1e-4);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        for x in [-1.8, -1.2, -0.7, -0.1, 0.3, 0.9, 1.4, 1.9] {
            let h = 1e-6;
            let numeric = (cubic_bspline(x + h) - cubic_bspline(x - h)) / (2.0 * h);
            let analytic = cubic_bspline_grad(x);
            assert!(
                (numeric - analytic).abs() < 1e-4,
                "x={x} numeric={numeric} analytic={analytic}"
            );
        }
    }
}
