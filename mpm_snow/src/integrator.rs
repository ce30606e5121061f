//! Step 4-6 (SPEC_FULL §4.6-§4.7): explicit grid integration and collision, plus
//! the optional matrix-free implicit velocity solve. The explicit path is always
//! computed first and used verbatim as `v*`; the implicit path, when enabled,
//! refines `v*` into `v^{n+1}` by solving a linearized force balance with a
//! conjugate-residual iteration, falling back to `v*` on non-convergence. This
//! mirrors the solve-with-fallback shape of the reference iterative contact
//! solver, generalized from a per-contact sequential pass to one global
//! matrix-free linear solve.

use glam::{DMat3, DVec3};
use rayon::prelude::*;
use tracing::warn;

use crate::collider::Collider;
use crate::force::hardening;
use crate::grid::Grid;
use crate::kinematics::collide_all;
use crate::math::{cofactor, cofactor_differential, double_contract, polar_decompose};
use crate::particle::Particle;

/// Step 4-5 (SPEC_FULL §4.6): `v* = v + dt f/m`, then collide in place. Nodes
/// with zero mass are left at rest. This is always computed, and is the implicit
/// solve's fallback and initial guess.
pub fn explicit_integrate_and_collide(grid: &mut Grid, colliders: &[Box<dyn Collider>], dt: f64) {
    let h = grid.h();
    grid.nodes_mut().par_iter_mut().for_each(|node| {
        let v_star = if node.mass > 0.0 {
            node.kinematics.velocity_curr + dt * node.force / node.mass
        } else {
            DVec3::ZERO
        };
        let position = node.position(h);
        node.kinematics.velocity_star = collide_all(v_star, colliders, position);
    });
}

/// Parameters needed to evaluate the implicit operator's `delta_f`.
pub struct ImplicitParams {
    pub dt: f64,
    pub beta: f64,
    pub mu0: f64,
    pub lambda0: f64,
    pub xi: f64,
}

/// Step 6 (SPEC_FULL §4.7): refine `v*` (already written into every node's
/// `velocity_star`) into `v^{n+1}` via conjugate residual. On convergence within
/// `max_iter` to a residual `<= tol`, writes the solved field into
/// `velocity_next`; otherwise falls back to the untouched `v*`, bit-identical to
/// [`explicit_integrate_and_collide`]'s output.
pub fn implicit_solve(grid: &mut Grid, particles: &[Particle], params: &ImplicitParams) {
    let b: Vec<DVec3> = grid.nodes().iter().map(|n| n.kinematics.velocity_star).collect();
    let masses: Vec<f64> = grid.nodes().iter().map(|n| n.mass).collect();

    let apply = |v: &[DVec3]| -> Vec<DVec3> { apply_operator(grid, particles, &masses, v, params) };

    match conjugate_residual(&apply, &b, 1e-10, 500) {
        Some(solved) => {
            for (node, v) in grid.nodes_mut().iter_mut().zip(solved.into_iter()) {
                node.kinematics.velocity_next = v;
            }
        }
        None => {
            warn!("implicit solve did not converge within the iteration cap, falling back to v*");
            for node in grid.nodes_mut().iter_mut() {
                node.kinematics.velocity_next = node.kinematics.velocity_star;
            }
        }
    }
}

/// `a.v = v - (beta dt / m_g) delta_f(v)`.
fn apply_operator(
    grid: &Grid,
    particles: &[Particle],
    masses: &[f64],
    v: &[DVec3],
    params: &ImplicitParams,
) -> Vec<DVec3> {
    let delta_f = delta_force(grid, particles, v, params);
    masses
        .iter()
        .zip(v.iter())
        .zip(delta_f.iter())
        .map(|((&m, &vi), &df)| {
            if m > 0.0 {
                vi - (params.beta * params.dt / m) * df
            } else {
                vi
            }
        })
        .collect()
}

fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

fn skew(a: f64, b: f64, c: f64) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(0.0, a, b),
        DVec3::new(-a, 0.0, c),
        DVec3::new(-b, -c, 0.0),
    )
}

/// First-order change in nodal elastic force under a virtual nodal velocity
/// field `v`, accumulated per particle (SPEC_FULL §4.7 steps 1-4).
fn delta_force(grid: &Grid, particles: &[Particle], v: &[DVec3], params: &ImplicitParams) -> Vec<DVec3> {
    let node_count = grid.node_count();
    particles
        .par_iter()
        .fold(
            || vec![DVec3::ZERO; node_count],
            |mut local: Vec<DVec3>, particle| {
                let Some(volume0) = particle.volume0 else {
                    return local;
                };
                let f_e = particle.deform_elastic;
                let j_p = particle.deform_plastic.determinant();
                let j_e = f_e.determinant();
                let crate::force::Hardening { mu, lambda } =
                    hardening(params.mu0, params.lambda0, params.xi, j_p);

                let mut grad_v = DMat3::ZERO;
                for entry in grid.stencil(particle.position) {
                    grad_v += outer(v[entry.index], entry.gradient);
                }
                let delta_f_e = params.dt * grad_v * f_e;

                let (r, s) = polar_decompose(f_e);
                let omega = r.transpose() * delta_f_e - delta_f_e.transpose() * r;
                let (omega01, omega02, omega12) = (
                    omega.col(1).x, // Omega_{0,1}: column 1, row 0
                    omega.col(2).x,
                    omega.col(2).y,
                );
                let s_arr = s.to_cols_array_2d();
                let (s00, s01, s02) = (s_arr[0][0], s_arr[1][0], s_arr[2][0]);
                let (s10, s11, s12) = (s_arr[0][1], s_arr[1][1], s_arr[2][1]);
                let (s21, s22) = (s_arr[1][2], s_arr[2][2]);
                let coeff = DMat3::from_cols(
                    DVec3::new(s00 + s11, s21, -s02),
                    DVec3::new(s12, s00 + s22, s01),
                    DVec3::new(-s02, s10, s11 + s22),
                );
                let rhs = DVec3::new(omega01, omega02, omega12);
                let abc = coeff.inverse() * rhs;
                let delta_r = r * skew(abc.x, abc.y, abc.z);

                let cof = cofactor(f_e);
                let delta_cof = cofactor_differential(f_e, delta_f_e);
                let delta_j_e = double_contract(cof, delta_f_e);

                let delta_p = 2.0 * mu * (delta_f_e - delta_r)
                    + lambda * (cof * delta_j_e + (j_e - 1.0) * delta_cof);

                let delta_p_f_et = delta_p * f_e.transpose();
                for entry in grid.stencil(particle.position) {
                    local[entry.index] -= volume0 * (delta_p_f_et * entry.gradient);
                }
                local
            },
        )
        .reduce(
            || vec![DVec3::ZERO; node_count],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b.into_iter()) {
                    *x += y;
                }
                a
            },
        )
}

fn dot_all(a: &[DVec3], b: &[DVec3]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.dot(*y)).sum()
}

fn axpy(out: &mut [DVec3], alpha: f64, x: &[DVec3]) {
    for (o, xi) in out.iter_mut().zip(x.iter()) {
        *o += alpha * *xi;
    }
}

/// Matrix-free conjugate residual solve of `op(x) = b`. Returns `None` if the
/// residual has not dropped to `tol` within `max_iter` iterations.
fn conjugate_residual(
    op: &dyn Fn(&[DVec3]) -> Vec<DVec3>,
    b: &[DVec3],
    tol: f64,
    max_iter: usize,
) -> Option<Vec<DVec3>> {
    let mut x: Vec<DVec3> = b.to_vec();
    let ax0 = op(&x);
    let mut r: Vec<DVec3> = b.iter().zip(ax0.iter()).map(|(bi, axi)| *bi - *axi).collect();

    let b_norm = dot_all(b, b).sqrt().max(1e-300);
    if dot_all(&r, &r).sqrt() / b_norm <= tol {
        return Some(x);
    }

    let mut p = r.clone();
    let mut ar = op(&r);
    let mut ap = ar.clone();

    for _ in 0..max_iter {
        let r_dot_ar = dot_all(&r, &ar);
        let ap_dot_ap = dot_all(&ap, &ap);
        if ap_dot_ap <= 0.0 {
            return None;
        }
        let alpha = r_dot_ar / ap_dot_ap;

        axpy(&mut x, alpha, &p);
        let mut r_new = r.clone();
        axpy(&mut r_new, -alpha, &ap);

        let residual = dot_all(&r_new, &r_new).sqrt() / b_norm;
        if residual <= tol {
            return Some(x);
        }

        let ar_new = op(&r_new);
        let r_new_dot_ar_new = dot_all(&r_new, &ar_new);
        if r_dot_ar.abs() <= 0.0 {
            return None;
        }
        let beta = r_new_dot_ar_new / r_dot_ar;

        let mut p_new = r_new.clone();
        axpy(&mut p_new, beta, &p);
        let mut ap_new = ar_new.clone();
        axpy(&mut ap_new, beta, &ap);

        r = r_new;
        ar = ar_new;
        p = p_new;
        ap = ap_new;
    }
    None
}
