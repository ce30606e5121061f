//! Step 3 (SPEC_FULL §4.5): gravity initialization plus the fixed-corotated
//! elastoplastic stress contribution to nodal force. Grounded on the same
//! per-thread-private accumulate-then-merge pattern as [`crate::transfer`].

use glam::DVec3;
use rayon::prelude::*;

use crate::grid::Grid;
use crate::math::polar_decompose;
use crate::particle::Particle;

/// Gravitational acceleration along -z, per SPEC_FULL's "z is up" convention.
pub const GRAVITY: f64 = -9.8;

/// Lame parameters and their current hardening coefficient for one particle.
pub struct Hardening {
    pub mu: f64,
    pub lambda: f64,
}

/// Exponential hardening: stiffen elastic moduli as the material is compacted
/// (`j_p < 1`).
pub fn hardening(mu0: f64, lambda0: f64, xi: f64, j_p: f64) -> Hardening {
    let e = (xi * (1.0 - j_p)).exp();
    Hardening {
        mu: mu0 * e,
        lambda: lambda0 * e,
    }
}

/// Reset every node's force to gravity, then accumulate each particle's
/// fixed-corotated stress contribution.
pub fn accumulate_forces(grid: &mut Grid, particles: &[Particle], mu0: f64, lambda0: f64, xi: f64) {
    grid.nodes_mut().par_iter_mut().for_each(|node| {
        node.force = DVec3::new(0.0, 0.0, GRAVITY * node.mass);
    });

    let node_count = grid.node_count();
    let accum = particles
        .par_iter()
        .fold(
            || vec![DVec3::ZERO; node_count],
            |mut local: Vec<DVec3>, particle| {
                let Some(volume0) = particle.volume0 else {
                    return local;
                };
                let f_e = particle.deform_elastic;
                let f_p = particle.deform_plastic;
                let j_p = f_p.determinant();
                let j_e = f_e.determinant();
                let Hardening { mu, lambda } = hardening(mu0, lambda0, xi, j_p);
                let (r_e, _s_e) = polar_decompose(f_e);
                let p_stress = 2.0 * mu * (f_e - r_e) * f_e.transpose()
                    + glam::DMat3::IDENTITY * (lambda * (j_e - 1.0) * j_e);

                for entry in grid.stencil(particle.position) {
                    local[entry.index] -= volume0 * (p_stress * entry.gradient);
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
        );

    grid.nodes_mut()
        .par_iter_mut()
        .zip(accum.par_iter())
        .for_each(|(node, f)| node.force += *f);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DMat3;

    #[test]
    fn undeformed_particle_contributes_no_stress_force() {
        let mut grid = Grid::new((16, 16, 16), 0.1);
        let mut p = Particle::new(DVec3::new(0.8, 0.8, 0.8), 1.0, DVec3::ZERO);
        p.volume0 = Some(1e-3);
        assert_eq!(p.deform_elastic, DMat3::IDENTITY);
        accumulate_forces(&mut grid, &[p], 1.0, 1.0, 10.0);
        let total_z: f64 = grid.nodes().iter().map(|n| n.force.z).sum();
        assert!(total_z < 0.0, "gravity alone should pull the total force down");
    }

    #[test]
    fn hardening_increases_with_compaction() {
        let relaxed = hardening(1.0, 1.0, 10.0, 1.0);
        let compacted = hardening(1.0, 1.0, 10.0, 0.9);
        assert!(compacted.mu > relaxed.mu);
        assert!(compacted.lambda > relaxed.lambda);
    }
}
