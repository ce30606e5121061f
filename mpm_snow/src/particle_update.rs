//! Steps 7-10 (SPEC_FULL §4.9): gather the updated grid velocity back onto each
//! particle, evolve its elastic/plastic deformation split, blend PIC/FLIP
//! velocities, collide, and advect.

use glam::{DMat3, DVec3};
use rayon::prelude::*;

use crate::collider::Collider;
use crate::grid::Grid;
use crate::kinematics::collide_all;
use crate::math::svd;
use crate::particle::Particle;

/// Plasticity clamp bounds and PIC/FLIP blend weight.
pub struct ParticleUpdateParams {
    pub dt: f64,
    pub theta_c: f64,
    pub theta_s: f64,
    pub alpha: f64,
}

pub fn update_particles(
    grid: &Grid,
    particles: &mut [Particle],
    colliders: &[Box<dyn Collider>],
    params: &ParticleUpdateParams,
) {
    particles.par_iter_mut().for_each(|particle| {
        update_one(grid, particle, colliders, params);
    });
}

fn update_one(grid: &Grid, particle: &mut Particle, colliders: &[Box<dyn Collider>], params: &ParticleUpdateParams) {
    let mut grad_v = DMat3::ZERO;
    let mut v_pic = DVec3::ZERO;
    let mut v_flip_delta = DVec3::ZERO;

    for entry in grid.stencil(particle.position) {
        let node = grid.node(entry.index);
        let v_next = node.kinematics.velocity_next;
        let v_curr = node.kinematics.velocity_curr;
        grad_v += outer(v_next, entry.gradient);
        v_pic += v_next * entry.weight;
        v_flip_delta += (v_next - v_curr) * entry.weight;
    }

    let m = DMat3::IDENTITY + params.dt * grad_v;
    let f_prime = m * particle.deform_elastic * particle.deform_plastic;
    let f_e_trial = m * particle.deform_elastic;

    let (u, sigma, v) = svd(f_e_trial);
    let clamped = DVec3::new(
        sigma.x.clamp(1.0 - params.theta_c, 1.0 + params.theta_s),
        sigma.y.clamp(1.0 - params.theta_c, 1.0 + params.theta_s),
        sigma.z.clamp(1.0 - params.theta_c, 1.0 + params.theta_s),
    );

    particle.deform_elastic = u * DMat3::from_diagonal(clamped) * v.transpose();
    let inv_sigma = DVec3::new(1.0 / clamped.x, 1.0 / clamped.y, 1.0 / clamped.z);
    particle.deform_plastic = v * DMat3::from_diagonal(inv_sigma) * u.transpose() * f_prime;

    let v_flip = particle.velocity() + v_flip_delta;
    let v_star = (1.0 - params.alpha) * v_pic + params.alpha * v_flip;
    let v_star = collide_all(v_star, colliders, particle.position);

    particle.kinematics.velocity_curr = v_star;
    particle.position += params.dt * v_star;
}

fn outer(a: DVec3, b: DVec3) -> DMat3 {
    DMat3::from_cols(a * b.x, a * b.y, a * b.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::Kinematics;

    #[test]
    fn zero_grid_velocity_freezes_deformation_and_position() {
        let grid = Grid::new((16, 16, 16), 0.1);
        let mut particle = Particle::new(DVec3::new(0.8, 0.8, 0.8), 1.0, DVec3::ZERO);
        particle.volume0 = Some(1e-3);
        let before = particle.position;
        let params = ParticleUpdateParams {
            dt: 1e-3,
            theta_c: 2.5e-2,
            theta_s: 7.5e-3,
            alpha: 0.95,
        };
        update_particles(&grid, std::slice::from_mut(&mut particle), &[], &params);
        assert!((particle.position - before).length() < 1e-12);
        assert_eq!(particle.deform_elastic, DMat3::IDENTITY);
        assert_eq!(particle.deform_plastic, DMat3::IDENTITY);
    }

    #[test]
    fn particle_advects_with_uniform_grid_velocity() {
        let mut grid = Grid::new((16, 16, 16), 0.1);
        let v = DVec3::new(0.0, 0.0, -1.0);
        for node in grid.nodes_mut() {
            node.mass = 1.0;
            node.kinematics = Kinematics {
                velocity_curr: v,
                velocity_next: v,
                velocity_star: v,
            };
        }
        let mut particle = Particle::new(DVec3::new(0.8, 0.8, 0.8), 1.0, v);
        particle.volume0 = Some(1e-3);
        let params = ParticleUpdateParams {
            dt: 0.01,
            theta_c: 2.5e-2,
            theta_s: 7.5e-3,
            alpha: 0.95,
        };
        update_particles(&grid, std::slice::from_mut(&mut particle), &[], &params);
        assert!((particle.velocity() - v).length() < 1e-9);
        assert!((particle.position.z - (0.8 - 0.01)).abs() < 1e-9);
    }

    #[test]
    fn plastic_clamp_bounds_elastic_singular_values() {
        let grid = Grid::new((16, 16, 16), 0.1); // zero grid velocity everywhere: M = I
        let theta_c = 2.5e-2;
        let theta_s = 7.5e-3;
        let mut particle = Particle::new(DVec3::new(0.8, 0.8, 0.8), 1.0, DVec3::ZERO);
        particle.volume0 = Some(1e-3);
        particle.deform_elastic = DMat3::from_diagonal(DVec3::new(0.5, 1.0, 1.5));
        let params = ParticleUpdateParams {
            dt: 1e-3,
            theta_c,
            theta_s,
            alpha: 0.95,
        };
        update_particles(&grid, std::slice::from_mut(&mut particle), &[], &params);

        let (_, sigma, _) = svd(particle.deform_elastic);
        let lower = 1.0 - theta_c;
        let upper = 1.0 + theta_s;
        for s in [sigma.x, sigma.y, sigma.z] {
            assert!(s >= lower - 1e-9 && s <= upper + 1e-9, "sigma={s} out of [{lower}, {upper}]");
        }
    }
}
