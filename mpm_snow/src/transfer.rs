//! Particle-to-grid mass/momentum rasterization and the tick-0 volume
//! initialization. Grounded on the chunked fold/reduce accumulation pattern used
//! for per-thread-private contact state elsewhere in this crate; generalized here
//! to per-thread-private grid accumulators merged after the parallel region, since
//! multiple particles in the same chunk can touch the same node.
use glam::DVec3;
use rayon::prelude::*;

use crate::grid::Grid;
use crate::particle::Particle;

/// A single node's accumulated mass and momentum, used as the per-thread-private
/// fold state during P2G before nodes are merged.
#[derive(Clone, Copy, Default)]
struct NodeAccum {
    mass: f64,
    momentum: DVec3,
}

/// Step 1 (SPEC_FULL §4.3): rasterize particle mass and momentum onto the grid,
/// then normalize to nodal velocity.
pub fn particle_to_grid(grid: &mut Grid, particles: &[Particle]) {
    let node_count = grid.node_count();

    let accum = particles
        .par_iter()
        .fold(
            || vec![NodeAccum::default(); node_count],
            |mut local: Vec<NodeAccum>, particle| {
                for entry in grid.stencil(particle.position) {
                    let node = &mut local[entry.index];
                    node.mass += particle.mass * entry.weight;
                    node.momentum += particle.mass * particle.velocity() * entry.weight;
                }
                local
            },
        )
        .reduce(
            || vec![NodeAccum::default(); node_count],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b.into_iter()) {
                    x.mass += y.mass;
                    x.momentum += y.momentum;
                }
                a
            },
        );

    grid.nodes_mut()
        .par_iter_mut()
        .zip(accum.par_iter())
        .for_each(|(node, acc)| {
            node.mass = acc.mass;
            node.kinematics.velocity_curr = if acc.mass > 0.0 {
                acc.momentum / acc.mass
            } else {
                DVec3::ZERO
            };
        });
}

/// Step 2 (SPEC_FULL §4.4): executed once, on tick 0, after [`particle_to_grid`].
/// Freezes each node's rest density, then computes each particle's rest volume
/// from the nodal density sampled at its stencil and freezes it for the
/// particle's lifetime.
pub fn initialize_volumes(grid: &mut Grid, particles: &mut [Particle]) {
    let cell_volume = grid.h().powi(3);
    grid.nodes_mut()
        .par_iter_mut()
        .for_each(|node| node.density0 = node.mass / cell_volume);

    particles.par_iter_mut().for_each(|particle| {
        let mut density = 0.0;
        for entry in grid.stencil(particle.position) {
            let node = grid.node(entry.index);
            density += node.density0 * entry.weight;
        }
        if density > 0.0 {
            particle.volume0 = Some(particle.mass / density);
        }
    });
}
