//! Scene construction (SPEC_FULL §4.11): plain functions that populate a
//! [`Solver`] by calling [`Solver::add_particle`] repeatedly. Unlike the
//! reference engine's `Scenario` trait objects, these hold no state of their
//! own; a scene is just a sequence of `add_particle` calls, so a function is
//! the idiomatic shape once there is no per-scenario lifecycle to manage.

use glam::DVec3;

use crate::error::Result;
use crate::solver::Solver;

/// Target density used to turn a region's volume into a per-particle mass,
/// given the lattice spacing at which particles are sampled.
const TARGET_DENSITY: f64 = 400.0; // kg / m^3, roughly settled snow

/// Sample a uniform-density sphere on a cubic lattice of spacing `spacing`,
/// keeping only lattice points within `radius` of `center`, and add one
/// particle per kept point with the given initial velocity.
pub fn snowball(
    solver: &mut Solver,
    center: DVec3,
    radius: f64,
    spacing: f64,
    velocity: DVec3,
) -> Result<()> {
    let particle_mass = TARGET_DENSITY * spacing.powi(3);
    let steps = (radius / spacing).ceil() as i64;
    for iz in -steps..=steps {
        for iy in -steps..=steps {
            for ix in -steps..=steps {
                let offset = DVec3::new(ix as f64, iy as f64, iz as f64) * spacing;
                if offset.length() > radius {
                    continue;
                }
                solver.add_particle(center + offset, particle_mass, velocity)?;
            }
        }
    }
    Ok(())
}

/// Sample a rectangular block on the same lattice, for ground-contact and
/// compaction scenarios. `extents` gives the block's full size along each
/// axis; `min_corner` is the block's lowest corner.
pub fn slab(
    solver: &mut Solver,
    min_corner: DVec3,
    extents: DVec3,
    spacing: f64,
    velocity: DVec3,
) -> Result<()> {
    let particle_mass = TARGET_DENSITY * spacing.powi(3);
    let counts = (
        (extents.x / spacing).round().max(1.0) as i64,
        (extents.y / spacing).round().max(1.0) as i64,
        (extents.z / spacing).round().max(1.0) as i64,
    );
    for iz in 0..counts.2 {
        for iy in 0..counts.1 {
            for ix in 0..counts.0 {
                let offset = DVec3::new(ix as f64, iy as f64, iz as f64) * spacing;
                solver.add_particle(min_corner + offset, particle_mass, velocity)?;
            }
        }
    }
    Ok(())
}
