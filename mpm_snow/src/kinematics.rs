//! The velocity state shared by grid nodes and particles.
//!
//! The reference implementation this crate is modeled on gave grid nodes and
//! particles a common base class for their double-buffered velocity and collision
//! response. Rust has no inheritance, so instead `Kinematics` is a small record
//! embedded by value in both [`crate::grid::GridNode`] and [`crate::particle::Particle`],
//! and [`collide`] is a free function over anything that holds one.

use glam::DVec3;

use crate::collider::Collider;

/// Double-buffered velocity plus the transient `v*` used mid-tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    /// Velocity at the start of the tick, `v^n`.
    pub velocity_curr: DVec3,
    /// Velocity at the end of the tick, `v^{n+1}`, populated by the end of `update`.
    pub velocity_next: DVec3,
    /// Transient post-force, pre-collision velocity used within a single tick.
    pub velocity_star: DVec3,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            velocity_curr: DVec3::ZERO,
            velocity_next: DVec3::ZERO,
            velocity_star: DVec3::ZERO,
        }
    }
}

impl Kinematics {
    /// Swap `velocity_curr` and `velocity_next` at a tick boundary. Kept as an
    /// explicit call rather than indexing a `[v0, v1]` pair by `tick % 2`, so call
    /// sites never need to reason about tick parity.
    pub fn advance_tick(&mut self) {
        std::mem::swap(&mut self.velocity_curr, &mut self.velocity_next);
    }
}

/// Project a velocity against a single collider, per the node/particle collision
/// rule: no-op if separating, stick if within the friction cone, otherwise slide.
///
/// Applying this twice in a row is idempotent: the second call observes
/// `v_rel . n >= 0` (the collision already resolved the penetrating component) and
/// returns the input unchanged.
pub fn collide(velocity: DVec3, collider: &dyn Collider, position: DVec3) -> DVec3 {
    let v_co = collider.velocity_at(position);
    let v_rel = velocity - v_co;
    let normal = collider.outward_normal_at(position);
    let v_n = v_rel.dot(normal);
    if v_n >= 0.0 {
        return velocity;
    }

    let v_t = v_rel - normal * v_n;
    let friction = collider.friction();
    let v_rel = if v_t.length() <= -friction * v_n {
        DVec3::ZERO
    } else {
        v_t + friction * v_n * (v_t / v_t.length())
    };
    v_rel + v_co
}

/// Apply every collider in turn. Order matters only for overlapping colliders,
/// which the reference scenes never construct.
pub fn collide_all(mut velocity: DVec3, colliders: &[Box<dyn Collider>], position: DVec3) -> DVec3 {
    for collider in colliders {
        if collider.signed_distance_at(position) <= 0.0 {
            velocity = collide(velocity, collider.as_ref(), position);
        }
    }
    velocity
}
