//! Colliders: the polymorphic capability set a velocity is projected against.
//!
//! The reference simulator hard-codes a single floor directly inside the collision
//! routine. Here the floor is one [`Collider`] in a `Vec<Box<dyn Collider>>` owned
//! by the solver, following the same boxed-trait-object-plus-`dyn_clone` idiom this
//! crate already uses for its other polymorphic per-contact state.

use dyn_clone::DynClone;
use glam::DVec3;

/// A surface a node or particle velocity can be projected against.
pub trait Collider: DynClone + std::fmt::Debug + Send + Sync {
    /// Negative inside the collider, zero on its boundary, positive outside.
    fn signed_distance_at(&self, position: DVec3) -> f64;

    /// Outward-facing unit normal at (or near) `position`.
    fn outward_normal_at(&self, position: DVec3) -> DVec3;

    /// Velocity of the collider's surface at `position`; zero for static colliders.
    fn velocity_at(&self, position: DVec3) -> DVec3;

    /// Coulomb friction coefficient of the surface.
    fn friction(&self) -> f64;
}

dyn_clone::clone_trait_object!(Collider);

/// An infinite, static, axis-aligned plane. The reference scene's single floor is
/// `Floor::new(0.1, DVec3::Z, 1.0)`.
#[derive(Clone, Debug)]
pub struct Floor {
    pub height: f64,
    pub normal: DVec3,
    pub friction: f64,
}

impl Floor {
    pub fn new(height: f64, normal: DVec3, friction: f64) -> Self {
        Self {
            height,
            normal: normal.normalize(),
            friction,
        }
    }
}

impl Collider for Floor {
    fn signed_distance_at(&self, position: DVec3) -> f64 {
        position.dot(self.normal) - self.height
    }

    fn outward_normal_at(&self, _position: DVec3) -> DVec3 {
        self.normal
    }

    fn velocity_at(&self, _position: DVec3) -> DVec3 {
        DVec3::ZERO
    }

    fn friction(&self) -> f64 {
        self.friction
    }
}
