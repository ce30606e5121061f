//! The Lagrangian particle: position, kinematics, mass/volume, and the elastic
//! plastic split of the deformation gradient.

use glam::{DMat3, DVec3};

use crate::kinematics::Kinematics;

/// A single material point. `volume0` is populated by the initialization tick
/// ([`crate::transfer::initialize_volumes`]) and is `None` until then.
#[derive(Clone, Debug)]
pub struct Particle {
    pub position: DVec3,
    pub kinematics: Kinematics,
    pub mass: f64,
    /// Rest volume, computed once from the node density sampled on tick 0.
    pub volume0: Option<f64>,
    pub deform_elastic: DMat3,
    pub deform_plastic: DMat3,
}

impl Particle {
    pub fn new(position: DVec3, mass: f64, velocity: DVec3) -> Self {
        Self {
            position,
            kinematics: Kinematics {
                velocity_curr: velocity,
                ..Kinematics::default()
            },
            mass,
            volume0: None,
            deform_elastic: DMat3::IDENTITY,
            deform_plastic: DMat3::IDENTITY,
        }
    }

    /// Total deformation gradient `F = F_E F_P`.
    pub fn deform_total(&self) -> DMat3 {
        self.deform_elastic * self.deform_plastic
    }

    pub fn velocity(&self) -> DVec3 {
        self.kinematics.velocity_curr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_particle_starts_undeformed_and_uninitialized() {
        let p = Particle::new(DVec3::new(1.0, 2.0, 3.0), 0.5, DVec3::ZERO);
        assert!(p.volume0.is_none());
        assert_eq!(p.deform_elastic, DMat3::IDENTITY);
        assert_eq!(p.deform_plastic, DMat3::IDENTITY);
        assert_eq!(p.deform_total(), DMat3::IDENTITY);
    }
}
