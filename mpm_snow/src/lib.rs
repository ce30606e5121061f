//! A hybrid Lagrangian/Eulerian snow simulator built on the Material Point
//! Method: particles carry mass, velocity, and an elastic/plastic split of the
//! deformation gradient; a background grid mediates collisions between them via
//! a cubic B-spline transfer every tick.

pub mod collider;
pub mod error;
pub mod force;
pub mod grid;
pub mod integrator;
pub mod kernel;
pub mod kinematics;
pub mod math;
pub mod particle;
pub mod particle_update;
pub mod scene;
pub mod snapshot;
pub mod solver;
pub mod transfer;

pub use collider::{Collider, Floor};
pub use error::{ConfigError, NumericalError, SolverError, StateError};
pub use particle::Particle;
pub use solver::{Solver, SolverParams};
