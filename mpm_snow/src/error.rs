//! Error types for the solver.

use thiserror::Error;

/// Top-level error type returned by every fallible solver entry point.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Numerical(#[from] NumericalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("grid spacing must be positive, got {0}")]
    NonPositiveSpacing(f64),

    #[error("grid extent must be non-zero in every dimension, got {0:?}")]
    ZeroExtentGrid((u32, u32, u32)),

    #[error("particle mass must be positive, got {0}")]
    NonPositiveMass(f64),
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("update called with tick_index {got}, but tick 0 has not run yet (expected 0)")]
    TickOrderViolation { got: u64 },

    #[error("update(dt, 0) was already run once; tick 0 must run exactly once")]
    DuplicateInitTick,

    #[error("particle volume0 was referenced before the initialization tick ran")]
    VolumeNotInitialized,
}

#[derive(Error, Debug)]
pub enum NumericalError {
    #[error("particle {index} has a non-finite entry in its elastic deformation gradient")]
    NonFiniteElastic { index: usize },

    #[error("particle {index} has a non-finite entry in its plastic deformation gradient")]
    NonFinitePlastic { index: usize },

    #[error("particle {index} has det(F_E) = {det} <= 0")]
    NonPositiveJacobian { index: usize, det: f64 },
}

pub type Result<T> = std::result::Result<T, SolverError>;
