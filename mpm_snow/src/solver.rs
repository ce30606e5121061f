//! The top-level driver: owns the grid, the particles, and the collider set,
//! and orchestrates one tick through the ordered phases of SPEC_FULL §4.10.
//!
//! The tracing instrumentation follows the reference solver's pattern of an
//! `#[instrument]` span around the whole solve plus a nested span per unit of
//! work; here the unit of work is a tick phase rather than a solver iteration.

use glam::DVec3;
use tracing::{instrument, trace, trace_span};

use crate::collider::Collider;
use crate::error::{ConfigError, Result, SolverError, StateError};
use crate::force;
use crate::grid::Grid;
use crate::integrator::{self, ImplicitParams};
use crate::particle::Particle;
use crate::particle_update::{self, ParticleUpdateParams};
use crate::transfer;

/// Physical and numerical parameters for one [`Solver`] instance. Fixed for the
/// solver's lifetime.
#[derive(Clone, Debug)]
pub struct SolverParams {
    /// Grid node spacing.
    pub h: f64,
    /// Grid shape, `(nx, ny, nz)`.
    pub grid_dims: (usize, usize, usize),
    /// Initial shear modulus.
    pub mu0: f64,
    /// Initial first Lame parameter.
    pub lambda0: f64,
    /// Hardening coefficient.
    pub xi: f64,
    /// Plastic compression clamp bound.
    pub theta_c: f64,
    /// Plastic stretch clamp bound.
    pub theta_s: f64,
    /// PIC/FLIP blend weight, 0 = pure PIC, 1 = pure FLIP.
    pub alpha: f64,
    /// Implicit solve damping coefficient.
    pub beta: f64,
    /// Whether `update` runs the conjugate-residual implicit solve (§4.7) after
    /// the explicit step, or skips straight to the particle update with `v*`.
    pub implicit: bool,
}

impl SolverParams {
    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.h <= 0.0 {
            return Err(ConfigError::NonPositiveSpacing(self.h));
        }
        let (nx, ny, nz) = self.grid_dims;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(ConfigError::ZeroExtentGrid((nx as u32, ny as u32, nz as u32)));
        }
        Ok(())
    }
}

/// Owns the grid, the particles, and the collider set; advances them one tick at
/// a time via [`Solver::update`].
#[derive(Clone, Debug)]
pub struct Solver {
    params: SolverParams,
    grid: Grid,
    particles: Vec<Particle>,
    colliders: Vec<Box<dyn Collider>>,
    ran_init_tick: bool,
    tick: u64,
}

impl Solver {
    pub fn new(params: SolverParams) -> Result<Self> {
        params.validate()?;
        let grid = Grid::new(params.grid_dims, params.h);
        Ok(Self {
            params,
            grid,
            particles: Vec::new(),
            colliders: Vec::new(),
            ran_init_tick: false,
            tick: 0,
        })
    }

    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn add_collider(&mut self, collider: Box<dyn Collider>) {
        self.colliders.push(collider);
    }

    pub fn colliders(&self) -> &[Box<dyn Collider>] {
        &self.colliders
    }

    /// Add a particle with unknown rest volume; `volume0` is filled in by the
    /// initialization tick (tick 0).
    pub fn add_particle(&mut self, position: DVec3, mass: f64, velocity: DVec3) -> Result<()> {
        if mass <= 0.0 {
            return Err(ConfigError::NonPositiveMass(mass).into());
        }
        self.particles.push(Particle::new(position, mass, velocity));
        Ok(())
    }

    /// Add a particle after the initialization tick has already run, supplying
    /// its rest volume directly since no further tick-0 will compute one for it.
    pub fn add_particle_with_volume(
        &mut self,
        position: DVec3,
        mass: f64,
        velocity: DVec3,
        volume0: f64,
    ) -> Result<()> {
        if mass <= 0.0 {
            return Err(ConfigError::NonPositiveMass(mass).into());
        }
        let mut particle = Particle::new(position, mass, velocity);
        particle.volume0 = Some(volume0);
        self.particles.push(particle);
        Ok(())
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn tick_index(&self) -> u64 {
        self.tick
    }

    /// Advance the simulation by `dt`. `tick_index` must be 0 exactly once (the
    /// initialization tick, SPEC_FULL §4.4) and must equal the solver's internal
    /// tick counter on every call, matching the ordering contract of §4.10.
    #[instrument(level = "trace", skip(self), fields(tick_index, particles = self.particles.len()))]
    pub fn update(&mut self, dt: f64, tick_index: u64) -> Result<()> {
        if tick_index != self.tick {
            return Err(StateError::TickOrderViolation { got: tick_index }.into());
        }
        if tick_index == 0 && self.ran_init_tick {
            return Err(StateError::DuplicateInitTick.into());
        }

        {
            let _span = trace_span!("p2g").entered();
            transfer::particle_to_grid(&mut self.grid, &self.particles);
        }

        if tick_index == 0 {
            let _span = trace_span!("init_volumes").entered();
            transfer::initialize_volumes(&mut self.grid, &mut self.particles);
            self.ran_init_tick = true;
        }

        for particle in &self.particles {
            if particle.volume0.is_none() {
                return Err(StateError::VolumeNotInitialized.into());
            }
        }

        {
            let _span = trace_span!("forces").entered();
            force::accumulate_forces(
                &mut self.grid,
                &self.particles,
                self.params.mu0,
                self.params.lambda0,
                self.params.xi,
            );
        }

        {
            let _span = trace_span!("explicit_integrate").entered();
            integrator::explicit_integrate_and_collide(&mut self.grid, &self.colliders, dt);
        }

        if self.params.implicit {
            let _span = trace_span!("implicit_solve").entered();
            let implicit_params = ImplicitParams {
                dt,
                beta: self.params.beta,
                mu0: self.params.mu0,
                lambda0: self.params.lambda0,
                xi: self.params.xi,
            };
            integrator::implicit_solve(&mut self.grid, &self.particles, &implicit_params);
        } else {
            for node in self.grid.nodes_mut() {
                node.kinematics.velocity_next = node.kinematics.velocity_star;
            }
        }

        {
            let _span = trace_span!("particle_update").entered();
            let update_params = ParticleUpdateParams {
                dt,
                theta_c: self.params.theta_c,
                theta_s: self.params.theta_s,
                alpha: self.params.alpha,
            };
            particle_update::update_particles(
                &self.grid,
                &mut self.particles,
                &self.colliders,
                &update_params,
            );
        }

        for (index, particle) in self.particles.iter().enumerate() {
            if !particle.deform_elastic.is_finite() {
                return Err(crate::error::NumericalError::NonFiniteElastic { index }.into());
            }
            if !particle.deform_plastic.is_finite() {
                return Err(crate::error::NumericalError::NonFinitePlastic { index }.into());
            }
            let det = particle.deform_elastic.determinant();
            if det <= 0.0 {
                return Err(crate::error::NumericalError::NonPositiveJacobian { index, det }.into());
            }
        }

        for node in self.grid.nodes_mut() {
            node.kinematics.advance_tick();
        }
        trace!(tick = self.tick, "tick complete");
        self.tick += 1;
        Ok(())
    }
}
