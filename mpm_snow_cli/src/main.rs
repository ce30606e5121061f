//! Command-line launcher: `<bin> <routine> [args...]` dispatches to a scene
//! generator plus a headless run, or to snapshot inspection. No rendering
//! routine is implemented; the dispatcher is the full extent of the launcher.

use std::fs::File;
use std::io::BufReader;

use glam::DVec3;
use mpm_snow::scene;
use mpm_snow::snapshot::{self, LoadParams};
use mpm_snow::{Solver, SolverParams};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
enum CliError {
    #[error("usage: {0}")]
    Usage(String),
    #[error(transparent)]
    Solver(#[from] mpm_snow::SolverError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn main() {
    tracing_subscriber::fmt::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(err) = run(&args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), CliError> {
    let routine = args.first().ok_or_else(|| {
        CliError::Usage("<bin> <snowball|slab|inspect> [args...]".to_string())
    })?;

    match routine.as_str() {
        "snowball" => run_snowball(),
        "slab" => run_slab(),
        "inspect" => {
            let path = args
                .get(1)
                .ok_or_else(|| CliError::Usage("<bin> inspect <path>".to_string()))?;
            inspect(path)
        }
        other => Err(CliError::Usage(format!("unknown routine '{other}'"))),
    }
}

fn default_params(h: f64, grid_dims: (usize, usize, usize)) -> SolverParams {
    SolverParams {
        h,
        grid_dims,
        mu0: 58333.0,
        lambda0: 38888.0,
        xi: 10.0,
        theta_c: 2.5e-2,
        theta_s: 7.5e-3,
        alpha: 0.95,
        beta: 0.5,
        implicit: false,
    }
}

fn run_snowball() -> Result<(), CliError> {
    let mut solver = Solver::new(default_params(0.0144, (64, 64, 64)))?;
    scene::snowball(
        &mut solver,
        DVec3::new(0.46, 0.46, 0.46),
        0.03,
        0.0072,
        DVec3::ZERO,
    )?;
    run_headless(&mut solver, 200)
}

fn run_slab() -> Result<(), CliError> {
    let mut solver = Solver::new(default_params(0.02, (64, 64, 64)))?;
    solver.add_collider(Box::new(mpm_snow::Floor::new(0.1, DVec3::Z, 1.0)));
    scene::slab(
        &mut solver,
        DVec3::new(0.3, 0.3, 0.2),
        DVec3::new(0.2, 0.2, 0.1),
        0.02,
        DVec3::ZERO,
    )?;
    run_headless(&mut solver, 500)
}

fn run_headless(solver: &mut Solver, ticks: u64) -> Result<(), CliError> {
    let dt = 1e-4;
    for tick in 0..ticks {
        solver.update(dt, tick)?;
    }
    info!(
        particles = solver.particle_count(),
        ticks, "headless run complete"
    );
    println!("ran {ticks} ticks over {} particles", solver.particle_count());
    Ok(())
}

fn inspect(path: &str) -> Result<(), CliError> {
    let file = File::open(path)?;
    let solver = snapshot::load_state(
        BufReader::new(file),
        LoadParams {
            mu0: 58333.0,
            lambda0: 38888.0,
            xi: 10.0,
            theta_c: 2.5e-2,
            theta_s: 7.5e-3,
            alpha: 0.95,
            beta: 0.5,
            implicit: false,
        },
    )?;
    println!("grid: {:?} at h={}", solver.grid().dims(), solver.params().h);
    println!("particles: {}", solver.particle_count());
    Ok(())
}
