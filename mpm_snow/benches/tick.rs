use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec3;
use mpm_snow::{Solver, SolverParams};
use rand::Rng;

fn params(implicit: bool) -> SolverParams {
    SolverParams {
        h: 0.02,
        grid_dims: (48, 48, 48),
        mu0: 58333.0,
        lambda0: 38888.0,
        xi: 10.0,
        theta_c: 2.5e-2,
        theta_s: 7.5e-3,
        alpha: 0.95,
        beta: 0.5,
        implicit,
    }
}

fn build_solver(particle_count: usize, implicit: bool) -> Solver {
    let mut solver = Solver::new(params(implicit)).unwrap();
    let side = (particle_count as f64).cbrt().ceil() as i64;
    let spacing = 0.01;
    let mut rng = rand::thread_rng();
    let jitter = spacing * 0.1;
    'outer: for iz in 0..side {
        for iy in 0..side {
            for ix in 0..side {
                if solver.particle_count() >= particle_count {
                    break 'outer;
                }
                let pos = DVec3::new(0.4, 0.4, 0.4)
                    + DVec3::new(ix as f64, iy as f64, iz as f64) * spacing
                    + DVec3::new(
                        rng.gen_range(-jitter..jitter),
                        rng.gen_range(-jitter..jitter),
                        rng.gen_range(-jitter..jitter),
                    );
                let vel = DVec3::new(rng.gen_range(-0.1..0.1), rng.gen_range(-0.1..0.1), 0.0);
                solver.add_particle(pos, 1.0, vel).unwrap();
            }
        }
    }
    solver.update(1e-4, 0).unwrap();
    solver
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver_update");
    for &count in &[100usize, 1_000, 5_000] {
        for &implicit in &[false, true] {
            let label = if implicit { "implicit" } else { "explicit" };
            group.bench_with_input(
                BenchmarkId::new(label, count),
                &count,
                |b, &count| {
                    let mut solver = build_solver(count, implicit);
                    let mut tick = 1u64;
                    b.iter(|| {
                        solver.update(black_box(1e-4), tick).unwrap();
                        tick += 1;
                    });
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
