//! Benchmarks for the solve phase.
//!
//! Compares V- and W-cycles, smoother variants, and the multigrid cycle as
//! a PCG preconditioner against plain PCG, on 2-D Poisson systems with
//! randomized right-hand sides.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use amgrid_solver::hierarchy::Hierarchy;
use amgrid_solver::params::{AmgParameters, KrylovContext, SmootherKind};
use amgrid_solver::pcg::PcgSolver;
use amgrid_solver::types::CsrMatrix;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// 2-D Poisson 5-point stencil on an `n x n` grid.
fn poisson_2d(n: usize) -> CsrMatrix<f64> {
    let idx = |r: usize, c: usize| r * n + c;
    let mut entries = Vec::with_capacity(5 * n * n);
    for r in 0..n {
        for c in 0..n {
            let i = idx(r, c);
            entries.push((i, i, 4.0));
            if r > 0 {
                entries.push((i, idx(r - 1, c), -1.0));
            }
            if r + 1 < n {
                entries.push((i, idx(r + 1, c), -1.0));
            }
            if c > 0 {
                entries.push((i, idx(r, c - 1), -1.0));
            }
            if c + 1 < n {
                entries.push((i, idx(r, c + 1), -1.0));
            }
        }
    }
    CsrMatrix::<f64>::from_coo(n * n, n * n, entries)
}

/// Random right-hand side with a deterministic seed.
fn random_rhs(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn solve_params(smoother: SmootherKind, cycle_degree: usize) -> AmgParameters {
    let mut p = AmgParameters::default();
    p.smoother = smoother;
    p.cycle_degree = cycle_degree;
    p.min_coarse_size = 50;
    p.tolerance = 1e-8;
    p
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_vcycle_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("amg_solve_vcycle");
    group.sample_size(20);

    for grid in [16usize, 32, 64] {
        let n = grid * grid;
        let a = poisson_2d(grid);
        let b = random_rhs(n, 42);
        group.throughput(Throughput::Elements(a.nnz() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &(a, b), |bench, (a, b)| {
            let mut h =
                Hierarchy::build(a.clone(), solve_params(SmootherKind::GaussSeidel, 1)).unwrap();
            bench.iter(|| {
                let mut x = vec![0.0; b.len()];
                h.solve(b, &mut x).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_cycle_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("amg_cycle_shape");
    group.sample_size(20);

    let grid = 48;
    let a = poisson_2d(grid);
    let b = random_rhs(grid * grid, 7);

    for (name, degree) in [("v_cycle", 1usize), ("w_cycle", 2)] {
        group.bench_function(name, |bench| {
            let mut h =
                Hierarchy::build(a.clone(), solve_params(SmootherKind::GaussSeidel, degree))
                    .unwrap();
            bench.iter(|| {
                let mut x = vec![0.0; b.len()];
                h.solve(&b, &mut x).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_smoother_variants(c: &mut Criterion) {
    let mut group = c.benchmark_group("amg_smoother");
    group.sample_size(20);

    let grid = 32;
    let a = poisson_2d(grid);
    let b = random_rhs(grid * grid, 11);

    for smoother in [
        SmootherKind::GaussSeidel,
        SmootherKind::SymGaussSeidel,
        SmootherKind::L1Jacobi,
        SmootherKind::Polynomial,
    ] {
        let mut params = solve_params(smoother, 1);
        if smoother == SmootherKind::L1Jacobi {
            params.relax = 0.7;
        }
        group.bench_function(smoother.to_string(), |bench| {
            let mut h = Hierarchy::build(a.clone(), params.clone()).unwrap();
            bench.iter(|| {
                let mut x = vec![0.0; b.len()];
                h.solve(&b, &mut x).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_pcg_preconditioning(c: &mut Criterion) {
    let mut group = c.benchmark_group("pcg_preconditioning");
    group.sample_size(10);

    let grid = 32;
    let n = grid * grid;
    let a = poisson_2d(grid);
    let b = random_rhs(n, 23);
    let ctx = KrylovContext {
        tolerance: 1e-8,
        max_iterations: 5000,
        ..KrylovContext::default()
    };
    let solver = PcgSolver::new(ctx);

    group.bench_function("plain", |bench| {
        bench.iter(|| {
            let mut x = vec![0.0; n];
            solver.solve(&a, &b, &mut x, None).unwrap()
        });
    });

    group.bench_function("amg_vcycle", |bench| {
        let mut h =
            Hierarchy::build(a.clone(), solve_params(SmootherKind::SymGaussSeidel, 1)).unwrap();
        bench.iter(|| {
            let mut x = vec![0.0; n];
            solver.solve(&a, &b, &mut x, Some(&mut h)).unwrap()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_vcycle_scaling,
    bench_cycle_shapes,
    bench_smoother_variants,
    bench_pcg_preconditioning,
);
criterion_main!(benches);
