//! Shared test helpers for the integration test suite.
//!
//! Provides deterministic matrix generators (model Poisson problems plus
//! LCG-randomized diagonally dominant systems), an independent dense
//! reference solver, and floating-point comparison utilities.

#![allow(dead_code)]

use amgrid_solver::types::CsrMatrix;

// ---------------------------------------------------------------------------
// Random number generator (simple LCG for deterministic reproducibility)
// ---------------------------------------------------------------------------

/// A minimal linear congruential generator for deterministic test data.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Create a new LCG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next u64 value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Generate a uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform f64 in [lo, hi).
    pub fn next_f64_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

// ---------------------------------------------------------------------------
// Model problems
// ---------------------------------------------------------------------------

/// 1-D Poisson discretization with Dirichlet boundaries: the classic
/// `[-1, 2, -1]` stencil.
pub fn poisson_1d(n: usize) -> CsrMatrix<f64> {
    let mut entries = Vec::with_capacity(3 * n);
    for i in 0..n {
        if i > 0 {
            entries.push((i, i - 1, -1.0));
        }
        entries.push((i, i, 2.0));
        if i + 1 < n {
            entries.push((i, i + 1, -1.0));
        }
    }
    CsrMatrix::<f64>::from_coo(n, n, entries)
}

/// 2-D Poisson discretization on an `n x n` grid with Dirichlet boundaries:
/// the 5-point `[-1, -1, 4, -1, -1]` stencil.
pub fn poisson_2d(n: usize) -> CsrMatrix<f64> {
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

/// Random diagonally dominant CSR matrix of dimension `n`.
///
/// Each row gets roughly `density * n` off-diagonal entries; the diagonal is
/// `1 + sum of off-diagonal magnitudes` for strict dominance.
pub fn random_diag_dominant(n: usize, density: f64, seed: u64) -> CsrMatrix<f64> {
    let mut rng = Lcg::new(seed);
    let mut entries: Vec<(usize, usize, f64)> = Vec::new();

    for i in 0..n {
        let mut off_sum = 0.0f64;
        for j in 0..n {
            if i == j {
                continue;
            }
            if rng.next_f64() < density {
                let val = rng.next_f64_range(-1.0, 0.0);
                entries.push((i, j, val));
                off_sum += val.abs();
            }
        }
        if off_sum == 0.0 && n > 1 {
            let j = (i + 1) % n;
            let val = -rng.next_f64_range(0.1, 0.5);
            entries.push((i, j, val));
            off_sum = val.abs();
        }
        entries.push((i, i, off_sum + 1.0 + rng.next_f64()));
    }

    CsrMatrix::<f64>::from_coo(n, n, entries)
}

/// Deterministic random vector of length `n`.
pub fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n).map(|_| rng.next_f64_range(-1.0, 1.0)).collect()
}

// ---------------------------------------------------------------------------
// Dense reference solver
// ---------------------------------------------------------------------------

/// Solve `Ax = b` by dense Gaussian elimination with partial pivoting.
///
/// An O(n^3) reference implementation, independent of the library's own
/// coarsest-level solver, used to verify iterative results on small
/// problems.
///
/// # Panics
///
/// Panics on singular matrices or inconsistent dimensions.
pub fn dense_reference_solve(matrix: &CsrMatrix<f64>, rhs: &[f64]) -> Vec<f64> {
    let n = matrix.rows;
    assert_eq!(n, matrix.cols, "reference solve requires a square matrix");
    assert_eq!(rhs.len(), n, "rhs length must match matrix dimension");

    let mut aug = vec![vec![0.0f64; n + 1]; n];
    for i in 0..n {
        aug[i][n] = rhs[i];
        for (j, &v) in matrix.row_entries(i) {
            aug[i][j] = v;
        }
    }

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in (col + 1)..n {
            if aug[row][col].abs() > max_val {
                max_val = aug[row][col].abs();
                max_row = row;
            }
        }
        assert!(max_val > 1e-15, "matrix is singular or near-singular");
        aug.swap(col, max_row);

        let pivot = aug[col][col];
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot;
            for j in col..=n {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }

    x
}

/// Dense reference matrix-vector product.
pub fn dense_reference_spmv(matrix: &CsrMatrix<f64>, x: &[f64]) -> Vec<f64> {
    let mut dense = vec![vec![0.0f64; matrix.cols]; matrix.rows];
    for row in 0..matrix.rows {
        for (col, &v) in matrix.row_entries(row) {
            dense[row][col] += v;
        }
    }
    dense
        .iter()
        .map(|r| r.iter().zip(x.iter()).map(|(&a, &b)| a * b).sum())
        .collect()
}

// ---------------------------------------------------------------------------
// Floating-point comparison utilities
// ---------------------------------------------------------------------------

/// L2 norm of a vector.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Residual `b - A*x`.
pub fn compute_residual(matrix: &CsrMatrix<f64>, x: &[f64], rhs: &[f64]) -> Vec<f64> {
    let n = matrix.rows;
    let mut ax = vec![0.0f64; n];
    matrix.spmv(x, &mut ax);
    (0..n).map(|i| rhs[i] - ax[i]).collect()
}

/// Relative error `||approx - exact|| / ||exact||` (absolute when the exact
/// norm vanishes).
pub fn relative_error(approx: &[f64], exact: &[f64]) -> f64 {
    assert_eq!(approx.len(), exact.len());
    let exact_norm = l2_norm(exact);
    let error = approx
        .iter()
        .zip(exact.iter())
        .map(|(&a, &e)| (a - e) * (a - e))
        .sum::<f64>()
        .sqrt();
    if exact_norm > 1e-15 {
        error / exact_norm
    } else {
        error
    }
}
