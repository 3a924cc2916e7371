//! Coarsest-level solve.
//!
//! Small systems get dense Gaussian elimination with partial pivoting; above
//! [`DIRECT_SOLVE_LIMIT`] rows the level is instead relaxed with symmetric
//! Gauss-Seidel sweeps until the coarse tolerance is met or the sweep cap
//! runs out. The observable contract is only that `x` approximately solves
//! the coarsest `(A, b)` to `coarse_tolerance` when feasible.

use tracing::trace;

use crate::error::{AmgError, ValidationError};
use crate::hierarchy::Level;
use crate::kernels;
use crate::params::{AmgParameters, SmootherKind};
use crate::smoother::{self, SmootherTask};
use crate::types::CsrMatrix;

/// Largest dimension handled by the dense direct solve.
pub(crate) const DIRECT_SOLVE_LIMIT: usize = 256;

/// Sweep cap of the iterative fallback.
const MAX_COARSE_SWEEPS: usize = 200;

/// Solve the coarsest level in place.
pub(crate) fn solve_coarsest(level: &mut Level, params: &AmgParameters) -> Result<(), AmgError> {
    let n = level.a.rows;
    if n == 0 {
        return Ok(());
    }

    if n <= DIRECT_SOLVE_LIMIT {
        let solution = dense_solve(&level.a, &level.b)?;
        level.x.copy_from_slice(&solution);
        return Ok(());
    }

    // Iterative fallback. The incoming x is kept as the starting guess: on
    // repeated W-cycle visits it already holds the previous correction.
    let b_norm = kernels::norm2(&level.b);
    let target = params.coarse_tolerance * if b_norm > 0.0 { b_norm } else { 1.0 };

    let task = SmootherTask::full(SmootherKind::SymGaussSeidel, 1.0, 1, n);
    for sweep in 0..MAX_COARSE_SWEEPS {
        smoother::apply(&level.a, &level.b, &mut level.x, &task)?;
        let abs = level.a.residual_norm(&level.b, &level.x, &mut level.work);
        if abs <= target {
            trace!(sweep, abs, "coarsest level relaxed to tolerance");
            return Ok(());
        }
    }

    trace!(
        sweeps = MAX_COARSE_SWEEPS,
        "coarsest level sweep cap reached before tolerance",
    );
    Ok(())
}

/// Solve `A x = b` by dense Gaussian elimination with partial pivoting.
///
/// Intended for the small systems at the bottom of a hierarchy; cost is
/// O(n^3) with O(n^2) scratch.
///
/// # Errors
///
/// - [`AmgError::InvalidInput`] if `A` is not square or `b` has the wrong
///   length.
/// - [`AmgError::SingularCoarseSystem`] on a zero pivot.
pub fn dense_solve(a: &CsrMatrix<f64>, b: &[f64]) -> Result<Vec<f64>, AmgError> {
    let n = a.rows;
    if a.cols != n {
        return Err(ValidationError::DimensionMismatch(format!(
            "dense solve requires a square matrix but got {}x{}",
            a.rows, a.cols,
        ))
        .into());
    }
    if b.len() != n {
        return Err(ValidationError::DimensionMismatch(format!(
            "dense solve: b has length {}, expected {}",
            b.len(),
            n,
        ))
        .into());
    }

    // Augmented matrix [A | b] in row-major scratch.
    let mut aug = vec![vec![0.0f64; n + 1]; n];
    for i in 0..n {
        aug[i][n] = b[i];
        for (j, &v) in a.row_entries(i) {
            aug[i][j] = v;
        }
    }

    // Forward elimination with partial pivoting.
    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in (col + 1)..n {
            if aug[row][col].abs() > max_val {
                max_val = aug[row][col].abs();
                max_row = row;
            }
        }
        if max_val < f64::MIN_POSITIVE {
            return Err(AmgError::SingularCoarseSystem { column: col });
        }
        aug.swap(col, max_row);

        let pivot = aug[col][col];
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..=n {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }

    // Back substitution.
    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }

    Ok(x)
}
