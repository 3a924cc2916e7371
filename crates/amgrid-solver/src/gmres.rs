//! Restarted GMRES.
//!
//! Left-preconditioned GMRES(m) for general (nonsymmetric) systems: Arnoldi
//! with modified Gram-Schmidt builds an orthonormal basis of the Krylov
//! space of `M^{-1} A`, Givens rotations keep the least-squares problem in
//! upper-triangular form, and the basis is rebuilt every `restart` steps.
//!
//! The rotation machinery maintains a running estimate of the
//! *preconditioned* residual norm for free; the inner loop uses it for
//! cheap stopping control, and the authoritative check against the selected
//! [`StopCriterion`] happens on the recomputed residual at every restart
//! boundary.
//!
//! Like the PCG solver, an exhausted iteration budget is a status, not an
//! error: the best iterate seen at a restart boundary is left in `x` and
//! `converged: false` is reported.

use tracing::{debug, trace};

use crate::error::AmgError;
use crate::kernels::{axpy, dot, norm2, scale};
use crate::params::{KrylovContext, StopCriterion};
use crate::pcg::apply_m;
use crate::traits::Preconditioner;
use crate::types::{relative_residual, CsrMatrix, ResidualSample, SolveStats};
use crate::validation;

/// Breakdown threshold for the Arnoldi normalization.
const HAPPY_BREAKDOWN: f64 = 1e-300;

/// Restarted GMRES solver, optionally left-preconditioned.
#[derive(Debug, Clone)]
pub struct GmresSolver {
    ctx: KrylovContext,
}

impl GmresSolver {
    /// Create a solver with the given context. The context is validated at
    /// solve time.
    pub fn new(ctx: KrylovContext) -> Self {
        Self { ctx }
    }

    /// The configured context.
    #[inline]
    pub fn context(&self) -> &KrylovContext {
        &self.ctx
    }

    /// Solve `A x = b`, starting from the given `x`.
    ///
    /// # Errors
    ///
    /// - [`AmgError::InvalidInput`] on bad shapes or configuration.
    /// - [`AmgError::NumericalInstability`] when the residual stops being
    ///   finite.
    /// - Any error surfaced by the preconditioner itself.
    pub fn solve(
        &self,
        a: &CsrMatrix<f64>,
        b: &[f64],
        x: &mut [f64],
        mut precond: Option<&mut dyn Preconditioner>,
    ) -> Result<SolveStats, AmgError> {
        self.ctx.validate()?;
        validation::validate_system(a, b, x)?;

        let n = a.rows;
        let mut stats = SolveStats::default();
        if n == 0 {
            stats.converged = true;
            return Ok(stats);
        }

        let tol = self.ctx.tolerance;
        let m = self.ctx.restart.min(n);

        let b_norm = norm2(b);
        let denom_true = if b_norm > 0.0 { b_norm } else { 1.0 };

        // Denominator of the preconditioned criterion and of the inner
        // rotation estimate: ||M^{-1} b||.
        let mut scratch = vec![0.0f64; n];
        apply_m(&mut precond, b, &mut scratch)?;
        let mb_norm = norm2(&scratch);
        let denom_pre = if mb_norm > 0.0 { mb_norm } else { 1.0 };

        let mut r = vec![0.0f64; n];
        let mut z = vec![0.0f64; n];

        let mut best_crit = f64::INFINITY;
        let mut best_abs = f64::INFINITY;
        let mut best_x = x.to_vec();

        debug!(
            n,
            nnz = a.nnz(),
            tol,
            restart = m,
            max_iter = self.ctx.max_iterations,
            preconditioned = precond.is_some(),
            stop = ?self.ctx.stop,
            "gmres start",
        );

        loop {
            // ---- Restart boundary: authoritative residual check ----
            let abs = a.residual_norm(b, x, &mut r);
            if !abs.is_finite() {
                return Err(AmgError::NumericalInstability {
                    iteration: stats.iterations,
                    detail: format!("residual norm became {abs}"),
                });
            }
            apply_m(&mut precond, &r, &mut z)?;
            let beta = norm2(&z);

            let crit = match self.ctx.stop {
                StopCriterion::TrueResidual => abs / denom_true,
                StopCriterion::PreconditionedResidual => beta / denom_pre,
            };
            stats.abs_residual = abs;
            stats.rel_residual = relative_residual(abs, b_norm);

            if crit < best_crit {
                best_crit = crit;
                best_abs = abs;
                best_x.copy_from_slice(x);
            }
            if crit < tol {
                stats.converged = true;
                break;
            }
            if stats.iterations >= self.ctx.max_iterations || beta < HAPPY_BREAKDOWN {
                break;
            }

            // ---- Arnoldi process ----
            let mut basis: Vec<Vec<f64>> = Vec::with_capacity(m + 1);
            let mut v0 = z.clone();
            scale(1.0 / beta, &mut v0);
            basis.push(v0);

            // Hessenberg columns after rotation, plus the rotation pairs and
            // the rotated rhs of the least-squares problem.
            let mut h_cols: Vec<Vec<f64>> = Vec::with_capacity(m);
            let mut rotations: Vec<(f64, f64)> = Vec::with_capacity(m);
            let mut g = vec![0.0f64; m + 1];
            g[0] = beta;

            let mut steps = 0usize;
            while steps < m && stats.iterations < self.ctx.max_iterations {
                let j = steps;
                stats.iterations += 1;

                // w = M^{-1} A v_j
                a.spmv(&basis[j], &mut scratch);
                let mut w = vec![0.0f64; n];
                apply_m(&mut precond, &scratch, &mut w)?;

                // Modified Gram-Schmidt.
                let mut h = vec![0.0f64; j + 2];
                for (i, v) in basis.iter().enumerate().take(j + 1) {
                    h[i] = dot(&w, v);
                    axpy(-h[i], v, &mut w);
                }
                let w_norm = norm2(&w);
                h[j + 1] = w_norm;

                // Apply the accumulated rotations, then zero the subdiagonal
                // with a fresh one.
                for (i, &(c, s)) in rotations.iter().enumerate() {
                    let hi = h[i];
                    let hj = h[i + 1];
                    h[i] = c * hi + s * hj;
                    h[i + 1] = -s * hi + c * hj;
                }
                let (c, s) = givens(h[j], h[j + 1]);
                h[j] = c * h[j] + s * h[j + 1];
                h[j + 1] = 0.0;
                rotations.push((c, s));

                let g_j = g[j];
                g[j] = c * g_j;
                g[j + 1] = -s * g_j;

                h_cols.push(h);
                steps += 1;

                // |g[j+1]| is the preconditioned residual estimate.
                let estimate = g[j + 1].abs();
                stats.history.push(ResidualSample {
                    iteration: stats.iterations,
                    abs_residual: estimate,
                    rel_residual: estimate / denom_pre,
                });
                trace!(
                    iteration = stats.iterations,
                    estimate,
                    "gmres inner step",
                );

                if w_norm < HAPPY_BREAKDOWN {
                    break;
                }
                if estimate / denom_pre < tol {
                    break;
                }

                let mut v_next = w;
                scale(1.0 / w_norm, &mut v_next);
                basis.push(v_next);
            }

            // ---- Solve the triangular system and update x ----
            let mut y = vec![0.0f64; steps];
            for row in (0..steps).rev() {
                let mut sum = g[row];
                for col in (row + 1)..steps {
                    sum -= h_cols[col][row] * y[col];
                }
                y[row] = sum / h_cols[row][row];
            }
            for (col, &yc) in y.iter().enumerate() {
                axpy(yc, &basis[col], x);
            }

            if steps == 0 {
                // Budget exhausted before any progress this cycle.
                break;
            }
        }

        if !stats.converged {
            x.copy_from_slice(&best_x);
            stats.abs_residual = best_abs;
            stats.rel_residual = relative_residual(best_abs, b_norm);
            debug!(
                iterations = stats.iterations,
                abs = stats.abs_residual,
                "gmres did not converge; returning best iterate",
            );
        } else {
            debug!(
                iterations = stats.iterations,
                abs = stats.abs_residual,
                rel = stats.rel_residual,
                "gmres converged",
            );
        }

        Ok(stats)
    }
}

/// Compute a Givens rotation `(c, s)` such that
/// `[c s; -s c] * [a; b] = [r; 0]`.
fn givens(a: f64, b: f64) -> (f64, f64) {
    let r = (a * a + b * b).sqrt();
    if r < HAPPY_BREAKDOWN {
        (1.0, 0.0)
    } else {
        (a / r, b / r)
    }
}
