//! Preconditioned conjugate gradient.
//!
//! Solves `Ax = b` for symmetric positive-definite `A`, optionally
//! preconditioned by any [`Preconditioner`] — in this crate typically a
//! [`Hierarchy`](crate::hierarchy::Hierarchy) applying one multigrid cycle
//! per iteration.
//!
//! # Algorithm
//!
//! Hestenes-Stiefel PCG:
//!
//! ```text
//! r = b - A*x
//! z = M^{-1} * r
//! p = z
//! rz = r . z
//!
//! for k in 0..max_iterations:
//!     Ap = A * p
//!     alpha = rz / (p . Ap)
//!     x  = x + alpha * p
//!     r  = r - alpha * Ap
//!     if converged: break
//!     z  = M^{-1} * r
//!     rz_new = r . z
//!     beta = rz_new / rz
//!     p  = z + beta * p
//!     rz = rz_new
//! ```
//!
//! # Stopping
//!
//! [`StopCriterion::TrueResidual`] compares `||r||` against `tol * ||b||`;
//! [`StopCriterion::PreconditionedResidual`] compares `sqrt(r.z)` against
//! `tol` times its initial value.
//!
//! # Non-convergence
//!
//! Exhausting `max_iterations` is not an error: the best iterate found is
//! left in `x` and the returned [`SolveStats`] carries `converged: false`.
//! Errors are reserved for invalid input and numerical breakdown (a
//! non-SPD system or preconditioner).

use tracing::{debug, trace, warn};

use crate::error::AmgError;
use crate::kernels::{axpy, dot, norm2};
use crate::params::{KrylovContext, StopCriterion};
use crate::traits::Preconditioner;
use crate::types::{relative_residual, CsrMatrix, ResidualSample, SolveStats};
use crate::validation;

/// Conjugate gradient solver, optionally preconditioned.
#[derive(Debug, Clone)]
pub struct PcgSolver {
    ctx: KrylovContext,
}

impl PcgSolver {
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
    /// - [`AmgError::NumericalInstability`] when `p.Ap <= 0` (system not
    ///   SPD), `r.z <= 0` (preconditioner not positive), or the residual
    ///   stops being finite.
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
        let b_norm = norm2(b);
        let denom_true = if b_norm > 0.0 { b_norm } else { 1.0 };

        let mut r = vec![0.0f64; n];
        let mut z = vec![0.0f64; n];
        let mut p = vec![0.0f64; n];
        let mut ap = vec![0.0f64; n];

        let mut abs = a.residual_norm(b, x, &mut r);
        apply_m(&mut precond, &r, &mut z)?;
        let mut rz = dot(&r, &z);

        // Denominator of the preconditioned criterion: the initial value of
        // sqrt(r.z).
        let denom_pre = if rz > 0.0 { rz.sqrt() } else { 1.0 };

        // The preconditioned criterion is relative to its own initial value,
        // so only the true-residual criterion can be met before iterating.
        let initially_converged = match self.ctx.stop {
            StopCriterion::TrueResidual => abs / denom_true < tol,
            StopCriterion::PreconditionedResidual => abs == 0.0,
        };
        if initially_converged {
            stats.abs_residual = abs;
            stats.rel_residual = relative_residual(abs, b_norm);
            stats.converged = true;
            return Ok(stats);
        }

        p.copy_from_slice(&z);

        let mut best_crit = f64::INFINITY;
        let mut best_abs = abs;
        let mut best_x = x.to_vec();

        debug!(
            n,
            nnz = a.nnz(),
            tol,
            max_iter = self.ctx.max_iterations,
            preconditioned = precond.is_some(),
            stop = ?self.ctx.stop,
            "pcg start",
        );

        for k in 1..=self.ctx.max_iterations {
            a.spmv(&p, &mut ap);
            let p_ap = dot(&p, &ap);
            if p_ap <= 0.0 {
                warn!(iteration = k, p_ap, "pcg breakdown: system not SPD");
                return Err(AmgError::NumericalInstability {
                    iteration: k,
                    detail: format!("p.Ap = {p_ap:.6e} <= 0; matrix may not be SPD"),
                });
            }

            let alpha = rz / p_ap;
            axpy(alpha, &p, x);
            axpy(-alpha, &ap, &mut r);

            abs = norm2(&r);
            if !abs.is_finite() {
                return Err(AmgError::NumericalInstability {
                    iteration: k,
                    detail: format!("residual norm became {abs}"),
                });
            }

            let (crit, rz_ready) = match self.ctx.stop {
                StopCriterion::TrueResidual => (abs / denom_true, None),
                StopCriterion::PreconditionedResidual => {
                    apply_m(&mut precond, &r, &mut z)?;
                    let rz_new = dot(&r, &z);
                    (rz_new.max(0.0).sqrt() / denom_pre, Some(rz_new))
                }
            };

            stats.iterations = k;
            stats.abs_residual = abs;
            stats.rel_residual = relative_residual(abs, b_norm);
            stats.history.push(ResidualSample {
                iteration: k,
                abs_residual: abs,
                rel_residual: crit,
            });
            trace!(iteration = k, abs, crit, "pcg iteration");

            if crit < best_crit {
                best_crit = crit;
                best_abs = abs;
                best_x.copy_from_slice(x);
            }

            if crit < tol {
                stats.converged = true;
                break;
            }

            let rz_new = match rz_ready {
                Some(v) => v,
                None => {
                    apply_m(&mut precond, &r, &mut z)?;
                    dot(&r, &z)
                }
            };
            if rz_new <= 0.0 {
                warn!(iteration = k, rz_new, "pcg breakdown: preconditioner not positive");
                return Err(AmgError::NumericalInstability {
                    iteration: k,
                    detail: format!("r.z = {rz_new:.6e} <= 0; preconditioner not positive"),
                });
            }

            let beta = rz_new / rz;
            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
            rz = rz_new;
        }

        if !stats.converged {
            x.copy_from_slice(&best_x);
            stats.abs_residual = best_abs;
            stats.rel_residual = relative_residual(best_abs, b_norm);
            debug!(
                iterations = stats.iterations,
                abs = stats.abs_residual,
                "pcg did not converge; returning best iterate",
            );
        } else {
            debug!(
                iterations = stats.iterations,
                abs = stats.abs_residual,
                rel = stats.rel_residual,
                "pcg converged",
            );
        }

        Ok(stats)
    }
}

/// Apply the preconditioner, or the identity when none is configured.
pub(crate) fn apply_m(
    precond: &mut Option<&mut dyn Preconditioner>,
    input: &[f64],
    out: &mut [f64],
) -> Result<(), AmgError> {
    match precond {
        Some(m) => m.apply(input, out),
        None => {
            out.copy_from_slice(input);
            Ok(())
        }
    }
}
