//! Level and hierarchy management.
//!
//! [`Hierarchy::build`] drives the coarsening engine and the interpolation
//! builder level by level, forming each coarse operator with the Galerkin
//! triple product `A_next = R * (A * P)`, until the configured minimum size
//! or level cap is reached. [`Hierarchy::solve`] then repeats full cycles
//! until the relative residual meets the tolerance or the iteration cap runs
//! out.
//!
//! A built hierarchy is reusable: repeated solves (and preconditioner
//! applications) mutate only the per-level scratch vectors, never the
//! operators.

use tracing::{debug, trace};

use crate::coarsen;
use crate::cycle;
use crate::error::{AmgError, ValidationError};
use crate::interp::{self, InterpOutcome, Interpolation};
use crate::kernels;
use crate::params::AmgParameters;
use crate::traits::Preconditioner;
use crate::types::{relative_residual, CfMark, CsrMatrix, ResidualSample, SolveStats};
use crate::validation;

/// One level of the multigrid hierarchy.
///
/// A level owns its operator, the transfer operators towards the next
/// coarser level (absent at the coarsest level), its right-hand side and
/// solution vectors, its CF marking, and scratch space. Levels never point
/// back at their parent; only the [`Hierarchy`] holds the ordered sequence.
#[derive(Debug)]
pub struct Level {
    /// Operator matrix at this level.
    pub a: CsrMatrix<f64>,
    /// Prolongation to this level from the next coarser one; `None` at the
    /// coarsest level.
    pub p: Option<CsrMatrix<f64>>,
    /// Restriction from this level to the next coarser one; `None` at the
    /// coarsest level.
    pub r: Option<CsrMatrix<f64>>,
    /// Right-hand side (the restricted residual below the finest level).
    pub b: Vec<f64>,
    /// Solution / correction vector.
    pub x: Vec<f64>,
    /// CF classification of this level's rows; empty at the coarsest level.
    pub cf: Vec<CfMark>,
    /// Row indices marked Coarse, in ascending order.
    pub c_rows: Vec<usize>,
    /// Row indices marked Fine, in ascending order.
    pub f_rows: Vec<usize>,
    /// Scratch vector used for residuals and prolongated corrections.
    pub work: Vec<f64>,
}

impl Level {
    fn new(a: CsrMatrix<f64>) -> Self {
        Self {
            a,
            p: None,
            r: None,
            b: Vec::new(),
            x: Vec::new(),
            cf: Vec::new(),
            c_rows: Vec::new(),
            f_rows: Vec::new(),
            work: Vec::new(),
        }
    }

    /// Number of rows of this level's operator.
    #[inline]
    pub fn rows(&self) -> usize {
        self.a.rows
    }

    fn set_cf(&mut self, cf: Vec<CfMark>) {
        self.c_rows = (0..cf.len()).filter(|&i| cf[i] == CfMark::Coarse).collect();
        self.f_rows = (0..cf.len()).filter(|&i| cf[i] == CfMark::Fine).collect();
        self.cf = cf;
    }

    /// Size the lazily-allocated vectors; zero-filled on first allocation.
    fn ensure_workspace(&mut self) {
        let n = self.a.rows;
        if self.b.len() != n {
            self.b = vec![0.0; n];
        }
        if self.x.len() != n {
            self.x = vec![0.0; n];
        }
        if self.work.len() != n {
            self.work = vec![0.0; n];
        }
    }
}

/// A built multigrid hierarchy: the ordered levels (index 0 finest), the
/// configuration they were built with, and the stats of the latest solve.
#[derive(Debug)]
pub struct Hierarchy {
    levels: Vec<Level>,
    params: AmgParameters,
    stats: SolveStats,
}

impl Hierarchy {
    /// Build the full hierarchy for `a`.
    ///
    /// # Errors
    ///
    /// - [`AmgError::InvalidInput`] on an invalid matrix or configuration.
    /// - [`AmgError::ZeroDiagonal`] when interpolation needs a vanished
    ///   diagonal.
    ///
    /// Degenerate coarsening (no coarse points, or no size reduction) is not
    /// an error; the hierarchy is truncated at that level.
    pub fn build(a: CsrMatrix<f64>, params: AmgParameters) -> Result<Self, AmgError> {
        params.validate()?;
        validation::validate_matrix(&a)?;
        if a.rows != a.cols {
            return Err(ValidationError::DimensionMismatch(format!(
                "multigrid requires a square operator but got {}x{}",
                a.rows, a.cols,
            ))
            .into());
        }

        let fine_rows = a.rows;
        let fine_nnz = a.nnz();
        let mut levels = vec![Level::new(a)];

        loop {
            let depth = levels.len();
            let n = levels[depth - 1].a.rows;
            if n <= params.min_coarse_size || depth >= params.max_levels {
                break;
            }

            let current = levels.last_mut().expect("hierarchy is never empty");
            let mut coarsening = coarsen::coarsen(&current.a, &params);
            if coarsening.n_coarse == 0 {
                debug!(level = depth - 1, "no coarse points selected; truncating hierarchy");
                break;
            }

            let interp = match build_interpolation(&current.a, &mut coarsening, &params)? {
                Some(interp) => interp,
                None => {
                    debug!(level = depth - 1, "coarsening made no progress; truncating hierarchy");
                    break;
                }
            };

            let ap = current.a.matmul(&interp.p)?;
            let a_next = interp.r.matmul(&ap)?;

            trace!(
                level = depth - 1,
                rows = n,
                coarse_rows = a_next.rows,
                p_nnz = interp.p.nnz(),
                "level coarsened",
            );

            current.p = Some(interp.p);
            current.r = Some(interp.r);
            current.set_cf(coarsening.cf);
            levels.push(Level::new(a_next));
        }

        let total_nnz: usize = levels.iter().map(|l| l.a.nnz()).sum();
        debug!(
            levels = levels.len(),
            fine_rows,
            coarsest_rows = levels.last().map(|l| l.a.rows).unwrap_or(0),
            operator_complexity = total_nnz as f64 / fine_nnz as f64,
            "hierarchy built",
        );

        Ok(Self {
            levels,
            params,
            stats: SolveStats::default(),
        })
    }

    /// Solve `A x = b` on the finest level, starting from the given `x`.
    ///
    /// Runs full cycles until the relative residual drops below the
    /// configured tolerance or `max_iterations` is reached. Non-convergence
    /// is reported through `converged: false` in the returned stats — the
    /// last iterate stays in `x` — never as an error.
    ///
    /// # Errors
    ///
    /// - [`AmgError::InvalidInput`] on shape or finiteness violations.
    /// - [`AmgError::ZeroDiagonal`] from a smoother,
    ///   [`AmgError::SingularCoarseSystem`] from the coarsest solve.
    /// - [`AmgError::NumericalInstability`] if the residual stops being
    ///   finite.
    pub fn solve(&mut self, b: &[f64], x: &mut [f64]) -> Result<SolveStats, AmgError> {
        let n = self.levels[0].a.rows;
        validation::validate_vector("b", b, n)?;
        validation::validate_vector("x", x, n)?;

        self.ensure_workspace();
        let b_norm = kernels::norm2(b);

        let mut stats = SolveStats::default();
        {
            let finest = &mut self.levels[0];
            finest.b.copy_from_slice(b);
            finest.x.copy_from_slice(x);

            let abs = finest.a.residual_norm(&finest.b, &finest.x, &mut finest.work);
            stats.abs_residual = abs;
            stats.rel_residual = relative_residual(abs, b_norm);
        }

        if stats.rel_residual < self.params.tolerance {
            stats.converged = true;
            self.stats = stats.clone();
            return Ok(stats);
        }

        for iteration in 1..=self.params.max_iterations {
            cycle::run_cycle(&mut self.levels, &self.params)?;

            let finest = &mut self.levels[0];
            let abs = finest.a.residual_norm(&finest.b, &finest.x, &mut finest.work);
            if !abs.is_finite() {
                return Err(AmgError::NumericalInstability {
                    iteration,
                    detail: format!("residual norm became {abs}"),
                });
            }
            let rel = relative_residual(abs, b_norm);

            stats.iterations = iteration;
            stats.abs_residual = abs;
            stats.rel_residual = rel;
            stats.history.push(ResidualSample {
                iteration,
                abs_residual: abs,
                rel_residual: rel,
            });
            trace!(iteration, abs, rel, "cycle complete");

            if rel < self.params.tolerance {
                stats.converged = true;
                break;
            }
        }

        x.copy_from_slice(&self.levels[0].x);
        debug!(
            iterations = stats.iterations,
            abs = stats.abs_residual,
            rel = stats.rel_residual,
            converged = stats.converged,
            "multigrid solve finished",
        );

        self.stats = stats.clone();
        Ok(stats)
    }

    /// Number of levels in use (finest included).
    #[inline]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// The ordered levels, finest first.
    #[inline]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// The configuration this hierarchy was built with.
    #[inline]
    pub fn params(&self) -> &AmgParameters {
        &self.params
    }

    /// Stats of the most recent solve.
    #[inline]
    pub fn stats(&self) -> &SolveStats {
        &self.stats
    }

    fn ensure_workspace(&mut self) {
        for level in &mut self.levels {
            level.ensure_workspace();
        }
    }
}

/// Run the interpolation builder, promoting isolated fine rows to coarse
/// until every fine row has a usable strong coarse connection (direct
/// injection for the promoted rows). Returns `None` when promotion drives
/// the coarse count to the full row count — coarsening then makes no
/// progress and the hierarchy is truncated instead.
fn build_interpolation(
    a: &CsrMatrix<f64>,
    coarsening: &mut coarsen::Coarsening,
    params: &AmgParameters,
) -> Result<Option<Interpolation>, AmgError> {
    loop {
        if coarsening.n_coarse >= a.rows {
            return Ok(None);
        }
        match interp::build(a, coarsening, params)? {
            InterpOutcome::Built(interp) => return Ok(Some(interp)),
            InterpOutcome::Isolated(rows) => {
                debug!(
                    count = rows.len(),
                    "promoting isolated fine rows to coarse (direct injection)",
                );
                for row in rows {
                    if coarsening.cf[row] == CfMark::Fine {
                        coarsening.cf[row] = CfMark::Coarse;
                        coarsening.n_coarse += 1;
                    }
                }
            }
        }
    }
}

impl Preconditioner for Hierarchy {
    /// One full multigrid cycle on `r` from a zero initial guess.
    fn apply(&mut self, r: &[f64], z: &mut [f64]) -> Result<(), AmgError> {
        let n = self.levels[0].a.rows;
        if r.len() != n || z.len() != n {
            return Err(ValidationError::DimensionMismatch(format!(
                "preconditioner: r has length {}, z has length {}, expected {}",
                r.len(),
                z.len(),
                n,
            ))
            .into());
        }

        self.ensure_workspace();
        let finest = &mut self.levels[0];
        finest.b.copy_from_slice(r);
        finest.x.fill(0.0);

        cycle::run_cycle(&mut self.levels, &self.params)?;

        z.copy_from_slice(&self.levels[0].x);
        Ok(())
    }
}
