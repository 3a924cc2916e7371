//! Solver configuration.
//!
//! All knobs of the multigrid engine live in [`AmgParameters`]; the Krylov
//! accelerators take a separate, smaller [`KrylovContext`]. Both are plain
//! values passed into entry points — never ambient global state — so several
//! hierarchies with different configurations can coexist in one process.
//!
//! Out-of-range values are a configuration error reported by `validate()`;
//! nothing is silently clamped.

use crate::error::ValidationError;
use crate::validation::MAX_ITERATIONS;

/// Coarsening variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CoarsenKind {
    /// Classical Ruge-Stueben: only negative off-diagonals qualify as
    /// strong connections.
    Classical,
    /// Classical selection with positive off-diagonals also qualifying.
    ClassicalPositive,
}

/// Interpolation variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InterpKind {
    /// Direct interpolation from strong coarse neighbours only.
    Direct,
    /// Standard interpolation: one level of strong fine-fine elimination
    /// before the weight split. Denser but more accurate rows.
    Standard,
}

/// Relaxation scheme applied by the smoother engine.
///
/// The set is closed and exhaustive; dispatch is a `match`, not open-ended
/// polymorphism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SmootherKind {
    /// Damped Jacobi: synchronous update from the previous full iterate.
    Jacobi,
    /// Gauss-Seidel: in-place update using already-updated earlier rows.
    GaussSeidel,
    /// Symmetric Gauss-Seidel: one forward then one backward pass per sweep.
    SymGaussSeidel,
    /// Successive over-relaxation (Gauss-Seidel scaled by `relax`).
    Sor,
    /// Symmetric SOR.
    Ssor,
    /// Gauss-Seidel over the first CF group, then SOR over the second.
    Gsor,
    /// Symmetric variant of [`SmootherKind::Gsor`].
    Sgsor,
    /// Chebyshev polynomial in A of degree `poly_degree`; needs no ordering.
    Polynomial,
    /// Jacobi with the L1 row absolute-sum in place of the diagonal; robust
    /// on rows that are not diagonally dominant.
    L1Jacobi,
}

impl std::fmt::Display for SmootherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmootherKind::Jacobi => write!(f, "jacobi"),
            SmootherKind::GaussSeidel => write!(f, "gauss-seidel"),
            SmootherKind::SymGaussSeidel => write!(f, "sym-gauss-seidel"),
            SmootherKind::Sor => write!(f, "sor"),
            SmootherKind::Ssor => write!(f, "ssor"),
            SmootherKind::Gsor => write!(f, "gsor"),
            SmootherKind::Sgsor => write!(f, "sgsor"),
            SmootherKind::Polynomial => write!(f, "polynomial"),
            SmootherKind::L1Jacobi => write!(f, "l1-jacobi"),
        }
    }
}

/// Row ordering for relaxation sweeps relative to the CF splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CfOrder {
    /// Natural row order.
    Natural,
    /// Coarse rows first, then fine rows.
    CoarseFirst,
    /// Fine rows first, then coarse rows.
    FineFirst,
}

/// Configuration for the multigrid engine.
///
/// Construct via `AmgParameters::default()` and adjust fields; call
/// [`validate`](AmgParameters::validate) (done automatically by
/// `Hierarchy::build`) before use.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AmgParameters {
    /// Recursion multiplicity per level: 1 is a V-cycle, 2 or more gives
    /// W-style cycles. Must be >= 1.
    pub cycle_degree: usize,
    /// Relative-residual stopping tolerance of the outer AMG iteration.
    /// Must lie in (0, 1).
    pub tolerance: f64,
    /// Relative-residual tolerance of the coarsest-level solve. Must lie in
    /// (0, 1).
    pub coarse_tolerance: f64,
    /// Maximum number of outer AMG cycles. In [1, 1e6].
    pub max_iterations: usize,
    /// Maximum hierarchy depth, finest level included. Must be >= 1.
    pub max_levels: usize,
    /// Coarsening stops once a level has at most this many rows. Must be
    /// >= 1.
    pub min_coarse_size: usize,
    /// Coarsening variant.
    pub coarsening: CoarsenKind,
    /// Interpolation variant.
    pub interpolation: InterpKind,
    /// Smoother used for pre- and post-smoothing.
    pub smoother: SmootherKind,
    /// Relaxation factor for the SOR family and damped Jacobi. Must lie in
    /// (0, 2).
    pub relax: f64,
    /// Sweep ordering relative to the CF splitting.
    pub cf_order: CfOrder,
    /// Pre-smoothing sweeps per cycle.
    pub pre_sweeps: usize,
    /// Post-smoothing sweeps per cycle.
    pub post_sweeps: usize,
    /// Degree of the polynomial smoother. Must be >= 1.
    pub poly_degree: usize,
    /// Strength-of-connection threshold theta. Must lie in (0, 1).
    pub strength_threshold: f64,
    /// Near-diagonal row cutoff: a row whose off-diagonal absolute sum is at
    /// most `(1 - max_row_sum) * |diag|` is treated as having no strong
    /// connections. Must lie in (0, 1].
    pub max_row_sum: f64,
    /// Interpolation truncation threshold tau: entries below
    /// `tau * max |w|` per row are dropped and the rest rescaled. Must lie
    /// in [0, 1).
    pub trunc_threshold: f64,
}

impl Default for AmgParameters {
    fn default() -> Self {
        Self {
            cycle_degree: 1,
            tolerance: 1e-8,
            coarse_tolerance: 1e-10,
            max_iterations: 100,
            max_levels: 20,
            min_coarse_size: 50,
            coarsening: CoarsenKind::Classical,
            interpolation: InterpKind::Direct,
            smoother: SmootherKind::GaussSeidel,
            relax: 1.0,
            cf_order: CfOrder::Natural,
            pre_sweeps: 1,
            post_sweeps: 1,
            poly_degree: 3,
            strength_threshold: 0.25,
            max_row_sum: 0.9,
            trunc_threshold: 0.2,
        }
    }
}

impl AmgParameters {
    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        range(
            "cycle_degree",
            self.cycle_degree >= 1,
            self.cycle_degree,
            ">= 1",
        )?;
        unit_open("tolerance", self.tolerance)?;
        unit_open("coarse_tolerance", self.coarse_tolerance)?;
        range(
            "max_iterations",
            (1..=MAX_ITERATIONS).contains(&self.max_iterations),
            self.max_iterations,
            "[1, 1e6]",
        )?;
        range("max_levels", self.max_levels >= 1, self.max_levels, ">= 1")?;
        range(
            "min_coarse_size",
            self.min_coarse_size >= 1,
            self.min_coarse_size,
            ">= 1",
        )?;
        if !self.relax.is_finite() || self.relax <= 0.0 || self.relax >= 2.0 {
            return Err(out_of_range("relax", self.relax, "(0, 2)"));
        }
        unit_open("strength_threshold", self.strength_threshold)?;
        if !self.max_row_sum.is_finite() || self.max_row_sum <= 0.0 || self.max_row_sum > 1.0 {
            return Err(out_of_range("max_row_sum", self.max_row_sum, "(0, 1]"));
        }
        if !self.trunc_threshold.is_finite()
            || self.trunc_threshold < 0.0
            || self.trunc_threshold >= 1.0
        {
            return Err(out_of_range("trunc_threshold", self.trunc_threshold, "[0, 1)"));
        }
        range(
            "poly_degree",
            self.poly_degree >= 1,
            self.poly_degree,
            ">= 1",
        )?;
        Ok(())
    }
}

/// Stopping-criterion selector for the Krylov accelerators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StopCriterion {
    /// `||b - A x|| < tol * ||b||`.
    TrueResidual,
    /// Preconditioned residual norm relative to its initial value.
    PreconditionedResidual,
}

/// Configuration for the Krylov accelerators.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KrylovContext {
    /// Relative stopping tolerance. Must lie in (0, 1).
    pub tolerance: f64,
    /// Restart length for GMRES; ignored by PCG. Must be >= 1.
    pub restart: usize,
    /// Maximum Krylov iterations (matrix-vector products). In [1, 1e6].
    pub max_iterations: usize,
    /// Stopping-criterion selector.
    pub stop: StopCriterion,
}

impl Default for KrylovContext {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            restart: 30,
            max_iterations: 1000,
            stop: StopCriterion::TrueResidual,
        }
    }
}

impl KrylovContext {
    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        unit_open("tolerance", self.tolerance)?;
        range("restart", self.restart >= 1, self.restart, ">= 1")?;
        range(
            "max_iterations",
            (1..=MAX_ITERATIONS).contains(&self.max_iterations),
            self.max_iterations,
            "[1, 1e6]",
        )?;
        Ok(())
    }
}

fn out_of_range(name: &str, value: impl std::fmt::Display, expected: &str) -> ValidationError {
    ValidationError::ParameterOutOfRange {
        name: name.into(),
        value: value.to_string(),
        expected: expected.into(),
    }
}

fn range(
    name: &str,
    ok: bool,
    value: impl std::fmt::Display,
    expected: &str,
) -> Result<(), ValidationError> {
    if ok {
        Ok(())
    } else {
        Err(out_of_range(name, value, expected))
    }
}

fn unit_open(name: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(out_of_range(name, value, "(0, 1)"))
    }
}
