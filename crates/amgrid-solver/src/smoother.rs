//! In-place relaxation schemes.
//!
//! A [`SmootherTask`] bundles everything one smoothing call needs besides
//! the `(A, b, x)` triple itself: the scheme, the relaxation factor, the
//! sweep count, the iteration range (forward, backward, or strided), the
//! polynomial degree, and the row ordering. Tasks are transient descriptors;
//! nothing here is persisted between calls.
//!
//! The variant set is closed and dispatched with a `match` — see
//! [`SmootherKind`] for the nine schemes. Every scheme that divides by a
//! diagonal (or L1 row sum) reports an exact zero as
//! [`AmgError::ZeroDiagonal`]; rows are never silently skipped.

use crate::error::{AmgError, ValidationError};
use crate::kernels;
use crate::params::SmootherKind;
use crate::types::CsrMatrix;
use crate::validation::validate_permutation;

// ---------------------------------------------------------------------------
// Sweep geometry
// ---------------------------------------------------------------------------

/// Half-open iteration range `[start, end)` with a non-zero step.
///
/// `step < 0` walks backwards, e.g. `start = n-1, end = -1, step = -1`
/// visits every row in reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SweepSpan {
    /// First index visited.
    pub start: isize,
    /// Exclusive bound.
    pub end: isize,
    /// Stride; must be non-zero.
    pub step: isize,
}

impl SweepSpan {
    /// The full forward range over `n` rows.
    pub fn forward(n: usize) -> Self {
        Self {
            start: 0,
            end: n as isize,
            step: 1,
        }
    }

    /// The full backward range over `n` rows.
    pub fn backward(n: usize) -> Self {
        Self {
            start: n as isize - 1,
            end: -1,
            step: -1,
        }
    }

    /// Check the span against the row count `n`.
    pub fn validate(&self, n: usize) -> Result<(), ValidationError> {
        if self.step == 0 {
            return Err(ValidationError::ParameterOutOfRange {
                name: "span.step".into(),
                value: "0".into(),
                expected: "non-zero".into(),
            });
        }
        let within = |i: isize| i >= 0 && i < n as isize;
        let mut i = self.start;
        while (self.step > 0 && i < self.end) || (self.step < 0 && i > self.end) {
            if !within(i) {
                return Err(ValidationError::ParameterOutOfRange {
                    name: "span".into(),
                    value: format!("index {i}"),
                    expected: format!("[0, {n})"),
                });
            }
            i += self.step;
        }
        Ok(())
    }

    /// Materialize the visited row indices, in visit order.
    pub fn indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut i = self.start;
        while (self.step > 0 && i < self.end) || (self.step < 0 && i > self.end) {
            out.push(i as usize);
            i += self.step;
        }
        out
    }
}

/// Row ordering for a smoothing call.
#[derive(Debug, Clone, Copy)]
pub enum SweepOrder<'a> {
    /// Visit rows in span order.
    Natural,
    /// Explicit permutation of `[0, n)`, overriding the span order.
    Permuted(&'a [usize]),
    /// Two index groups visited in sequence (CF-grouped smoothing: coarse
    /// rows then fine rows, or the reverse — the caller decides).
    Grouped {
        /// Rows relaxed first (plain Gauss-Seidel for GSOR/SGSOR).
        first: &'a [usize],
        /// Rows relaxed second (SOR-weighted for GSOR/SGSOR).
        second: &'a [usize],
    },
}

/// Transient descriptor for one smoothing call.
#[derive(Debug, Clone, Copy)]
pub struct SmootherTask<'a> {
    /// Relaxation scheme.
    pub kind: SmootherKind,
    /// Relaxation factor for the SOR family and damped Jacobi.
    pub relax: f64,
    /// Number of sweeps.
    pub sweeps: usize,
    /// Iteration range.
    pub span: SweepSpan,
    /// Degree of the polynomial smoother.
    pub poly_degree: usize,
    /// Row ordering.
    pub order: SweepOrder<'a>,
}

impl<'a> SmootherTask<'a> {
    /// A full-range, naturally-ordered task.
    pub fn full(kind: SmootherKind, relax: f64, sweeps: usize, n: usize) -> Self {
        Self {
            kind,
            relax,
            sweeps,
            span: SweepSpan::forward(n),
            poly_degree: 3,
            order: SweepOrder::Natural,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Apply `task.sweeps` relaxation sweeps to `x` in place.
///
/// # Errors
///
/// - [`AmgError::InvalidInput`] on shape mismatch, an invalid span, or an
///   ordering that is not a permutation.
/// - [`AmgError::ZeroDiagonal`] when a required diagonal (or L1 row sum) is
///   exactly zero.
pub fn apply(
    a: &CsrMatrix<f64>,
    b: &[f64],
    x: &mut [f64],
    task: &SmootherTask<'_>,
) -> Result<(), AmgError> {
    let n = a.rows;
    if a.rows != a.cols {
        return Err(ValidationError::DimensionMismatch(format!(
            "smoother requires a square matrix but got {}x{}",
            a.rows, a.cols,
        ))
        .into());
    }
    if b.len() != n || x.len() != n {
        return Err(ValidationError::DimensionMismatch(format!(
            "smoother: b has length {}, x has length {}, expected {}",
            b.len(),
            x.len(),
            n,
        ))
        .into());
    }
    task.span.validate(n)?;

    let forward: Vec<usize> = match task.order {
        SweepOrder::Natural => task.span.indices(),
        SweepOrder::Permuted(p) => {
            validate_permutation(p, n)?;
            p.to_vec()
        }
        SweepOrder::Grouped { first, second } => {
            check_group(first, n)?;
            check_group(second, n)?;
            // Dispatch below uses the groups directly.
            Vec::new()
        }
    };

    let (first, second): (Vec<usize>, Vec<usize>) = match task.order {
        SweepOrder::Grouped { first, second } => (first.to_vec(), second.to_vec()),
        _ => (forward.clone(), forward.clone()),
    };

    match task.kind {
        SmootherKind::Jacobi => {
            let diag = a.diagonal();
            let rows = grouped_or_forward(&task.order, &first, &second, &forward);
            let mut old = vec![0.0f64; n];
            for _ in 0..task.sweeps {
                jacobi_pass(a, b, x, task.relax, &rows, &diag, &mut old)?;
            }
        }
        SmootherKind::L1Jacobi => {
            let sums = a.l1_row_sums();
            let rows = grouped_or_forward(&task.order, &first, &second, &forward);
            let mut old = vec![0.0f64; n];
            for _ in 0..task.sweeps {
                jacobi_pass(a, b, x, task.relax, &rows, &sums, &mut old)?;
            }
        }
        SmootherKind::GaussSeidel => {
            let rows = grouped_or_forward(&task.order, &first, &second, &forward);
            for _ in 0..task.sweeps {
                gs_pass(a, b, x, 1.0, rows.iter().copied())?;
            }
        }
        SmootherKind::Sor => {
            let rows = grouped_or_forward(&task.order, &first, &second, &forward);
            for _ in 0..task.sweeps {
                gs_pass(a, b, x, task.relax, rows.iter().copied())?;
            }
        }
        SmootherKind::SymGaussSeidel => {
            let rows = grouped_or_forward(&task.order, &first, &second, &forward);
            for _ in 0..task.sweeps {
                gs_pass(a, b, x, 1.0, rows.iter().copied())?;
                gs_pass(a, b, x, 1.0, rows.iter().rev().copied())?;
            }
        }
        SmootherKind::Ssor => {
            let rows = grouped_or_forward(&task.order, &first, &second, &forward);
            for _ in 0..task.sweeps {
                gs_pass(a, b, x, task.relax, rows.iter().copied())?;
                gs_pass(a, b, x, task.relax, rows.iter().rev().copied())?;
            }
        }
        SmootherKind::Gsor => {
            for _ in 0..task.sweeps {
                gs_pass(a, b, x, 1.0, first.iter().copied())?;
                gs_pass(a, b, x, task.relax, second.iter().copied())?;
            }
        }
        SmootherKind::Sgsor => {
            for _ in 0..task.sweeps {
                gs_pass(a, b, x, 1.0, first.iter().copied())?;
                gs_pass(a, b, x, task.relax, second.iter().copied())?;
                gs_pass(a, b, x, task.relax, second.iter().rev().copied())?;
                gs_pass(a, b, x, 1.0, first.iter().rev().copied())?;
            }
        }
        SmootherKind::Polynomial => {
            // The Chebyshev smoother works on the whole system; it needs no
            // row ordering and ignores the span.
            chebyshev(a, b, x, task.poly_degree, task.sweeps)?;
        }
    }

    Ok(())
}

fn check_group(group: &[usize], n: usize) -> Result<(), ValidationError> {
    for &i in group {
        if i >= n {
            return Err(ValidationError::InvalidPermutation {
                n,
                detail: format!("group index {i} out of range"),
            });
        }
    }
    Ok(())
}

/// Jacobi and the GS family interpret `Grouped` ordering as one concatenated
/// visit sequence; GSOR/SGSOR keep the groups separate.
fn grouped_or_forward(
    order: &SweepOrder<'_>,
    first: &[usize],
    second: &[usize],
    forward: &[usize],
) -> Vec<usize> {
    match order {
        SweepOrder::Grouped { .. } => {
            let mut rows = Vec::with_capacity(first.len() + second.len());
            rows.extend_from_slice(first);
            rows.extend_from_slice(second);
            rows
        }
        _ => forward.to_vec(),
    }
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// One synchronous Jacobi pass over `rows`, reading the previous iterate
/// entirely before writing the new one.
fn jacobi_pass(
    a: &CsrMatrix<f64>,
    b: &[f64],
    x: &mut [f64],
    relax: f64,
    rows: &[usize],
    denom: &[f64],
    old: &mut [f64],
) -> Result<(), AmgError> {
    old.copy_from_slice(x);
    for &i in rows {
        if denom[i] == 0.0 {
            return Err(AmgError::ZeroDiagonal { row: i });
        }
        let mut ax = 0.0f64;
        for (j, &v) in a.row_entries(i) {
            ax += v * old[j];
        }
        x[i] = old[i] + relax * (b[i] - ax) / denom[i];
    }
    Ok(())
}

/// One Gauss-Seidel / SOR pass over the given row sequence, using
/// already-updated values for rows visited earlier in the pass.
fn gs_pass(
    a: &CsrMatrix<f64>,
    b: &[f64],
    x: &mut [f64],
    relax: f64,
    rows: impl Iterator<Item = usize>,
) -> Result<(), AmgError> {
    for i in rows {
        let mut diag = 0.0f64;
        let mut sum = 0.0f64;
        for (j, &v) in a.row_entries(i) {
            if j == i {
                diag = v;
            } else {
                sum += v * x[j];
            }
        }
        if diag == 0.0 {
            return Err(AmgError::ZeroDiagonal { row: i });
        }
        let gs_value = (b[i] - sum) / diag;
        x[i] = (1.0 - relax) * x[i] + relax * gs_value;
    }
    Ok(())
}

/// Chebyshev polynomial smoother of the given degree.
///
/// Targets the diagonally-preconditioned operator `D^{-1} A` on the interval
/// `[lambda_max / 30, lambda_max]`, with `lambda_max` bounded by the
/// Gershgorin row sums. One sweep applies the full degree-`degree`
/// polynomial.
fn chebyshev(
    a: &CsrMatrix<f64>,
    b: &[f64],
    x: &mut [f64],
    degree: usize,
    sweeps: usize,
) -> Result<(), AmgError> {
    let n = a.rows;
    let diag = a.diagonal();
    for (i, &d) in diag.iter().enumerate() {
        if d == 0.0 {
            return Err(AmgError::ZeroDiagonal { row: i });
        }
    }

    // Gershgorin bound on the spectrum of D^{-1} A.
    let mut lambda_max = 0.0f64;
    for i in 0..n {
        let mut row_sum = 0.0f64;
        for (_, &v) in a.row_entries(i) {
            row_sum += v.abs();
        }
        lambda_max = lambda_max.max(row_sum / diag[i].abs());
    }
    let lambda_min = lambda_max / 30.0;

    let theta = 0.5 * (lambda_max + lambda_min);
    let delta = 0.5 * (lambda_max - lambda_min);
    let sigma = theta / delta;

    let mut r = vec![0.0f64; n];
    let mut z = vec![0.0f64; n];
    let mut d0 = vec![0.0f64; n];

    for _ in 0..sweeps {
        a.residual_norm(b, x, &mut r);
        for i in 0..n {
            z[i] = r[i] / diag[i];
            d0[i] = z[i] / theta;
        }
        kernels::axpy(1.0, &d0, x);

        let mut rho = 1.0 / sigma;
        for _ in 1..degree {
            let rho_new = 1.0 / (2.0 * sigma - rho);
            a.residual_norm(b, x, &mut r);
            for i in 0..n {
                z[i] = r[i] / diag[i];
                d0[i] = rho_new * rho * d0[i] + 2.0 * rho_new / delta * z[i];
            }
            kernels::axpy(1.0, &d0, x);
            rho = rho_new;
        }
    }

    Ok(())
}
