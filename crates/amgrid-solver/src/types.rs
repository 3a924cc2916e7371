//! Core types for the multigrid solver.
//!
//! Provides [`CsrMatrix`] for compressed sparse row storage, the
//! coarse/fine classification tag [`CfMark`], and the [`SolveStats`] result
//! record populated by every solve invocation.

use crate::error::{AmgError, ValidationError};

// ---------------------------------------------------------------------------
// CsrMatrix<T>
// ---------------------------------------------------------------------------

/// Compressed Sparse Row (CSR) matrix.
///
/// Stores only non-zero entries for O(nnz) matrix-vector products with good
/// cache locality. The float instantiation `CsrMatrix<f64>` carries the
/// operators and transfer matrices of the hierarchy; the integer
/// instantiation `CsrMatrix<i32>` carries auxiliary structures such as the
/// strength-of-connection graph built during coarsening.
///
/// # Layout
///
/// For a matrix with `m` rows and `nnz` non-zeros:
/// - `row_ptr` has length `m + 1`, `row_ptr[0] == 0`, `row_ptr[m] == nnz`
/// - `col_indices` and `values` each have length `nnz`
/// - Row `i` spans indices `row_ptr[i]..row_ptr[i+1]`
///
/// Entries within a row need not be sorted by column, but each column may
/// appear at most once per row (checked by
/// [`validate_matrix`](crate::validation::validate_matrix)).
#[derive(Debug, Clone)]
pub struct CsrMatrix<T> {
    /// Row pointers: `row_ptr[i]` is the start index in `col_indices`/`values`
    /// for row `i`.
    pub row_ptr: Vec<usize>,
    /// Column indices for each non-zero entry.
    pub col_indices: Vec<usize>,
    /// Values for each non-zero entry.
    pub values: Vec<T>,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl<T> CsrMatrix<T> {
    /// Number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Number of non-zeros in a specific row.
    #[inline]
    pub fn row_nnz(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// Iterate over `(col_index, &value)` pairs for the given row.
    #[inline]
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, &T)> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        self.col_indices[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter())
    }

    /// An empty `rows x cols` matrix with no stored entries.
    pub fn zeros(rows: usize, cols: usize) -> Self
    where
        T: Default,
    {
        Self {
            row_ptr: vec![0; rows + 1],
            col_indices: Vec::new(),
            values: Vec::new(),
            rows,
            cols,
        }
    }
}

impl<T: Copy + Default> CsrMatrix<T> {
    /// Transpose: produces `A^T` in CSR form.
    ///
    /// Uses a two-pass counting sort in O(nnz + rows + cols) time. This is
    /// how the restriction operator is derived from the prolongation.
    pub fn transpose(&self) -> CsrMatrix<T> {
        let nnz = self.nnz();
        let t_rows = self.cols;
        let t_cols = self.rows;

        // Pass 1: count entries per new row (= old column).
        let mut row_ptr = vec![0usize; t_rows + 1];
        for &c in &self.col_indices {
            row_ptr[c + 1] += 1;
        }
        for i in 1..=t_rows {
            row_ptr[i] += row_ptr[i - 1];
        }

        // Pass 2: scatter entries into the transposed arrays.
        let mut col_indices = vec![0usize; nnz];
        let mut values = vec![T::default(); nnz];
        let mut cursor = row_ptr.clone();

        for row in 0..self.rows {
            let start = self.row_ptr[row];
            let end = self.row_ptr[row + 1];
            for idx in start..end {
                let c = self.col_indices[idx];
                let dest = cursor[c];
                col_indices[dest] = row;
                values[dest] = self.values[idx];
                cursor[c] += 1;
            }
        }

        CsrMatrix {
            row_ptr,
            col_indices,
            values,
            rows: t_rows,
            cols: t_cols,
        }
    }
}

impl<T> CsrMatrix<T>
where
    T: Copy + Default + std::ops::Mul<Output = T> + std::ops::AddAssign,
{
    /// Sparse matrix-vector multiply: `y = A * x`.
    ///
    /// # Panics
    ///
    /// Asserts that `x.len() >= self.cols` and `y.len() >= self.rows`. The
    /// fallible entry points validate shapes before reaching this kernel.
    #[inline]
    pub fn spmv(&self, x: &[T], y: &mut [T]) {
        assert!(
            x.len() >= self.cols,
            "spmv: x.len()={} < cols={}",
            x.len(),
            self.cols,
        );
        assert!(
            y.len() >= self.rows,
            "spmv: y.len()={} < rows={}",
            y.len(),
            self.rows,
        );

        for i in 0..self.rows {
            let mut sum = T::default();
            let start = self.row_ptr[i];
            let end = self.row_ptr[i + 1];

            for idx in start..end {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            y[i] = sum;
        }
    }

    /// Build a CSR matrix from COO (coordinate) triplets.
    ///
    /// Entries are sorted by (row, col) internally. Duplicate positions at
    /// the same (row, col) are summed, so the per-row uniqueness invariant
    /// holds by construction.
    ///
    /// # Panics
    ///
    /// Asserts that every index is within `rows` x `cols`.
    pub fn from_coo(
        rows: usize,
        cols: usize,
        entries: impl IntoIterator<Item = (usize, usize, T)>,
    ) -> Self {
        let mut sorted: Vec<_> = entries.into_iter().collect();
        sorted.sort_unstable_by_key(|(r, c, _)| (*r, *c));

        let mut row_ptr = vec![0usize; rows + 1];
        let mut col_indices: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<T> = Vec::with_capacity(sorted.len());

        let mut prev: Option<(usize, usize)> = None;
        for (r, c, v) in sorted {
            assert!(r < rows, "row index {} out of bounds (rows={})", r, rows);
            assert!(c < cols, "col index {} out of bounds (cols={})", c, cols);

            if prev == Some((r, c)) {
                // Same (row, col) as the previous entry: accumulate.
                *values.last_mut().expect("entry just pushed") += v;
            } else {
                col_indices.push(c);
                values.push(v);
                row_ptr[r + 1] = col_indices.len();
                prev = Some((r, c));
            }
        }

        // Fill gaps for empty rows.
        for i in 1..=rows {
            if row_ptr[i] < row_ptr[i - 1] {
                row_ptr[i] = row_ptr[i - 1];
            }
        }

        Self {
            row_ptr,
            col_indices,
            values,
            rows,
            cols,
        }
    }
}

impl CsrMatrix<f64> {
    /// Build a square identity matrix of dimension `n`.
    pub fn identity(n: usize) -> Self {
        Self {
            row_ptr: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![1.0; n],
            rows: n,
            cols: n,
        }
    }

    /// Fused residual computation: fills `r[i] = b[i] - (A*x)[i]` and returns
    /// `||r||_2` in a single pass, avoiding a separate traversal for the norm.
    ///
    /// # Panics
    ///
    /// Asserts that `x`, `b`, and `r` are at least as long as the matrix
    /// shape requires.
    pub fn residual_norm(&self, b: &[f64], x: &[f64], r: &mut [f64]) -> f64 {
        assert!(x.len() >= self.cols, "residual: x too short");
        assert!(b.len() >= self.rows, "residual: b too short");
        assert!(r.len() >= self.rows, "residual: r too short");

        let mut norm_sq = 0.0f64;
        for i in 0..self.rows {
            let start = self.row_ptr[i];
            let end = self.row_ptr[i + 1];
            let mut ax_i = 0.0f64;
            for idx in start..end {
                ax_i += self.values[idx] * x[self.col_indices[idx]];
            }
            let r_i = b[i] - ax_i;
            r[i] = r_i;
            norm_sq += r_i * r_i;
        }
        norm_sq.sqrt()
    }

    /// Extract the diagonal as a dense vector.
    ///
    /// Positions with no stored diagonal entry are returned as `0.0`; the
    /// smoothers report those as [`AmgError::ZeroDiagonal`] when they need
    /// to divide by them.
    pub fn diagonal(&self) -> Vec<f64> {
        let n = self.rows.min(self.cols);
        let mut diag = vec![0.0f64; n];
        for (row, d) in diag.iter_mut().enumerate() {
            for (col, &v) in self.row_entries(row) {
                if col == row {
                    *d = v;
                    break;
                }
            }
        }
        diag
    }

    /// Row-wise absolute sums `sum_j |a_ij|`, the L1 diagonal approximation
    /// used by the L1-Jacobi smoother.
    pub fn l1_row_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0f64; self.rows];
        for (row, s) in sums.iter_mut().enumerate() {
            for (_, &v) in self.row_entries(row) {
                *s += v.abs();
            }
        }
        sums
    }

    /// Sparse matrix-matrix product `C = A * B`.
    ///
    /// Accumulates each output row through a dense scratch row (position
    /// marker plus running values), reset per row via the touched-column
    /// list, so total work is O(rows + nnz + flops) regardless of column
    /// order. Column indices of the result are not sorted, which is fine for
    /// every consumer in this crate.
    ///
    /// This is the building block of the Galerkin triple product
    /// `A_next = R * (A * P)`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DimensionMismatch`] if `self.cols != b.rows`.
    pub fn matmul(&self, b: &CsrMatrix<f64>) -> Result<CsrMatrix<f64>, AmgError> {
        if self.cols != b.rows {
            return Err(ValidationError::DimensionMismatch(format!(
                "matmul: left is {}x{} but right is {}x{}",
                self.rows, self.cols, b.rows, b.cols,
            ))
            .into());
        }

        let mut row_ptr = Vec::with_capacity(self.rows + 1);
        row_ptr.push(0usize);
        let mut col_indices: Vec<usize> = Vec::new();
        let mut values: Vec<f64> = Vec::new();

        // marker[j] = absolute position of column j in the output arrays,
        // valid only when >= the current row's first position.
        let mut marker = vec![usize::MAX; b.cols];

        for i in 0..self.rows {
            let row_begin = col_indices.len();

            for idx in self.row_ptr[i]..self.row_ptr[i + 1] {
                let k = self.col_indices[idx];
                let a_ik = self.values[idx];

                for jdx in b.row_ptr[k]..b.row_ptr[k + 1] {
                    let j = b.col_indices[jdx];
                    let contrib = a_ik * b.values[jdx];

                    let pos = marker[j];
                    if pos != usize::MAX && pos >= row_begin {
                        values[pos] += contrib;
                    } else {
                        marker[j] = col_indices.len();
                        col_indices.push(j);
                        values.push(contrib);
                    }
                }
            }

            row_ptr.push(col_indices.len());
        }

        Ok(CsrMatrix {
            row_ptr,
            col_indices,
            values,
            rows: self.rows,
            cols: b.cols,
        })
    }
}

// ---------------------------------------------------------------------------
// Coarse/fine classification
// ---------------------------------------------------------------------------

/// Classification of a row produced by the coarsening engine.
///
/// Every row of a non-coarsest level is marked exactly one of the two; the
/// marking is a true partition (tested as such).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CfMark {
    /// The row survives into the next (coarser) level.
    Coarse,
    /// The row is interpolated from its strong coarse neighbours.
    Fine,
}

// ---------------------------------------------------------------------------
// Solve result types
// ---------------------------------------------------------------------------

/// Per-iteration residual snapshot.
#[derive(Debug, Clone)]
pub struct ResidualSample {
    /// Iteration index (0-based).
    pub iteration: usize,
    /// Absolute residual L2 norm at this iteration.
    pub abs_residual: f64,
    /// Residual norm relative to `||b||` (or to the absolute norm when
    /// `||b|| == 0`).
    pub rel_residual: f64,
}

/// Result record populated by every solve invocation.
///
/// Non-convergence is a status, not an error: when the iteration cap is
/// reached the solver leaves the best iterate found in the caller's solution
/// vector and reports `converged: false` here.
#[derive(Debug, Clone)]
pub struct SolveStats {
    /// Number of iterations (outer cycles for AMG, matrix-vector products
    /// for the Krylov solvers) performed.
    pub iterations: usize,
    /// Final absolute residual L2 norm.
    pub abs_residual: f64,
    /// Final relative residual norm.
    pub rel_residual: f64,
    /// Whether the requested tolerance was met.
    pub converged: bool,
    /// Per-iteration residual history.
    pub history: Vec<ResidualSample>,
}

impl Default for SolveStats {
    fn default() -> Self {
        Self {
            iterations: 0,
            abs_residual: 0.0,
            rel_residual: 0.0,
            converged: false,
            history: Vec::new(),
        }
    }
}

/// Compute the relative residual, guarding the zero-rhs case.
#[inline]
pub(crate) fn relative_residual(abs: f64, b_norm: f64) -> f64 {
    if b_norm > 0.0 {
        abs / b_norm
    } else {
        abs
    }
}

/// Dense reference product used by the order-independence tests.
#[cfg(test)]
pub(crate) fn dense_spmv(a: &CsrMatrix<f64>, x: &[f64]) -> Vec<f64> {
    let mut dense = vec![vec![0.0f64; a.cols]; a.rows];
    for row in 0..a.rows {
        for (col, &v) in a.row_entries(row) {
            dense[row][col] += v;
        }
    }
    dense
        .iter()
        .map(|r| crate::kernels::dot(r, x))
        .collect()
}
