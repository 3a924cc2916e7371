//! Eager input validation.
//!
//! All validation runs before any numerical work begins, so callers receive
//! clear diagnostics instead of mysterious divergence or out-of-bounds
//! panics deep inside a sweep. Every function returns
//! [`ValidationError`] on failure, which converts into
//! [`AmgError::InvalidInput`](crate::error::AmgError::InvalidInput) via
//! `From`.

use crate::error::ValidationError;
use crate::types::CsrMatrix;

/// Upper bound on iteration counts, to catch nonsense configuration early.
pub const MAX_ITERATIONS: usize = 1_000_000;

/// Validate the structural integrity of a CSR matrix.
///
/// Checks, in order:
///
/// 1. `row_ptr` length equals `rows + 1`.
/// 2. `row_ptr` is monotonically non-decreasing.
/// 3. `row_ptr[0] == 0` and `row_ptr[rows] == nnz`.
/// 4. `col_indices` length equals `values` length.
/// 5. All column indices are less than `cols`.
/// 6. Each column appears at most once per row.
/// 7. No `NaN` or `Inf` values.
///
/// The per-row uniqueness check uses a marker array stamped with the row
/// index, so the whole pass is O(rows + cols + nnz).
pub fn validate_matrix(matrix: &CsrMatrix<f64>) -> Result<(), ValidationError> {
    let nnz = matrix.values.len();

    if matrix.row_ptr.len() != matrix.rows + 1 {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr length {} does not equal rows + 1 = {}",
            matrix.row_ptr.len(),
            matrix.rows + 1,
        )));
    }

    for i in 1..matrix.row_ptr.len() {
        if matrix.row_ptr[i] < matrix.row_ptr[i - 1] {
            return Err(ValidationError::NonMonotonicRowPtrs { position: i });
        }
    }

    if matrix.row_ptr[0] != 0 {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr[0] = {} (expected 0)",
            matrix.row_ptr[0],
        )));
    }
    if matrix.row_ptr[matrix.rows] != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "values length {} does not match row_ptr[rows] = {}",
            nnz, matrix.row_ptr[matrix.rows],
        )));
    }

    if matrix.col_indices.len() != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "col_indices length {} does not match values length {}",
            matrix.col_indices.len(),
            nnz,
        )));
    }

    let mut seen_in_row = vec![usize::MAX; matrix.cols];
    for row in 0..matrix.rows {
        for idx in matrix.row_ptr[row]..matrix.row_ptr[row + 1] {
            let col = matrix.col_indices[idx];
            if col >= matrix.cols {
                return Err(ValidationError::ColumnOutOfBounds {
                    index: col,
                    row,
                    cols: matrix.cols,
                });
            }
            if seen_in_row[col] == row {
                return Err(ValidationError::DuplicateEntry { row, col });
            }
            seen_in_row[col] = row;

            let val = matrix.values[idx];
            if !val.is_finite() {
                return Err(ValidationError::NonFiniteValue(format!(
                    "matrix[{}, {}] = {}",
                    row, col, val,
                )));
            }
        }
    }

    Ok(())
}

/// Validate a dense vector for a solve: length and finiteness.
pub fn validate_vector(name: &str, v: &[f64], expected_len: usize) -> Result<(), ValidationError> {
    if v.len() != expected_len {
        return Err(ValidationError::DimensionMismatch(format!(
            "{} length {} does not match expected {}",
            name,
            v.len(),
            expected_len,
        )));
    }

    for (i, &x) in v.iter().enumerate() {
        if !x.is_finite() {
            return Err(ValidationError::NonFiniteValue(format!(
                "{}[{}] = {}",
                name, i, x,
            )));
        }
    }

    Ok(())
}

/// Validate the complete solver input: matrix structure, square shape, and
/// the rhs/solution pair.
pub fn validate_system(
    matrix: &CsrMatrix<f64>,
    b: &[f64],
    x: &[f64],
) -> Result<(), ValidationError> {
    validate_matrix(matrix)?;

    if matrix.rows != matrix.cols {
        return Err(ValidationError::DimensionMismatch(format!(
            "solver requires a square matrix but got {}x{}",
            matrix.rows, matrix.cols,
        )));
    }

    validate_vector("b", b, matrix.rows)?;
    validate_vector("x", x, matrix.rows)?;

    if b.iter().all(|&v| v == 0.0) && !b.is_empty() {
        tracing::warn!("rhs vector is all zeros; solution will be trivially zero");
    }

    Ok(())
}

/// Validate that `perm` is a permutation of `[0, n)`.
///
/// Orderings handed to the smoother engine must satisfy this so that strided
/// and CF-grouped sweeps can index without bounds surprises.
pub fn validate_permutation(perm: &[usize], n: usize) -> Result<(), ValidationError> {
    if perm.len() != n {
        return Err(ValidationError::InvalidPermutation {
            n,
            detail: format!("length {} != {}", perm.len(), n),
        });
    }

    let mut seen = vec![false; n];
    for &i in perm {
        if i >= n {
            return Err(ValidationError::InvalidPermutation {
                n,
                detail: format!("index {} out of range", i),
            });
        }
        if seen[i] {
            return Err(ValidationError::InvalidPermutation {
                n,
                detail: format!("index {} repeated", i),
            });
        }
        seen[i] = true;
    }

    Ok(())
}
