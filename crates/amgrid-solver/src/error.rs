//! Error types for the multigrid solver.
//!
//! Structured error variants for shape mismatches, configuration mistakes,
//! and numerical failures detected during setup or solve. All errors
//! implement `std::error::Error` via `thiserror`.
//!
//! Two conditions are deliberately *not* errors: non-convergence (reported as
//! a status flag in [`SolveStats`](crate::types::SolveStats) together with the
//! best iterate found) and degenerate coarsening (the hierarchy is truncated
//! at the level where coarsening stalled).

/// Primary error type for solver operations.
#[derive(Debug, thiserror::Error)]
pub enum AmgError {
    /// The caller supplied invalid input (dimensions, structure, parameters).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// A smoother required a diagonal entry (or L1 row sum) that is exactly
    /// zero. The current solve is aborted; nothing is silently skipped.
    #[error("zero diagonal entry at row {row}; smoother cannot divide by it")]
    ZeroDiagonal {
        /// Row whose diagonal (or L1 row sum) vanished.
        row: usize,
    },

    /// The coarsest-level direct solve hit a zero pivot.
    #[error("coarsest system is singular: zero pivot in column {column}")]
    SingularCoarseSystem {
        /// Elimination column where the pivot vanished.
        column: usize,
    },

    /// A numerical instability was detected (NaN, Inf, or Krylov breakdown).
    #[error("numerical instability at iteration {iteration}: {detail}")]
    NumericalInstability {
        /// Iteration at which the instability was detected.
        iteration: usize,
        /// Human-readable explanation.
        detail: String,
    },
}

/// Validation errors for solver inputs.
///
/// Raised eagerly before any numerical work begins so that callers get clear
/// diagnostics rather than mysterious divergence. Converts into
/// [`AmgError::InvalidInput`] via `From`.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Matrix or vector dimensions are inconsistent.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// The `row_ptr` array is not monotonically non-decreasing.
    #[error("row_ptr is not monotonically non-decreasing at position {position}")]
    NonMonotonicRowPtrs {
        /// Position in `row_ptr` where the violation was detected.
        position: usize,
    },

    /// A column index is out of bounds for the declared number of columns.
    #[error("column index {index} out of bounds for {cols} columns (row {row})")]
    ColumnOutOfBounds {
        /// Offending column index.
        index: usize,
        /// Row containing the offending entry.
        row: usize,
        /// Declared column count.
        cols: usize,
    },

    /// The same (row, column) position is stored twice.
    #[error("duplicate entry at ({row}, {col}); columns must be unique per row")]
    DuplicateEntry {
        /// Row containing the duplicate.
        row: usize,
        /// Column stored more than once.
        col: usize,
    },

    /// A value is NaN or infinite where a finite number is required.
    #[error("non-finite value detected: {0}")]
    NonFiniteValue(String),

    /// A parameter is outside its documented range.
    #[error("parameter out of range: {name} = {value} (expected {expected})")]
    ParameterOutOfRange {
        /// Name of the parameter.
        name: String,
        /// The invalid value (as a string for flexibility).
        value: String,
        /// Human-readable description of the valid range.
        expected: String,
    },

    /// An ordering sequence is not a permutation of `[0, n)`.
    #[error("ordering is not a permutation of [0, {n}): {detail}")]
    InvalidPermutation {
        /// Expected permutation length.
        n: usize,
        /// What went wrong (length, repeated index, out-of-range index).
        detail: String,
    },
}
