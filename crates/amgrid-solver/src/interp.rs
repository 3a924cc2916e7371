//! Prolongation and restriction construction.
//!
//! For every Fine row the builder expresses the row's value as a weighted
//! combination of the Coarse points it strongly depends on. Two variants:
//!
//! - **Direct**: the classical diagonal-splitting formula. The row's
//!   negative and positive off-diagonal sums are each distributed over the
//!   strong Coarse subset of the same sign, so that the resulting weights
//!   reproduce the row sum (a constant vector maps to itself).
//! - **Standard**: one level of strong Fine-Fine coupling is eliminated
//!   first (`e_j ~ -(1/a_jj) * sum_k a_jk e_k` for each strong Fine
//!   neighbour j), then the same split is applied to the extended row over
//!   the distance-2 strong Coarse set. Denser but more accurate rows.
//!
//! Coarse rows interpolate from themselves with weight 1. After the weights
//! are computed each row is truncated: entries below `trunc_threshold`
//! times the row's largest magnitude are dropped and the survivors rescaled
//! to preserve the row sum. Restriction is the transpose of prolongation.
//!
//! A Fine row with no strong Coarse connection (or whose weights all vanish)
//! cannot be built; such rows are reported through
//! [`InterpOutcome::Isolated`] and the hierarchy assembler recovers by
//! promoting them to Coarse, which turns them into identity rows.

use tracing::{debug, trace};

use crate::coarsen::Coarsening;
use crate::error::AmgError;
use crate::params::{AmgParameters, InterpKind};
use crate::types::{CfMark, CsrMatrix};

/// Transfer operators for one level transition.
#[derive(Debug)]
pub struct Interpolation {
    /// Prolongation: `n_fine x n_coarse`.
    pub p: CsrMatrix<f64>,
    /// Restriction: transpose of `p`, `n_coarse x n_fine`.
    pub r: CsrMatrix<f64>,
}

/// Result of an interpolation attempt.
#[derive(Debug)]
pub enum InterpOutcome {
    /// Both transfer operators were built.
    Built(Interpolation),
    /// These Fine rows have no usable strong Coarse connection. The caller
    /// must promote them to Coarse and retry; this is a recoverable
    /// condition, not an abort.
    Isolated(Vec<usize>),
}

/// Build prolongation and restriction from a coarsening pass.
///
/// # Errors
///
/// Returns [`AmgError::ZeroDiagonal`] when a diagonal needed by the weight
/// formula is exactly zero.
pub fn build(
    a: &CsrMatrix<f64>,
    coarsening: &Coarsening,
    params: &AmgParameters,
) -> Result<InterpOutcome, AmgError> {
    let n = a.rows;
    let cf = &coarsening.cf;
    debug_assert_eq!(cf.len(), n);

    // Coarse numbering: prefix count of Coarse marks.
    let mut coarse_index = vec![usize::MAX; n];
    let mut n_coarse = 0usize;
    for i in 0..n {
        if cf[i] == CfMark::Coarse {
            coarse_index[i] = n_coarse;
            n_coarse += 1;
        }
    }

    let mut row_ptr = Vec::with_capacity(n + 1);
    row_ptr.push(0usize);
    let mut col_indices: Vec<usize> = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    let mut isolated: Vec<usize> = Vec::new();

    // Scratch reused across rows: strong-connection marker for the current
    // row, and (standard variant) the extended-row accumulator.
    let mut strong = vec![usize::MAX; n];
    let mut scratch = RowScratch::new(n);
    let mut weights: Vec<(usize, f64)> = Vec::new();

    for i in 0..n {
        if cf[i] == CfMark::Coarse {
            col_indices.push(coarse_index[i]);
            values.push(1.0);
            row_ptr.push(col_indices.len());
            continue;
        }

        for (j, _) in coarsening.strength.row_entries(i) {
            strong[j] = i;
        }

        weights.clear();
        match params.interpolation {
            InterpKind::Direct => direct_row(a, cf, &strong, i, &mut weights)?,
            InterpKind::Standard => standard_row(
                a,
                &coarsening.strength,
                cf,
                &strong,
                i,
                &mut scratch,
                &mut weights,
            )?,
        }

        if !truncate_row(&mut weights, params.trunc_threshold) {
            trace!(row = i, "no usable interpolation weights; needs promotion");
            isolated.push(i);
            continue;
        }

        for &(j, w) in &weights {
            col_indices.push(coarse_index[j]);
            values.push(w);
        }
        row_ptr.push(col_indices.len());
    }

    if !isolated.is_empty() {
        return Ok(InterpOutcome::Isolated(isolated));
    }

    let p = CsrMatrix {
        row_ptr,
        col_indices,
        values,
        rows: n,
        cols: n_coarse,
    };
    let r = p.transpose();

    debug!(
        fine = n,
        coarse = n_coarse,
        p_nnz = p.nnz(),
        variant = ?params.interpolation,
        "interpolation built",
    );

    Ok(InterpOutcome::Built(Interpolation { p, r }))
}

/// Direct interpolation weights for Fine row `i`.
///
/// Splits the full negative and positive off-diagonal sums over the strong
/// Coarse subset of matching sign. A positive sum with no positive strong
/// Coarse entry is folded into the diagonal instead.
fn direct_row(
    a: &CsrMatrix<f64>,
    cf: &[CfMark],
    strong: &[usize],
    i: usize,
    weights: &mut Vec<(usize, f64)>,
) -> Result<(), AmgError> {
    let mut diag = 0.0f64;
    let mut sum_neg_all = 0.0f64;
    let mut sum_pos_all = 0.0f64;
    let mut sum_neg_c = 0.0f64;
    let mut sum_pos_c = 0.0f64;

    for (j, &v) in a.row_entries(i) {
        if j == i {
            diag = v;
            continue;
        }
        if v < 0.0 {
            sum_neg_all += v;
        } else {
            sum_pos_all += v;
        }
        if strong[j] == i && cf[j] == CfMark::Coarse {
            if v < 0.0 {
                sum_neg_c += v;
            } else {
                sum_pos_c += v;
            }
        }
    }

    let alpha = if sum_neg_c != 0.0 {
        sum_neg_all / sum_neg_c
    } else {
        0.0
    };
    let beta = if sum_pos_c != 0.0 {
        sum_pos_all / sum_pos_c
    } else {
        // No positive strong Coarse connection: fold the positive couplings
        // into the diagonal.
        diag += sum_pos_all;
        0.0
    };

    if diag == 0.0 {
        return Err(AmgError::ZeroDiagonal { row: i });
    }

    for (j, &v) in a.row_entries(i) {
        if j == i || strong[j] != i || cf[j] != CfMark::Coarse {
            continue;
        }
        let w = if v < 0.0 {
            -alpha * v / diag
        } else {
            -beta * v / diag
        };
        weights.push((j, w));
    }

    Ok(())
}

/// Dense scratch rows for the standard-interpolation extension.
struct RowScratch {
    /// Stamp marking which columns of `acc` belong to the current row.
    marker: Vec<usize>,
    /// Extended-row accumulator.
    acc: Vec<f64>,
    /// Columns touched for the current row.
    touched: Vec<usize>,
    /// Stamp marking membership of the current interpolatory set.
    cset_marker: Vec<usize>,
    /// Stamp marking the strong set of the neighbour being eliminated.
    strong_of: Vec<usize>,
    /// Monotone counter backing `strong_of` stamps.
    stamp: usize,
}

impl RowScratch {
    fn new(n: usize) -> Self {
        Self {
            marker: vec![usize::MAX; n],
            acc: vec![0.0; n],
            touched: Vec::new(),
            cset_marker: vec![usize::MAX; n],
            strong_of: vec![0usize; n],
            stamp: 0,
        }
    }

    #[inline]
    fn add(&mut self, row: usize, col: usize, v: f64) {
        if self.marker[col] == row {
            self.acc[col] += v;
        } else {
            self.marker[col] = row;
            self.acc[col] = v;
            self.touched.push(col);
        }
    }
}

/// Standard interpolation weights for Fine row `i`.
///
/// Builds the extended row by substituting each strong Fine neighbour j with
/// its own row scaled by `-a_ij / a_jj`, then applies the direct split over
/// the distance-2 strong Coarse set (strong Coarse neighbours of i plus
/// strong Coarse neighbours of every eliminated j).
fn standard_row(
    a: &CsrMatrix<f64>,
    strength: &CsrMatrix<i32>,
    cf: &[CfMark],
    strong: &[usize],
    i: usize,
    scratch: &mut RowScratch,
    weights: &mut Vec<(usize, f64)>,
) -> Result<(), AmgError> {
    scratch.touched.clear();
    let mut diag = 0.0f64;
    let mut cset: Vec<usize> = Vec::new();
    let mut strong_fine: Vec<(usize, f64)> = Vec::new();

    for (j, &v) in a.row_entries(i) {
        if j == i {
            diag += v;
            continue;
        }
        if strong[j] == i && cf[j] == CfMark::Fine {
            strong_fine.push((j, v));
            continue;
        }
        scratch.add(i, j, v);
        if strong[j] == i && cf[j] == CfMark::Coarse && scratch.cset_marker[j] != i {
            scratch.cset_marker[j] = i;
            cset.push(j);
        }
    }

    for &(j, a_ij) in &strong_fine {
        let a_jj = diagonal_of(a, j);
        if a_jj == 0.0 {
            return Err(AmgError::ZeroDiagonal { row: j });
        }

        // Stamp j's strong set so elimination can tell which coarse points
        // join the interpolatory set.
        scratch.stamp += 1;
        let stamp = scratch.stamp;
        for (k, _) in strength.row_entries(j) {
            scratch.strong_of[k] = stamp;
        }

        let factor = -a_ij / a_jj;
        for (k, &a_jk) in a.row_entries(j) {
            if k == j {
                continue;
            }
            let contrib = factor * a_jk;
            if k == i {
                diag += contrib;
                continue;
            }
            scratch.add(i, k, contrib);
            let strongly_reached = scratch.strong_of[k] == stamp || strong[k] == i;
            if cf[k] == CfMark::Coarse && strongly_reached && scratch.cset_marker[k] != i {
                scratch.cset_marker[k] = i;
                cset.push(k);
            }
        }
    }

    let mut sum_neg_all = 0.0f64;
    let mut sum_pos_all = 0.0f64;
    for &k in &scratch.touched {
        if scratch.marker[k] != i {
            continue;
        }
        let v = scratch.acc[k];
        if v < 0.0 {
            sum_neg_all += v;
        } else {
            sum_pos_all += v;
        }
    }

    let mut sum_neg_c = 0.0f64;
    let mut sum_pos_c = 0.0f64;
    for &k in &cset {
        let v = scratch.acc[k];
        if v < 0.0 {
            sum_neg_c += v;
        } else {
            sum_pos_c += v;
        }
    }

    let alpha = if sum_neg_c != 0.0 {
        sum_neg_all / sum_neg_c
    } else {
        0.0
    };
    let beta = if sum_pos_c != 0.0 {
        sum_pos_all / sum_pos_c
    } else {
        diag += sum_pos_all;
        0.0
    };

    if diag == 0.0 {
        return Err(AmgError::ZeroDiagonal { row: i });
    }

    for &k in &cset {
        let v = scratch.acc[k];
        let w = if v < 0.0 {
            -alpha * v / diag
        } else {
            -beta * v / diag
        };
        weights.push((k, w));
    }

    Ok(())
}

#[inline]
fn diagonal_of(a: &CsrMatrix<f64>, row: usize) -> f64 {
    for (col, &v) in a.row_entries(row) {
        if col == row {
            return v;
        }
    }
    0.0
}

/// Truncate a weight row in place and rescale to preserve the row sum.
///
/// Returns `false` when the row has no usable weights (empty, or every
/// weight is exactly zero) — the isolated-row condition.
fn truncate_row(weights: &mut Vec<(usize, f64)>, tau: f64) -> bool {
    if weights.is_empty() {
        return false;
    }

    let max_mag = weights
        .iter()
        .map(|&(_, w)| w.abs())
        .fold(0.0f64, f64::max);
    if max_mag == 0.0 {
        return false;
    }

    let total: f64 = weights.iter().map(|&(_, w)| w).sum();
    let cutoff = tau * max_mag;
    weights.retain(|&(_, w)| w.abs() >= cutoff);

    let kept: f64 = weights.iter().map(|&(_, w)| w).sum();
    if kept != 0.0 && total != 0.0 {
        let rescale = total / kept;
        for (_, w) in weights.iter_mut() {
            *w *= rescale;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coarsen::coarsen;
    use crate::types::CfMark;

    fn poisson_1d(n: usize) -> CsrMatrix<f64> {
        let mut entries = Vec::new();
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

    fn build_for(a: &CsrMatrix<f64>, params: &AmgParameters) -> Interpolation {
        let c = coarsen(a, params);
        match build(a, &c, params).unwrap() {
            InterpOutcome::Built(interp) => interp,
            InterpOutcome::Isolated(rows) => panic!("unexpected isolated rows {rows:?}"),
        }
    }

    #[test]
    fn coarse_rows_are_identity() {
        let a = poisson_1d(9);
        let params = AmgParameters::default();
        let c = coarsen(&a, &params);
        let interp = build_for(&a, &params);

        for i in 0..9 {
            if c.cf[i] == CfMark::Coarse {
                assert_eq!(interp.p.row_nnz(i), 1);
                let (_, &w) = interp.p.row_entries(i).next().unwrap();
                assert_eq!(w, 1.0);
            }
        }
    }

    #[test]
    fn fine_row_weights_sum_to_one_on_zero_row_sum_matrix() {
        // Interior rows of the pure graph Laplacian have zero row sum, so
        // constant preservation means each fine row of P sums to exactly 1.
        let n = 17;
        let mut entries = Vec::new();
        for i in 0..n {
            let mut degree = 0.0;
            if i > 0 {
                entries.push((i, i - 1, -1.0));
                degree += 1.0;
            }
            if i + 1 < n {
                entries.push((i, i + 1, -1.0));
                degree += 1.0;
            }
            entries.push((i, i, degree));
        }
        let a = CsrMatrix::<f64>::from_coo(n, n, entries);
        let params = AmgParameters::default();
        let c = coarsen(&a, &params);
        let interp = build_for(&a, &params);

        for i in 0..n {
            if c.cf[i] == CfMark::Fine {
                let sum: f64 = interp.p.row_entries(i).map(|(_, &w)| w).sum();
                assert!((sum - 1.0).abs() < 1e-12, "row {i}: sum {sum}");
            }
        }
    }

    #[test]
    fn constant_vector_maps_to_itself() {
        let n = 17;
        let mut entries = Vec::new();
        for i in 0..n {
            let mut degree = 0.0;
            if i > 0 {
                entries.push((i, i - 1, -1.0));
                degree += 1.0;
            }
            if i + 1 < n {
                entries.push((i, i + 1, -1.0));
                degree += 1.0;
            }
            entries.push((i, i, degree));
        }
        let a = CsrMatrix::<f64>::from_coo(n, n, entries);
        let interp = build_for(&a, &AmgParameters::default());

        let ones = vec![1.0; interp.p.cols];
        let mut out = vec![0.0; interp.p.rows];
        interp.p.spmv(&ones, &mut out);
        for (i, &v) in out.iter().enumerate() {
            assert!((v - 1.0).abs() < 1e-12, "row {i}: {v}");
        }
    }

    #[test]
    fn direct_weights_on_poisson_interior() {
        // Fine row 2 of the 1-D Poisson matrix interpolates half from each
        // coarse neighbour.
        let a = poisson_1d(9);
        let params = AmgParameters::default();
        let interp = build_for(&a, &params);

        let row: Vec<(usize, f64)> = interp.p.row_entries(2).map(|(c, &w)| (c, w)).collect();
        assert_eq!(row.len(), 2);
        for &(_, w) in &row {
            assert!((w - 0.5).abs() < 1e-12);
        }
    }

    /// 5-point graph Laplacian on an `n x n` grid; every row sums to zero.
    fn grid_laplacian(n: usize) -> CsrMatrix<f64> {
        let idx = |r: usize, c: usize| r * n + c;
        let mut entries = Vec::new();
        for r in 0..n {
            for c in 0..n {
                let i = idx(r, c);
                let mut degree = 0.0;
                let mut neighbour = |j: usize, entries: &mut Vec<(usize, usize, f64)>| {
                    entries.push((i, j, -1.0));
                    degree += 1.0;
                };
                if r > 0 {
                    neighbour(idx(r - 1, c), &mut entries);
                }
                if r + 1 < n {
                    neighbour(idx(r + 1, c), &mut entries);
                }
                if c > 0 {
                    neighbour(idx(r, c - 1), &mut entries);
                }
                if c + 1 < n {
                    neighbour(idx(r, c + 1), &mut entries);
                }
                entries.push((i, i, degree));
            }
        }
        CsrMatrix::<f64>::from_coo(n * n, n * n, entries)
    }

    #[test]
    fn standard_interpolation_preserves_constants_on_grid() {
        // The 2-D grid coarsening leaves strongly-coupled fine pairs, so
        // this exercises the fine-fine elimination path; zero row sums make
        // constant preservation exact.
        let a = grid_laplacian(5);
        let mut params = AmgParameters::default();
        params.interpolation = InterpKind::Standard;
        let c = coarsen(&a, &params);
        let interp = build_for(&a, &params);

        assert_eq!(interp.p.rows, 25);
        assert_eq!(interp.p.cols, c.n_coarse);
        assert_eq!(interp.r.rows, c.n_coarse);

        let ones = vec![1.0; interp.p.cols];
        let mut out = vec![0.0; interp.p.rows];
        interp.p.spmv(&ones, &mut out);
        for (i, &v) in out.iter().enumerate() {
            assert!((v - 1.0).abs() < 1e-10, "row {i}: {v}");
        }
    }

    #[test]
    fn restriction_is_transpose() {
        let a = poisson_1d(9);
        let interp = build_for(&a, &AmgParameters::default());
        let rt = interp.r.transpose();
        assert_eq!(rt.rows, interp.p.rows);
        assert_eq!(rt.cols, interp.p.cols);

        let x = vec![1.0, -2.0, 3.0, 0.5];
        let mut y1 = vec![0.0; interp.p.rows];
        let mut y2 = vec![0.0; interp.p.rows];
        interp.p.spmv(&x[..interp.p.cols], &mut y1);
        rt.spmv(&x[..interp.p.cols], &mut y2);
        for i in 0..y1.len() {
            assert!((y1[i] - y2[i]).abs() < 1e-14);
        }
    }

    #[test]
    fn truncation_preserves_row_sum() {
        let mut weights = vec![(0, 0.6), (1, 0.35), (2, 0.05)];
        assert!(truncate_row(&mut weights, 0.2));
        assert_eq!(weights.len(), 2);
        let sum: f64 = weights.iter().map(|&(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn truncation_keeps_dominant_weight() {
        let mut weights = vec![(0, 1.0)];
        assert!(truncate_row(&mut weights, 0.5));
        assert_eq!(weights, vec![(0, 1.0)]);
    }

    #[test]
    fn truncation_rejects_empty_and_zero_rows() {
        let mut empty: Vec<(usize, f64)> = Vec::new();
        assert!(!truncate_row(&mut empty, 0.2));

        let mut zeros = vec![(0, 0.0), (1, 0.0)];
        assert!(!truncate_row(&mut zeros, 0.2));
    }

    #[test]
    fn isolated_fine_row_is_reported() {
        // Row 1 couples only weakly; force it Fine with a doctored marking.
        let a = poisson_1d(3);
        let params = AmgParameters::default();
        let mut c = coarsen(&a, &params);
        // Sabotage: pretend nothing is coarse.
        for m in c.cf.iter_mut() {
            *m = CfMark::Fine;
        }
        match build(&a, &c, &params).unwrap() {
            InterpOutcome::Isolated(rows) => assert_eq!(rows, vec![0, 1, 2]),
            InterpOutcome::Built(_) => panic!("expected isolated rows"),
        }
    }
}
