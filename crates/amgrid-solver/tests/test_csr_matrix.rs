//! Integration tests for the CSR primitives.
//!
//! Covers the order-independence of the sparse product against a dense
//! reference, the Galerkin building blocks, and structural validation.

mod helpers;

use approx::assert_relative_eq;

use amgrid_solver::types::CsrMatrix;
use amgrid_solver::validation::{validate_matrix, validate_system};

use helpers::{dense_reference_spmv, poisson_2d, random_diag_dominant, random_vector, Lcg};

// ---------------------------------------------------------------------------
// SpMV vs dense reference
// ---------------------------------------------------------------------------

#[test]
fn spmv_matches_dense_reference() {
    for seed in [7, 21, 99] {
        let a = random_diag_dominant(40, 0.15, seed);
        let x = random_vector(40, seed + 1);

        let mut y = vec![0.0; 40];
        a.spmv(&x, &mut y);
        let reference = dense_reference_spmv(&a, &x);

        for i in 0..40 {
            assert_relative_eq!(y[i], reference[i], max_relative = 1e-12, epsilon = 1e-12);
        }
    }
}

#[test]
fn spmv_is_independent_of_entry_order_within_rows() {
    // Shuffle the stored order of every row's entries; the product must not
    // change beyond rounding.
    let a = random_diag_dominant(30, 0.2, 3);
    let x = random_vector(30, 4);

    let mut shuffled = a.clone();
    let mut rng = Lcg::new(11);
    for row in 0..shuffled.rows {
        let start = shuffled.row_ptr[row];
        let end = shuffled.row_ptr[row + 1];
        // Fisher-Yates over the row's slice of both parallel arrays.
        for k in ((start + 1)..end).rev() {
            let pick = start + (rng.next_u64() as usize) % (k - start + 1);
            shuffled.col_indices.swap(k, pick);
            shuffled.values.swap(k, pick);
        }
    }
    assert!(validate_matrix(&shuffled).is_ok());

    let mut y1 = vec![0.0; 30];
    let mut y2 = vec![0.0; 30];
    a.spmv(&x, &mut y1);
    shuffled.spmv(&x, &mut y2);
    for i in 0..30 {
        assert_relative_eq!(y1[i], y2[i], max_relative = 1e-13, epsilon = 1e-13);
    }
}

// ---------------------------------------------------------------------------
// Matrix products
// ---------------------------------------------------------------------------

#[test]
fn matmul_matches_dense_reference() {
    let a = random_diag_dominant(25, 0.2, 5);
    let b = random_diag_dominant(25, 0.2, 6);
    let c = a.matmul(&b).unwrap();

    // Compare C * x against A * (B * x).
    let x = random_vector(25, 7);
    let mut bx = vec![0.0; 25];
    b.spmv(&x, &mut bx);
    let mut abx = vec![0.0; 25];
    a.spmv(&bx, &mut abx);

    let mut cx = vec![0.0; 25];
    c.spmv(&x, &mut cx);

    for i in 0..25 {
        assert_relative_eq!(cx[i], abx[i], max_relative = 1e-11, epsilon = 1e-11);
    }
}

#[test]
fn transpose_swaps_action() {
    let a = random_diag_dominant(20, 0.25, 8);
    let t = a.transpose();

    let x = random_vector(20, 9);
    let y = random_vector(20, 10);

    // <A x, y> == <x, A^T y>
    let mut ax = vec![0.0; 20];
    a.spmv(&x, &mut ax);
    let mut ty = vec![0.0; 20];
    t.spmv(&y, &mut ty);

    let lhs: f64 = ax.iter().zip(y.iter()).map(|(&p, &q)| p * q).sum();
    let rhs: f64 = x.iter().zip(ty.iter()).map(|(&p, &q)| p * q).sum();
    assert_relative_eq!(lhs, rhs, max_relative = 1e-12);
}

#[test]
fn poisson_2d_structure_is_valid() {
    let a = poisson_2d(8);
    assert_eq!(a.rows, 64);
    assert!(validate_matrix(&a).is_ok());
    // Interior rows carry the full 5-point stencil.
    let interior = 3 * 8 + 3; // row 3, col 3
    assert_eq!(a.row_nnz(interior), 5);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn validation_rejects_broken_structures() {
    let good = poisson_2d(4);
    assert!(validate_system(&good, &vec![1.0; 16], &vec![0.0; 16]).is_ok());

    let mut bad = good.clone();
    bad.row_ptr[5] = 1; // breaks monotonicity
    assert!(validate_matrix(&bad).is_err());

    let mut bad = good.clone();
    bad.col_indices[0] = 999;
    assert!(validate_matrix(&bad).is_err());

    let mut bad = good.clone();
    bad.values[3] = f64::NAN;
    assert!(validate_matrix(&bad).is_err());

    assert!(validate_system(&good, &vec![1.0; 15], &vec![0.0; 16]).is_err());
}
