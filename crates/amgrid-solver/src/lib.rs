//! Algebraic multigrid solver for sparse CSR linear systems.
//!
//! Given a sparse matrix `A`, a right-hand side `b`, and an initial guess
//! `x`, this crate builds a hierarchy of progressively coarser problems and
//! solves `Ax = b` with a multiplicative cycle of local smoothing and
//! coarse-grid correction — optionally wrapped as a preconditioner inside a
//! Krylov method for harder systems.
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | CSR storage, mat-vec / mat-mat products, solve stats |
//! | [`coarsen`] | strength of connection + Ruge-Stueben CF splitting |
//! | [`interp`] | direct / standard interpolation, truncation, `R = P^T` |
//! | [`hierarchy`] | level management, Galerkin products, the outer solve |
//! | [`smoother`] | the nine relaxation schemes |
//! | [`cycle`] | the recursive V/W cycle |
//! | [`coarse`] | coarsest-level direct / relaxed solve |
//! | [`pcg`], [`gmres`] | Krylov accelerators over the [`traits::Preconditioner`] seam |
//!
//! # Example
//!
//! ```rust
//! use amgrid_solver::hierarchy::Hierarchy;
//! use amgrid_solver::params::AmgParameters;
//! use amgrid_solver::types::CsrMatrix;
//!
//! // 1-D Poisson stencil.
//! let n = 64;
//! let mut entries = Vec::new();
//! for i in 0..n {
//!     if i > 0 {
//!         entries.push((i, i - 1, -1.0));
//!     }
//!     entries.push((i, i, 2.0));
//!     if i + 1 < n {
//!         entries.push((i, i + 1, -1.0));
//!     }
//! }
//! let a = CsrMatrix::<f64>::from_coo(n, n, entries);
//!
//! let mut params = AmgParameters::default();
//! params.min_coarse_size = 8;
//! let mut hierarchy = Hierarchy::build(a, params).unwrap();
//!
//! let b = vec![1.0; n];
//! let mut x = vec![0.0; n];
//! let stats = hierarchy.solve(&b, &mut x).unwrap();
//! assert!(stats.converged);
//! ```
//!
//! A built [`Hierarchy`](hierarchy::Hierarchy) is reusable across right-hand
//! sides, and implements [`Preconditioner`](traits::Preconditioner) so it
//! can accelerate [`PcgSolver`](pcg::PcgSolver) and
//! [`GmresSolver`](gmres::GmresSolver).

pub mod coarse;
pub mod coarsen;
pub mod cycle;
pub mod error;
pub mod gmres;
pub mod hierarchy;
pub mod interp;
pub mod kernels;
pub mod params;
pub mod pcg;
pub mod smoother;
pub mod traits;
pub mod types;
pub mod validation;

pub use error::{AmgError, ValidationError};
pub use gmres::GmresSolver;
pub use hierarchy::{Hierarchy, Level};
pub use params::{
    AmgParameters, CfOrder, CoarsenKind, InterpKind, KrylovContext, SmootherKind, StopCriterion,
};
pub use pcg::PcgSolver;
pub use traits::Preconditioner;
pub use types::{CfMark, CsrMatrix, ResidualSample, SolveStats};
