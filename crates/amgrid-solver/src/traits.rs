//! Preconditioner seam between the multigrid engine and the Krylov
//! accelerators.

use crate::error::AmgError;

/// Application of an approximate inverse `z = M^{-1} r`.
///
/// [`Hierarchy`](crate::hierarchy::Hierarchy) implements this by running one
/// full multigrid cycle on the residual from a zero initial guess, which is
/// what turns the cycle into a preconditioner for PCG and GMRES. The
/// receiver is `&mut self` because the hierarchy's per-level scratch vectors
/// are reused across applications; a single preconditioner must therefore
/// not be shared between concurrent solves.
pub trait Preconditioner {
    /// Compute `z = M^{-1} r`.
    ///
    /// # Errors
    ///
    /// Returns [`AmgError`] when the application itself fails (for the
    /// multigrid cycle: a zero diagonal in a smoother or a singular
    /// coarsest system).
    fn apply(&mut self, r: &[f64], z: &mut [f64]) -> Result<(), AmgError>;
}
